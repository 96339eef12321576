use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::ErrorCategory,
    geometry::Corners,
    scan::{CameraSessionState, FrameRejection, ScanAttemptStats},
};

/// Immutable event envelope for logging, UI feedback and telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: ScanEventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanEventPayload {
    StateChanged {
        from: CameraSessionState,
        to: CameraSessionState,
    },
    FrameRejected {
        reason: FrameRejection,
        luminance: f32,
        non_black_ratio: f32,
    },
    CodeDetected {
        payload: String,
        corners: Option<Corners>,
    },
    DuplicateSuppressed {
        payload: String,
    },
    InvalidPayload {
        raw: String,
    },
    ManualEntrySuggested {
        attempts: u64,
    },
    Hint {
        message: String,
    },
    Stats(ScanAttemptStats),
    Outcome(OutcomeSummary),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeSummary {
    ExistingLocker { code: String, items: usize },
    InitializeLocker { qr_code_id: String, code: String },
    Failed { category: ErrorCategory, message: String },
}

impl ScanEvent {
    pub fn new(payload: ScanEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}
