use serde::{Deserialize, Serialize};

use crate::geometry::Corners;

/// Payload extracted from a QR symbol plus the optional outline used for overlays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedCode {
    pub payload: String,
    pub corners: Option<Corners>,
}

/// Per-session scan counters, surfaced to the UI and never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAttemptStats {
    pub attempts: u64,
    pub successful_decodes: u64,
    pub failed_decodes: u64,
    pub initialization_duration_ms: u64,
}

impl ScanAttemptStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSessionState {
    #[default]
    Idle,
    Initializing,
    Ready,
    Scanning,
    Success,
    Error,
}

impl CameraSessionState {
    /// True while the session holds the camera or is acquiring it.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            CameraSessionState::Initializing
                | CameraSessionState::Ready
                | CameraSessionState::Scanning
                | CameraSessionState::Success
        )
    }
}

/// Why a frame was not forwarded to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRejection {
    NoContent,
    Frozen,
}
