use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = BarangError> = std::result::Result<T, E>;

/// Hardware or permission failure reported by a camera backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFaultKind {
    PermissionDenied,
    NotFound,
    DeviceBusy,
    Overconstrained,
    Other,
}

impl CameraFaultKind {
    /// Higher ranks carry more actionable information for the user.
    pub fn specificity(self) -> u8 {
        match self {
            CameraFaultKind::PermissionDenied => 4,
            CameraFaultKind::DeviceBusy => 3,
            CameraFaultKind::NotFound => 2,
            CameraFaultKind::Overconstrained => 1,
            CameraFaultKind::Other => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraFault {
    pub kind: CameraFaultKind,
    pub message: String,
}

impl CameraFault {
    pub fn new(kind: CameraFaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Keeps whichever of the two faults is more specific, preferring `self` on ties.
    pub fn most_specific(self, other: CameraFault) -> CameraFault {
        if other.kind.specificity() > self.kind.specificity() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for CameraFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// User-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InsecureContext,
    PermissionDenied,
    DeviceNotFound,
    DeviceBusy,
    Overconstrained,
    InitializationTimeout,
    InvalidPayloadFormat,
    NoCodeFound,
    LookupFailed,
    UnsupportedFile,
    Cancelled,
    Internal,
}

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum BarangError {
    #[error("camera access requires a secure context (https or localhost), got origin {origin}")]
    InsecureContext { origin: String },
    #[error("camera unavailable: {0}")]
    CameraUnavailable(CameraFault),
    #[error("camera did not produce usable frames within {waited_ms}ms")]
    InitializationTimeout { waited_ms: u64 },
    #[error("detected content is not a valid locker code: {raw:?}")]
    InvalidPayloadFormat { raw: String },
    #[error("no QR code found in image")]
    NoCodeFound,
    #[error("lookup failed: {message}")]
    LookupFailed { message: String, raw: Option<String> },
    #[error("unsupported file type {mime}; only image/* files can be scanned")]
    UnsupportedFile { mime: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("camera error: {0}")]
    Camera(String),
    #[error("scanner error: {0}")]
    Scanner(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BarangError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BarangError::InsecureContext { .. } => ErrorCategory::InsecureContext,
            BarangError::CameraUnavailable(fault) => match fault.kind {
                CameraFaultKind::PermissionDenied => ErrorCategory::PermissionDenied,
                CameraFaultKind::NotFound => ErrorCategory::DeviceNotFound,
                CameraFaultKind::DeviceBusy => ErrorCategory::DeviceBusy,
                CameraFaultKind::Overconstrained => ErrorCategory::Overconstrained,
                CameraFaultKind::Other => ErrorCategory::Internal,
            },
            BarangError::InitializationTimeout { .. } => ErrorCategory::InitializationTimeout,
            BarangError::InvalidPayloadFormat { .. } => ErrorCategory::InvalidPayloadFormat,
            BarangError::NoCodeFound => ErrorCategory::NoCodeFound,
            BarangError::LookupFailed { .. } => ErrorCategory::LookupFailed,
            BarangError::UnsupportedFile { .. } => ErrorCategory::UnsupportedFile,
            BarangError::Cancelled => ErrorCategory::Cancelled,
            _ => ErrorCategory::Internal,
        }
    }

    /// Message shown to the person holding the camera, including remediation steps.
    pub fn user_message(&self) -> String {
        match self {
            BarangError::InsecureContext { .. } => {
                "Camera is only available over HTTPS or on localhost. Enter the 4-digit code manually or upload a photo of the QR code.".into()
            }
            BarangError::CameraUnavailable(fault) => match fault.kind {
                CameraFaultKind::PermissionDenied => {
                    "Camera permission was denied. Allow camera access in your browser or system settings, then try again.".into()
                }
                CameraFaultKind::NotFound => {
                    "No camera was found on this device. Enter the code manually or upload a photo.".into()
                }
                CameraFaultKind::DeviceBusy => {
                    "The camera is in use by another application. Close it and try again.".into()
                }
                CameraFaultKind::Overconstrained => {
                    "The camera does not support the requested settings.".into()
                }
                CameraFaultKind::Other => format!("Could not start the camera: {}", fault.message),
            },
            BarangError::InitializationTimeout { .. } => {
                "Could not initialize the camera. Try again or enter the code manually.".into()
            }
            BarangError::InvalidPayloadFormat { raw } => {
                format!("Invalid QR code format. Detected: \"{raw}\"")
            }
            BarangError::NoCodeFound => {
                "No QR code found in the image. Try a sharper photo or enter the code manually.".into()
            }
            BarangError::LookupFailed { message, raw } => match raw {
                Some(raw) => format!("{message} (detected: \"{raw}\")"),
                None => message.clone(),
            },
            BarangError::UnsupportedFile { .. } => "Please choose an image file.".into(),
            BarangError::Cancelled => "Scan cancelled.".into(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_specific_prefers_permission_denied() {
        let overconstrained = CameraFault::new(CameraFaultKind::Overconstrained, "1280x720");
        let denied = CameraFault::new(CameraFaultKind::PermissionDenied, "denied");
        let busy = CameraFault::new(CameraFaultKind::DeviceBusy, "busy");

        let picked = overconstrained.most_specific(denied.clone()).most_specific(busy);
        assert_eq!(picked, denied);
    }

    #[test]
    fn camera_fault_maps_to_category() {
        let err = BarangError::CameraUnavailable(CameraFault::new(
            CameraFaultKind::DeviceBusy,
            "in use",
        ));
        assert_eq!(err.category(), ErrorCategory::DeviceBusy);
        assert!(err.user_message().contains("in use by another application"));
    }

    #[test]
    fn lookup_failure_message_includes_raw_payload() {
        let err = BarangError::LookupFailed {
            message: "QR code not found".into(),
            raw: Some("qrcode:9999".into()),
        };
        assert_eq!(
            err.user_message(),
            "QR code not found (detected: \"qrcode:9999\")"
        );
    }
}
