//! Wire types exchanged with the locker lookup collaborator.

use serde::{Deserialize, Serialize};

/// Request body for the lookup endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupRequest {
    Payload {
        #[serde(rename = "rawPayload")]
        raw_payload: String,
    },
    /// Older `locker:<code>` labels resolve by locker code directly.
    LockerCode {
        #[serde(rename = "lockerCode")]
        locker_code: String,
    },
}

impl LookupRequest {
    pub fn payload(raw: impl Into<String>) -> Self {
        LookupRequest::Payload {
            raw_payload: raw.into(),
        }
    }

    pub fn locker_code(code: impl Into<String>) -> Self {
        LookupRequest::LockerCode {
            locker_code: code.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            LookupRequest::Payload { raw_payload } => raw_payload,
            LookupRequest::LockerCode { locker_code } => locker_code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locker {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LookupResponse {
    ExistingLocker {
        locker: Locker,
        #[serde(default)]
        items: Vec<Item>,
    },
    InitializeLocker {
        #[serde(rename = "qrCodeId")]
        qr_code_id: String,
        code: String,
    },
}

/// Error body returned with a non-success status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case() {
        let json = serde_json::to_string(&LookupRequest::payload("4821")).unwrap();
        assert_eq!(json, r#"{"rawPayload":"4821"}"#);
        let json = serde_json::to_string(&LookupRequest::locker_code("ABC")).unwrap();
        assert_eq!(json, r#"{"lockerCode":"ABC"}"#);
    }

    #[test]
    fn response_parses_tagged_variants() {
        let existing: LookupResponse = serde_json::from_str(
            r#"{"type":"existing_locker","locker":{"id":"l1","code":"4821"},"items":[{"id":"i1","name":"Drill","quantity":2}]}"#,
        )
        .unwrap();
        match existing {
            LookupResponse::ExistingLocker { locker, items } => {
                assert_eq!(locker.code, "4821");
                assert_eq!(items[0].quantity, 2);
            }
            other => panic!("unexpected variant {other:?}"),
        }

        let init: LookupResponse = serde_json::from_str(
            r#"{"type":"initialize_locker","qrCodeId":"q7","code":"1234"}"#,
        )
        .unwrap();
        assert_eq!(
            init,
            LookupResponse::InitializeLocker {
                qr_code_id: "q7".into(),
                code: "1234".into()
            }
        );
    }
}
