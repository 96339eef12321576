//! Locker lookup collaborator: turns a scanned payload into a locker.

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use barang_types::{
    lookup::{Item, Locker, LookupRequest, LookupResponse},
    BarangError, Result,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[async_trait]
pub trait LockerLookup: Send + Sync {
    async fn resolve(&self, request: LookupRequest) -> Result<LookupResponse>;
}

/// One registered QR label as stored in a directory file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub code: String,
    pub qr_code_id: String,
    /// A used label is already bound to a locker.
    #[serde(default)]
    pub used: bool,
    #[serde(default)]
    pub locker: Option<Locker>,
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    entries: Vec<DirectoryEntry>,
}

/// File-backed lookup used for local runs and tests.
#[derive(Debug, Default, Clone)]
pub struct DirectoryLookup {
    by_code: HashMap<String, DirectoryEntry>,
    /// Locker code to label code, for legacy `locker:` labels.
    by_locker: HashMap<String, String>,
}

impl DirectoryLookup {
    /// Builds the directory; when several labels name the same locker the
    /// first one listed answers legacy lookups.
    pub fn new(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let mut by_code = HashMap::new();
        let mut by_locker = HashMap::new();
        for entry in entries {
            if let Some(locker) = &entry.locker {
                match by_locker.get(&locker.code) {
                    Some(first) => warn!(
                        "Locker {} is bound to labels {} and {}; using {}",
                        locker.code, first, entry.code, first
                    ),
                    None => {
                        by_locker.insert(locker.code.clone(), entry.code.clone());
                    }
                }
            }
            by_code.insert(entry.code.clone(), entry);
        }
        Self { by_code, by_locker }
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
            BarangError::Configuration(format!(
                "unable to read locker directory {}: {err}",
                path.display()
            ))
        })?;
        let file: DirectoryFile = toml::from_str(&contents).map_err(|err| {
            BarangError::Configuration(format!(
                "failed to parse locker directory {}: {err}",
                path.display()
            ))
        })?;
        info!("Loaded {} locker labels from {}", file.entries.len(), path.display());
        Ok(Self::new(file.entries))
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    fn respond(entry: &DirectoryEntry) -> Result<LookupResponse> {
        match (&entry.locker, entry.used) {
            (Some(locker), true) => Ok(LookupResponse::ExistingLocker {
                locker: locker.clone(),
                items: entry.items.clone(),
            }),
            (None, true) => Err(lookup_error(format!(
                "QR code {} is marked used but has no locker",
                entry.code
            ))),
            (_, false) => Ok(LookupResponse::InitializeLocker {
                qr_code_id: entry.qr_code_id.clone(),
                code: entry.code.clone(),
            }),
        }
    }
}

#[async_trait]
impl LockerLookup for DirectoryLookup {
    async fn resolve(&self, request: LookupRequest) -> Result<LookupResponse> {
        match &request {
            LookupRequest::Payload { raw_payload } => match self.by_code.get(raw_payload) {
                Some(entry) => Self::respond(entry),
                None => Err(lookup_error("QR code not found")),
            },
            LookupRequest::LockerCode { locker_code } => self
                .by_locker
                .get(locker_code)
                .and_then(|code| self.by_code.get(code))
                .ok_or_else(|| lookup_error("Locker not found"))
                .and_then(Self::respond),
        }
    }
}

pub fn lookup_error(message: impl Into<String>) -> BarangError {
    BarangError::LookupFailed {
        message: message.into(),
        raw: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> DirectoryLookup {
        DirectoryLookup::new([
            DirectoryEntry {
                code: "4821".into(),
                qr_code_id: "qr-4821".into(),
                used: true,
                locker: Some(Locker {
                    id: "locker-1".into(),
                    code: "GARAGE".into(),
                    label: Some("Garage shelf".into()),
                    description: None,
                }),
                items: vec![Item {
                    id: "item-1".into(),
                    name: "Drill".into(),
                    quantity: 1,
                    category: Some("Tools".into()),
                }],
            },
            DirectoryEntry {
                code: "1234".into(),
                qr_code_id: "qr-1234".into(),
                used: false,
                locker: None,
                items: Vec::new(),
            },
        ])
    }

    #[tokio::test]
    async fn used_code_resolves_to_existing_locker() {
        let response = directory()
            .resolve(LookupRequest::payload("4821"))
            .await
            .unwrap();
        match response {
            LookupResponse::ExistingLocker { locker, items } => {
                assert_eq!(locker.id, "locker-1");
                assert_eq!(items.len(), 1);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn unused_code_requests_initialization() {
        let response = directory()
            .resolve(LookupRequest::payload("1234"))
            .await
            .unwrap();
        assert_eq!(
            response,
            LookupResponse::InitializeLocker {
                qr_code_id: "qr-1234".into(),
                code: "1234".into()
            }
        );
    }

    #[tokio::test]
    async fn unknown_code_is_an_error() {
        let err = directory()
            .resolve(LookupRequest::payload("9999"))
            .await
            .unwrap_err();
        assert!(matches!(err, BarangError::LookupFailed { ref message, .. } if message == "QR code not found"));
    }

    #[tokio::test]
    async fn legacy_locker_code_matches_locker_directly() {
        let response = directory()
            .resolve(LookupRequest::locker_code("GARAGE"))
            .await
            .unwrap();
        assert!(matches!(response, LookupResponse::ExistingLocker { .. }));
        assert!(directory()
            .resolve(LookupRequest::locker_code("4821"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn shared_locker_code_resolves_to_first_listed_label() {
        let garage = Locker {
            id: "locker-1".into(),
            code: "GARAGE".into(),
            label: None,
            description: None,
        };
        let entry = |code: &str, item: &str| DirectoryEntry {
            code: code.into(),
            qr_code_id: format!("qr-{code}"),
            used: true,
            locker: Some(garage.clone()),
            items: vec![Item {
                id: item.into(),
                name: item.into(),
                quantity: 1,
                category: None,
            }],
        };
        let lookup = DirectoryLookup::new([
            entry("4821", "first"),
            entry("5555", "second"),
            entry("7777", "third"),
        ]);

        for _ in 0..5 {
            match lookup
                .resolve(LookupRequest::locker_code("GARAGE"))
                .await
                .unwrap()
            {
                LookupResponse::ExistingLocker { items, .. } => assert_eq!(items[0].id, "first"),
                other => panic!("unexpected response {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn loads_directory_from_toml() {
        let path = std::env::temp_dir().join("barang-directory-test.toml");
        let doc = r#"
            [[entries]]
            code = "4821"
            qr_code_id = "qr-4821"
            used = true
            locker = { id = "locker-1", code = "GARAGE" }
            items = [{ id = "item-1", name = "Drill", quantity = 2 }]

            [[entries]]
            code = "1234"
            qr_code_id = "qr-1234"
        "#;
        std::fs::write(&path, doc).unwrap();
        let lookup = DirectoryLookup::from_file(&path).await.unwrap();
        assert_eq!(lookup.len(), 2);
        assert!(matches!(
            lookup.resolve(LookupRequest::payload("1234")).await.unwrap(),
            LookupResponse::InitializeLocker { .. }
        ));
        std::fs::remove_file(&path).ok();
    }
}
