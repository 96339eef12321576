//! Operational helpers: logging, event fan-out, telemetry persistence.

use std::{path::PathBuf, sync::Arc};

use barang_types::{
    config::OpsConfig,
    events::{ScanEvent, ScanEventPayload},
    BarangError, Result,
};
use futures::{stream::BoxStream, StreamExt};
use tokio::{io::AsyncWriteExt, sync::broadcast, sync::Mutex};
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| BarangError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| BarangError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// In-process fan-out of scan events, backed by a broadcast channel.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<ScanEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing without subscribers is not an error.
    pub fn publish(&self, payload: ScanEventPayload) {
        let _ = self.tx.send(ScanEvent::new(payload));
    }

    pub fn subscribe(&self) -> BoxStream<'static, ScanEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// In-memory record of scan events with optional JSON-lines persistence.
#[derive(Clone, Default)]
pub struct TelemetryStore {
    events: Arc<Mutex<Vec<ScanEvent>>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_event(&self, event: ScanEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }

    pub async fn snapshot_events(&self) -> Vec<ScanEvent> {
        self.events.lock().await.clone()
    }

    /// Drains every event published on `hub` into this store until the hub closes.
    pub fn attach(&self, hub: &EventHub) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        let mut stream = hub.subscribe();
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let _ = store.record_event(event).await;
            }
        })
    }

    /// Appends all recorded events to `scan-<date>.jsonl` under `dir`.
    pub async fn flush_to(&self, dir: &str) -> Result<PathBuf> {
        let dir = ensure_telemetry_dir(dir)?;
        let path = dir.join(format!("scan-{}.jsonl", chrono::Utc::now().format("%Y%m%d")));
        let events = self.snapshot_events().await;

        let mut buf = Vec::new();
        for event in &events {
            serde_json::to_writer(&mut buf, event)
                .map_err(|err| BarangError::Ops(format!("failed to encode event: {err}")))?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|err| BarangError::Ops(format!("failed to open {}: {err}", path.display())))?;
        file.write_all(&buf)
            .await
            .map_err(|err| BarangError::Ops(format!("failed to write telemetry: {err}")))?;
        file.flush()
            .await
            .map_err(|err| BarangError::Ops(format!("failed to flush telemetry: {err}")))?;
        info!("Flushed {} scan events to {:?}", events.len(), path);
        Ok(path)
    }
}

pub fn ensure_telemetry_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    std::fs::create_dir_all(&dir)
        .map_err(|err| BarangError::Ops(format!("failed to create telemetry dir: {err}")))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use barang_types::scan::CameraSessionState;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = EventHub::new(8);
        let mut stream = hub.subscribe();
        hub.publish(ScanEventPayload::StateChanged {
            from: CameraSessionState::Idle,
            to: CameraSessionState::Initializing,
        });
        let event = stream.next().await.expect("event");
        assert!(matches!(
            event.payload,
            ScanEventPayload::StateChanged {
                to: CameraSessionState::Initializing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn flush_writes_json_lines() {
        let store = TelemetryStore::new();
        store
            .record_event(ScanEvent::new(ScanEventPayload::ManualEntrySuggested {
                attempts: 51,
            }))
            .await
            .unwrap();
        store
            .record_event(ScanEvent::new(ScanEventPayload::Hint {
                message: "Try manual entry".into(),
            }))
            .await
            .unwrap();

        let dir = std::env::temp_dir().join("barang-telemetry-test");
        let _ = std::fs::remove_dir_all(&dir);
        let path = store.flush_to(dir.to_str().unwrap()).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("manual_entry_suggested"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn repeated_flushes_append_to_the_same_file() {
        let store = TelemetryStore::new();
        store
            .record_event(ScanEvent::new(ScanEventPayload::Hint {
                message: "Try manual entry".into(),
            }))
            .await
            .unwrap();

        let dir = std::env::temp_dir().join("barang-telemetry-append-test");
        let _ = std::fs::remove_dir_all(&dir);
        let first = store.flush_to(dir.to_str().unwrap()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&first).unwrap().lines().count(), 1);

        let second = store.flush_to(dir.to_str().unwrap()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&second).unwrap().lines().count(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
