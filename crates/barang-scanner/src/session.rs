use std::time::Duration;

use barang_camera::{AcquireMode, CameraBackend, FrameSource};
use barang_lookup::LockerLookup;
use barang_ops::EventHub;
use barang_types::{
    config::BarangConfig,
    events::{OutcomeSummary, ScanEventPayload},
    frame::Frame,
    lookup::{Item, Locker, LookupResponse},
    scan::{CameraSessionState, ScanAttemptStats},
    BarangError, Result,
};
use barang_vision::{DecodeOutcome, Decoder, RqrrDetector, SymbolDetector};
use serde::Serialize;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{info, warn};

use crate::{
    normalize::{is_locker_code, normalize_payload},
    scan_loop::{ScanLoop, TickOutcome},
    scanner_error,
    signal::StopSignal,
};

const MANUAL_ENTRY_HINT: &str =
    "Having trouble? Type the 4-digit code printed under the QR label instead.";

/// Where a resolved scan leads next.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "next", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Label is bound to a locker; open its detail view.
    ExistingLocker { locker: Locker, items: Vec<Item> },
    /// Label is unused; start the locker setup flow for it.
    InitializeLocker { qr_code_id: String, code: String },
}

impl ScanOutcome {
    fn summary(&self) -> OutcomeSummary {
        match self {
            ScanOutcome::ExistingLocker { locker, items } => OutcomeSummary::ExistingLocker {
                code: locker.code.clone(),
                items: items.len(),
            },
            ScanOutcome::InitializeLocker { qr_code_id, code } => {
                OutcomeSummary::InitializeLocker {
                    qr_code_id: qr_code_id.clone(),
                    code: code.clone(),
                }
            }
        }
    }
}

impl From<LookupResponse> for ScanOutcome {
    fn from(response: LookupResponse) -> Self {
        match response {
            LookupResponse::ExistingLocker { locker, items } => {
                ScanOutcome::ExistingLocker { locker, items }
            }
            LookupResponse::InitializeLocker { qr_code_id, code } => {
                ScanOutcome::InitializeLocker { qr_code_id, code }
            }
        }
    }
}

/// One user-visible scanning session: camera, loop and locker dispatch.
///
/// At most one camera stream is live per session. Starting again tears the
/// previous run down completely before the device is reacquired.
pub struct ScanSession<L, D = RqrrDetector>
where
    L: LockerLookup,
    D: SymbolDetector,
{
    config: BarangConfig,
    source: FrameSource,
    scan_loop: ScanLoop<D>,
    lookup: L,
    events: EventHub,
    stop: StopSignal,
    pending_hint: Option<JoinHandle<String>>,
}

impl<L> ScanSession<L, RqrrDetector>
where
    L: LockerLookup,
{
    pub fn new(config: BarangConfig, camera: impl CameraBackend + 'static, lookup: L) -> Self {
        let decoder = Decoder::new(config.decoder.clone());
        Self::with_decoder(config, camera, lookup, decoder)
    }
}

impl<L, D> ScanSession<L, D>
where
    L: LockerLookup,
    D: SymbolDetector,
{
    pub fn with_decoder(
        config: BarangConfig,
        camera: impl CameraBackend + 'static,
        lookup: L,
        decoder: Decoder<D>,
    ) -> Self {
        let events = EventHub::default();
        Self {
            source: FrameSource::new(config.camera.clone(), camera),
            scan_loop: ScanLoop::new(&config, decoder, events.clone()),
            config,
            lookup,
            events,
            stop: StopSignal::new(),
            pending_hint: None,
        }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Handle that cancels the current run from another task.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> CameraSessionState {
        self.scan_loop.state()
    }

    pub fn stats(&self) -> ScanAttemptStats {
        self.scan_loop.stats()
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Latest frame, including the detection outline once a code was accepted.
    pub fn surface(&self) -> &Frame {
        self.source.surface()
    }

    /// Tears down any previous run, then brings the camera up to `Ready`.
    pub async fn start(&mut self) -> Result<()> {
        if self.source.is_active() || self.state().is_active() {
            info!("Restarting scan session; stopping the previous one first");
            self.stop();
        }
        self.cancel_pending_hint();
        self.scan_loop.reset();
        self.stop.reset();

        let mut token = self.stop.token();
        self.scan_loop
            .initialize(&mut self.source, &mut token)
            .await
    }

    /// Advances the loop by one frame; for hosts that drive their own timer.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if !self.source.is_active() {
            return Err(scanner_error("tick requested before the session was started"));
        }
        self.scan_loop.tick(&mut self.source)
    }

    /// Full camera flow: start, scan until a code is accepted, then dispatch it.
    pub async fn scan(&mut self) -> Result<ScanOutcome> {
        if let Err(err) = self.start().await {
            if !matches!(err, BarangError::Cancelled) {
                self.report_failure(&err);
            }
            return Err(err);
        }

        let mut token = self.stop.token();
        let detected = match self.scan_loop.run(&mut self.source, &mut token).await {
            Ok(code) => code,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };
        self.dispatch(&detected.payload).await
    }

    /// Resolves a typed locker code without touching the camera.
    pub async fn manual_entry(&mut self, code: &str) -> Result<ScanOutcome> {
        let code = code.trim();
        if !is_locker_code(code) {
            return Err(BarangError::InvalidPayloadFormat { raw: code.into() });
        }
        self.dispatch(code).await
    }

    /// Decodes a still image (upload or drag-drop) with a single cascade pass.
    pub async fn scan_image(&mut self, bytes: Vec<u8>, mime: &str) -> Result<ScanOutcome> {
        if !mime.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(BarangError::UnsupportedFile { mime: mime.into() });
        }
        self.stop();
        self.cancel_pending_hint();
        self.scan_loop.reset();

        self.source.acquire(AcquireMode::Image(bytes)).await?;
        let outcome = self.scan_loop.decode_still(&mut self.source);
        self.source.release();
        match outcome? {
            DecodeOutcome::Found(code) => {
                self.events.publish(ScanEventPayload::CodeDetected {
                    payload: code.payload.clone(),
                    corners: code.corners,
                });
                self.dispatch(&code.payload).await
            }
            DecodeOutcome::Rejected { raw } => {
                let err = BarangError::InvalidPayloadFormat { raw };
                self.report_failure(&err);
                Err(err)
            }
            DecodeOutcome::NotFound => {
                let err = BarangError::NoCodeFound;
                self.report_failure(&err);
                Err(err)
            }
        }
    }

    /// Normalizes `raw`, asks the lookup for the locker and releases the camera.
    ///
    /// The stream stays live while the lookup is in flight so the user keeps
    /// seeing the outlined code.
    async fn dispatch(&mut self, raw: &str) -> Result<ScanOutcome> {
        let normalized = normalize_payload(raw);
        if normalized.value().is_empty() {
            let err = BarangError::InvalidPayloadFormat { raw: raw.into() };
            self.stop();
            self.report_failure(&err);
            return Err(err);
        }
        info!("Resolving {:?} as {:?}", raw, normalized);

        let response = self.lookup.resolve(normalized.into_request()).await;
        self.stop();

        match response {
            Ok(response) => {
                let outcome = ScanOutcome::from(response);
                self.events
                    .publish(ScanEventPayload::Outcome(outcome.summary()));
                self.events.publish(ScanEventPayload::Stats(self.stats()));
                Ok(outcome)
            }
            Err(err) => {
                let message = match err {
                    BarangError::LookupFailed { message, .. } => message,
                    other => other.to_string(),
                };
                let err = BarangError::LookupFailed {
                    message,
                    raw: Some(raw.into()),
                };
                self.scan_loop.transition(CameraSessionState::Error);
                self.report_failure(&err);
                self.schedule_hint();
                Err(err)
            }
        }
    }

    fn fail(&mut self, err: &BarangError) {
        self.source.release();
        if matches!(err, BarangError::Cancelled) {
            info!("Scan cancelled");
            self.scan_loop.halt();
        } else {
            self.scan_loop.transition(CameraSessionState::Error);
            self.report_failure(err);
        }
    }

    fn report_failure(&self, err: &BarangError) {
        warn!("Scan failed: {}", err);
        self.events
            .publish(ScanEventPayload::Outcome(OutcomeSummary::Failed {
                category: err.category(),
                message: err.user_message(),
            }));
    }

    fn schedule_hint(&mut self) {
        self.cancel_pending_hint();
        let events = self.events.clone();
        let delay = Duration::from_millis(self.config.scanner.hint_delay_ms);
        self.pending_hint = Some(tokio::spawn(async move {
            sleep(delay).await;
            events.publish(ScanEventPayload::Hint {
                message: MANUAL_ENTRY_HINT.into(),
            });
            MANUAL_ENTRY_HINT.to_string()
        }));
    }

    /// Waits for the hint scheduled by a failed lookup, if one is pending.
    ///
    /// Returns once the hint has been published, at most `hint_delay_ms`
    /// after the failure. `None` when no hint is pending or it was cancelled.
    pub async fn follow_up_hint(&mut self) -> Option<String> {
        let handle = self.pending_hint.take()?;
        handle.await.ok()
    }

    fn cancel_pending_hint(&mut self) {
        if let Some(handle) = self.pending_hint.take() {
            handle.abort();
        }
    }

    /// Cancels any run, releases the camera and returns to `Idle`. Idempotent.
    pub fn stop(&mut self) {
        self.stop.trigger();
        self.source.release();
        self.scan_loop.halt();
    }
}

impl<L, D> Drop for ScanSession<L, D>
where
    L: LockerLookup,
    D: SymbolDetector,
{
    fn drop(&mut self) {
        self.stop();
        self.cancel_pending_hint();
    }
}
