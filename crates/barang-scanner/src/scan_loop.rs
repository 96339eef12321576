use std::time::Duration;

use barang_camera::{AcquireMode, FrameSource};
use barang_ops::EventHub;
use barang_types::{
    config::{BarangConfig, CameraConfig, ScannerConfig},
    events::ScanEventPayload,
    scan::{CameraSessionState, DecodedCode, FrameRejection, ScanAttemptStats},
    BarangError, Result,
};
use barang_vision::{
    draw_outline, DecodeOutcome, Decoder, FrameValidator, RqrrDetector, SymbolDetector,
};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::signal::StopToken;

const OUTLINE_COLOR: [u8; 4] = [0, 255, 0, 255];
const OUTLINE_THICKNESS: u32 = 4;

/// Result of one pass over a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    NoFrame,
    Rejected(FrameRejection),
    Miss,
    /// A symbol was read but its content is not a plausible code.
    InvalidPayload(String),
    /// Same payload as the previous detection; nothing is emitted.
    Duplicate(String),
    Detected(DecodedCode),
}

/// Drives the camera from start-up to the first accepted payload.
///
/// Owns the validator, the decoder and every per-session counter; the
/// session only ever sees state transitions and the final detection.
pub struct ScanLoop<D = RqrrDetector> {
    camera: CameraConfig,
    scanner: ScannerConfig,
    validator: FrameValidator,
    decoder: Decoder<D>,
    stats: ScanAttemptStats,
    last_detection: Option<String>,
    manual_suggested: bool,
    state: CameraSessionState,
    events: EventHub,
}

impl<D: SymbolDetector> ScanLoop<D> {
    pub fn new(config: &BarangConfig, decoder: Decoder<D>, events: EventHub) -> Self {
        Self {
            camera: config.camera.clone(),
            scanner: config.scanner.clone(),
            validator: FrameValidator::new(config.validator.clone()),
            decoder,
            stats: ScanAttemptStats::default(),
            last_detection: None,
            manual_suggested: false,
            state: CameraSessionState::Idle,
            events,
        }
    }

    pub fn state(&self) -> CameraSessionState {
        self.state
    }

    pub fn stats(&self) -> ScanAttemptStats {
        self.stats
    }

    pub fn last_detection(&self) -> Option<&str> {
        self.last_detection.as_deref()
    }

    pub fn decoder(&self) -> &Decoder<D> {
        &self.decoder
    }

    pub(crate) fn transition(&mut self, to: CameraSessionState) {
        if self.state == to {
            return;
        }
        debug!("Scan state {:?} -> {:?}", self.state, to);
        self.events.publish(ScanEventPayload::StateChanged {
            from: self.state,
            to,
        });
        self.state = to;
    }

    /// Clears counters, the duplicate cache and frame history for a fresh session.
    pub fn reset(&mut self) {
        self.stats.reset();
        self.last_detection = None;
        self.manual_suggested = false;
        self.validator.reset();
    }

    /// Drops the duplicate cache and returns to `Idle`; counters survive for reporting.
    pub fn halt(&mut self) {
        self.last_detection = None;
        self.transition(CameraSessionState::Idle);
    }

    /// Acquires the camera and waits until it shows real content.
    ///
    /// Tries a settle delay plus bounded retries first, then a forced
    /// playback under the hard deadline. The source is released on every
    /// failure path.
    pub async fn initialize(
        &mut self,
        source: &mut FrameSource,
        stop: &mut StopToken,
    ) -> Result<()> {
        let started = Instant::now();
        self.transition(CameraSessionState::Initializing);

        let result = self.bring_up(source, stop).await;
        match &result {
            Ok(()) => {
                self.stats.initialization_duration_ms = started.elapsed().as_millis() as u64;
                self.validator.reset();
                info!(
                    "Camera ready after {}ms",
                    self.stats.initialization_duration_ms
                );
                self.transition(CameraSessionState::Ready);
            }
            Err(BarangError::Cancelled) => {
                source.release();
                self.transition(CameraSessionState::Idle);
            }
            Err(err) => {
                warn!("Camera initialization failed: {}", err);
                source.release();
                self.transition(CameraSessionState::Error);
            }
        }
        result
    }

    async fn bring_up(
        &mut self,
        source: &mut FrameSource,
        stop: &mut StopToken,
    ) -> Result<()> {
        stop.guard(source.acquire(AcquireMode::Camera)).await??;

        // The permission prompt is not charged against the content deadline.
        let waiting = Instant::now();
        let deadline = Duration::from_millis(self.camera.init_timeout_ms);
        let ready = match stop
            .guard(timeout(deadline, self.await_content(source)))
            .await?
        {
            Ok(ready) => ready?,
            Err(_) => {
                warn!(
                    "Camera produced no content within {}ms",
                    self.camera.init_timeout_ms
                );
                false
            }
        };
        if ready {
            return Ok(());
        }

        // Some devices only start delivering once playback is kicked explicitly.
        if let Err(err) = stop.guard(source.force_playback()).await? {
            warn!("Forced playback failed: {}", err);
        }
        if self.frame_has_content(source)? {
            info!("Camera recovered after forced playback");
            return Ok(());
        }
        Err(BarangError::InitializationTimeout {
            waited_ms: waiting.elapsed().as_millis() as u64,
        })
    }

    async fn await_content(&self, source: &mut FrameSource) -> Result<bool> {
        sleep(Duration::from_millis(self.camera.settle_delay_ms)).await;
        let retries = u64::from(self.camera.init_retries);
        for attempt in 0..=retries {
            if self.frame_has_content(source)? {
                return Ok(true);
            }
            if attempt < retries {
                debug!("Camera not ready, retry {} of {}", attempt + 1, retries);
                sleep(Duration::from_millis(
                    self.camera.retry_backoff_ms * (attempt + 1),
                ))
                .await;
            }
        }
        Ok(false)
    }

    fn frame_has_content(&self, source: &mut FrameSource) -> Result<bool> {
        Ok(source
            .next_frame()?
            .is_some_and(|frame| self.validator.has_content(frame)))
    }

    /// Captures, validates and decodes a single frame.
    pub fn tick(&mut self, source: &mut FrameSource) -> Result<TickOutcome> {
        if self.state == CameraSessionState::Ready {
            self.transition(CameraSessionState::Scanning);
        }
        let Some(frame) = source.next_frame()? else {
            return Ok(TickOutcome::NoFrame);
        };

        let analysis = self.validator.check(frame);
        if let Some(reason) = analysis.rejection {
            self.events.publish(ScanEventPayload::FrameRejected {
                reason,
                luminance: analysis.luminance,
                non_black_ratio: analysis.non_black_ratio,
            });
            return Ok(TickOutcome::Rejected(reason));
        }

        self.stats.attempts += 1;
        let report = self.decoder.decode(frame);
        let outcome = match report.outcome {
            DecodeOutcome::NotFound => {
                self.stats.failed_decodes += 1;
                TickOutcome::Miss
            }
            DecodeOutcome::Rejected { raw } => {
                self.stats.failed_decodes += 1;
                debug!("Discarding implausible payload {:?}", raw);
                self.events
                    .publish(ScanEventPayload::InvalidPayload { raw: raw.clone() });
                TickOutcome::InvalidPayload(raw)
            }
            DecodeOutcome::Found(code) => {
                if self.last_detection.as_deref() == Some(code.payload.as_str()) {
                    self.events.publish(ScanEventPayload::DuplicateSuppressed {
                        payload: code.payload.clone(),
                    });
                    return Ok(TickOutcome::Duplicate(code.payload));
                }
                info!(
                    "Detected {:?} via {:?} after {} detector calls",
                    code.payload, report.strategy, report.detector_calls
                );
                self.accept(source, &code);
                return Ok(TickOutcome::Detected(code));
            }
        };
        self.maybe_suggest_manual_entry();
        Ok(outcome)
    }

    fn accept(&mut self, source: &mut FrameSource, code: &DecodedCode) {
        self.last_detection = Some(code.payload.clone());
        self.stats.successful_decodes += 1;
        if let Some(corners) = &code.corners {
            draw_outline(source.surface_mut(), corners, OUTLINE_COLOR, OUTLINE_THICKNESS);
        }
        self.events.publish(ScanEventPayload::CodeDetected {
            payload: code.payload.clone(),
            corners: code.corners,
        });
        self.transition(CameraSessionState::Success);
    }

    fn maybe_suggest_manual_entry(&mut self) {
        if self.manual_suggested
            || self.stats.attempts <= self.scanner.suggest_manual_after_attempts
        {
            return;
        }
        self.manual_suggested = true;
        info!(
            "No code after {} attempts, suggesting manual entry",
            self.stats.attempts
        );
        self.events.publish(ScanEventPayload::ManualEntrySuggested {
            attempts: self.stats.attempts,
        });
    }

    /// Ticks on a fixed interval until a new payload is accepted.
    ///
    /// Each tick is scheduled only after the previous one finished, so a
    /// slow decode never overlaps the next capture.
    pub async fn run(
        &mut self,
        source: &mut FrameSource,
        stop: &mut StopToken,
    ) -> Result<DecodedCode> {
        let interval = Duration::from_millis(self.scanner.tick_interval_ms);
        loop {
            if stop.is_stopped() {
                return Err(BarangError::Cancelled);
            }
            if let TickOutcome::Detected(code) = self.tick(source)? {
                return Ok(code);
            }
            stop.guard(sleep(interval)).await?;
        }
    }

    /// Single decode pass over a still image; no validation or duplicate cache.
    pub fn decode_still(&mut self, source: &mut FrameSource) -> Result<DecodeOutcome> {
        let Some(frame) = source.next_frame()? else {
            return Ok(DecodeOutcome::NotFound);
        };
        self.stats.attempts += 1;
        let report = self.decoder.decode(frame);
        match &report.outcome {
            DecodeOutcome::Found(code) => {
                self.stats.successful_decodes += 1;
                if let Some(corners) = &code.corners {
                    draw_outline(source.surface_mut(), corners, OUTLINE_COLOR, OUTLINE_THICKNESS);
                }
            }
            _ => self.stats.failed_decodes += 1,
        }
        Ok(report.outcome)
    }
}
