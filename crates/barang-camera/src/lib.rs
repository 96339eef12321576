//! Camera abstraction layer and the frame source built on top of it.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use barang_types::{config::CameraConfig, frame::Frame, BarangError, CameraFault, CameraFaultKind};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::info;

mod replay;
mod source;

pub use replay::ReplayCamera;
pub use source::{is_secure_origin, AcquireMode, FrameSource, SourceMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera on phones.
    Environment,
    User,
}

/// Requested stream properties, all of them "ideal" rather than mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConstraints {
    pub facing: Option<FacingMode>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub aspect_ratio: Option<f32>,
    pub frame_rate: Option<u32>,
}

impl StreamConstraints {
    /// Constraint sets in the order they are attempted.
    pub fn fallback_chain(config: &CameraConfig) -> [StreamConstraints; 3] {
        let aspect = config.ideal_width as f32 / config.ideal_height as f32;
        [
            StreamConstraints {
                facing: Some(FacingMode::Environment),
                width: Some(config.ideal_width),
                height: Some(config.ideal_height),
                aspect_ratio: Some(aspect),
                frame_rate: Some(config.frame_rate),
            },
            StreamConstraints {
                facing: Some(FacingMode::Environment),
                width: Some(config.ideal_width),
                height: Some(config.ideal_height),
                aspect_ratio: None,
                frame_rate: None,
            },
            StreamConstraints {
                facing: None,
                width: Some(config.ideal_width),
                height: Some(config.ideal_height),
                aspect_ratio: None,
                frame_rate: None,
            },
        ]
    }
}

/// Hardware video stream.
///
/// Implementations copy pixels into a caller-owned surface so the capture
/// loop never allocates per frame.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    async fn open(&mut self, constraints: &StreamConstraints) -> Result<(), CameraFault>;
    /// Nudges a stream that reported ready but is not delivering frames.
    async fn force_playback(&mut self) -> Result<(), CameraFault>;
    /// Returns `Ok(false)` when the stream has no frame available yet.
    fn capture_into(&mut self, surface: &mut Frame) -> Result<bool, CameraFault>;
    fn stop_tracks(&mut self);
    fn is_streaming(&self) -> bool;
}

/// Backend for platforms without any camera, e.g. image-only scanning.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCamera;

#[async_trait]
impl CameraBackend for NoCamera {
    async fn open(&mut self, _constraints: &StreamConstraints) -> Result<(), CameraFault> {
        Err(CameraFault::new(
            CameraFaultKind::NotFound,
            "no camera backend configured",
        ))
    }

    async fn force_playback(&mut self) -> Result<(), CameraFault> {
        Err(CameraFault::new(CameraFaultKind::NotFound, "no camera backend configured"))
    }

    fn capture_into(&mut self, _surface: &mut Frame) -> Result<bool, CameraFault> {
        Ok(false)
    }

    fn stop_tracks(&mut self) {}

    fn is_streaming(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct MockCameraState {
    /// One entry per `open` call; `None` or an exhausted queue means success.
    pub open_script: VecDeque<Option<CameraFault>>,
    /// Frames handed out in order; the last one repeats forever.
    pub frames: VecDeque<Frame>,
    pub open_calls: Vec<StreamConstraints>,
    pub stop_calls: usize,
    pub force_playback_calls: usize,
    pub captures: usize,
    pub live_streams: usize,
    pub max_live_streams: usize,
    streaming: bool,
}

/// Scriptable camera used for integration and testing.
#[derive(Clone, Default)]
pub struct MockCamera {
    state: Arc<Mutex<MockCameraState>>,
    open_latency: Duration,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frames(frames: impl IntoIterator<Item = Frame>) -> Self {
        let camera = Self::new();
        camera.state().frames.extend(frames);
        camera
    }

    pub fn with_open_latency(mut self, latency: Duration) -> Self {
        self.open_latency = latency;
        self
    }

    pub fn fail_next_open(&self, fault: CameraFault) {
        self.state().open_script.push_back(Some(fault));
    }

    pub fn succeed_next_open(&self) {
        self.state().open_script.push_back(None);
    }

    pub fn push_frame(&self, frame: Frame) {
        self.state().frames.push_back(frame);
    }

    /// Shared view of the mock's bookkeeping; clones observe the same device.
    pub fn state(&self) -> MutexGuard<'_, MockCameraState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn streaming(&self) -> bool {
        self.state().streaming
    }
}

#[async_trait]
impl CameraBackend for MockCamera {
    async fn open(&mut self, constraints: &StreamConstraints) -> Result<(), CameraFault> {
        info!("Opening mock camera with {:?}", constraints);
        if !self.open_latency.is_zero() {
            sleep(self.open_latency).await;
        }
        let mut state = self.state();
        state.open_calls.push(constraints.clone());
        if let Some(Some(fault)) = state.open_script.pop_front() {
            return Err(fault);
        }
        state.streaming = true;
        state.live_streams += 1;
        state.max_live_streams = state.max_live_streams.max(state.live_streams);
        Ok(())
    }

    async fn force_playback(&mut self) -> Result<(), CameraFault> {
        let mut state = self.state();
        state.force_playback_calls += 1;
        if state.streaming {
            Ok(())
        } else {
            Err(CameraFault::new(CameraFaultKind::Other, "mock stream not open"))
        }
    }

    fn capture_into(&mut self, surface: &mut Frame) -> Result<bool, CameraFault> {
        let mut state = self.state();
        if !state.streaming {
            return Ok(false);
        }
        state.captures += 1;
        let frame = if state.frames.len() > 1 {
            state.frames.pop_front()
        } else {
            state.frames.front().cloned()
        };
        match frame {
            Some(frame) => {
                surface.copy_from(frame.width, frame.height, &frame.data);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn stop_tracks(&mut self) {
        let mut state = self.state();
        state.stop_calls += 1;
        if state.streaming {
            state.streaming = false;
            state.live_streams = state.live_streams.saturating_sub(1);
        }
    }

    fn is_streaming(&self) -> bool {
        self.streaming()
    }
}

/// Generate an error aligned with camera semantics.
pub fn camera_error(message: impl Into<String>) -> BarangError {
    BarangError::Camera(message.into())
}
