use std::path::PathBuf;

use async_trait::async_trait;
use barang_types::{frame::Frame, CameraFault, CameraFaultKind};
use tracing::{debug, info};

use crate::{CameraBackend, StreamConstraints};

/// Plays a fixed list of image files back as if they were a camera stream.
///
/// Frames are decoded when the stream opens; the last one repeats until the
/// stream stops, like a camera pointed at a still scene.
pub struct ReplayCamera {
    paths: Vec<PathBuf>,
    frames: Vec<Frame>,
    cursor: usize,
    streaming: bool,
}

impl ReplayCamera {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
            frames: Vec::new(),
            cursor: 0,
            streaming: false,
        }
    }

    async fn load_frames(&self) -> Result<Vec<Frame>, CameraFault> {
        let mut frames = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let unreadable = |err: String| {
                CameraFault::new(
                    CameraFaultKind::Other,
                    format!("failed to read replay frame {}: {err}", path.display()),
                )
            };
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|err| unreadable(err.to_string()))?;
            let rgba = image::load_from_memory(&bytes)
                .map_err(|err| unreadable(err.to_string()))?
                .to_rgba8();
            let (width, height) = rgba.dimensions();
            frames.push(Frame::from_rgba(width, height, rgba.into_raw()));
        }
        Ok(frames)
    }
}

#[async_trait]
impl CameraBackend for ReplayCamera {
    async fn open(&mut self, constraints: &StreamConstraints) -> Result<(), CameraFault> {
        if self.paths.is_empty() {
            return Err(CameraFault::new(
                CameraFaultKind::NotFound,
                "replay camera has no frames",
            ));
        }
        if self.streaming {
            return Err(CameraFault::new(
                CameraFaultKind::DeviceBusy,
                "replay stream already open",
            ));
        }
        self.frames = self.load_frames().await?;
        self.cursor = 0;
        self.streaming = true;
        info!(
            "Replay camera opened with {} frames ({:?})",
            self.frames.len(),
            constraints.facing
        );
        Ok(())
    }

    async fn force_playback(&mut self) -> Result<(), CameraFault> {
        if self.streaming {
            Ok(())
        } else {
            Err(CameraFault::new(CameraFaultKind::Other, "replay stream not open"))
        }
    }

    fn capture_into(&mut self, surface: &mut Frame) -> Result<bool, CameraFault> {
        if !self.streaming {
            return Ok(false);
        }
        let Some(frame) = self.frames.get(self.cursor) else {
            return Ok(false);
        };
        surface.copy_from(frame.width, frame.height, &frame.data);
        if self.cursor + 1 < self.frames.len() {
            self.cursor += 1;
        }
        debug!("Replay frame {} captured", self.cursor);
        Ok(true)
    }

    fn stop_tracks(&mut self) {
        self.streaming = false;
        self.frames.clear();
        self.cursor = 0;
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }
}
