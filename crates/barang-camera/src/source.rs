use std::net::IpAddr;

use barang_types::{config::CameraConfig, frame::Frame, BarangError, CameraFault, Result};
use tracing::{debug, info, warn};

use crate::{camera_error, CameraBackend, StreamConstraints};

pub enum AcquireMode {
    Camera,
    /// Encoded still image (upload or drag-drop).
    Image(Vec<u8>),
}

enum ActiveSource {
    Camera(StreamConstraints),
    Image { bytes: Vec<u8>, consumed: bool },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourceMetrics {
    pub acquisitions: u64,
    pub failed_acquisitions: u64,
    pub frames_captured: u64,
    pub empty_reads: u64,
}

/// Produces frames from a live camera or a single still image.
///
/// Owns the drawing surface every frame is written into; callers only ever
/// borrow it between captures.
pub struct FrameSource {
    config: CameraConfig,
    backend: Box<dyn CameraBackend>,
    surface: Frame,
    active: Option<ActiveSource>,
    metrics: SourceMetrics,
}

impl FrameSource {
    pub fn new(config: CameraConfig, backend: impl CameraBackend + 'static) -> Self {
        Self {
            config,
            backend: Box::new(backend),
            surface: Frame::empty(),
            active: None,
            metrics: SourceMetrics::default(),
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn metrics(&self) -> SourceMetrics {
        self.metrics
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_constraints(&self) -> Option<&StreamConstraints> {
        match &self.active {
            Some(ActiveSource::Camera(constraints)) => Some(constraints),
            _ => None,
        }
    }

    /// Acquires a new source, releasing whatever was held before.
    pub async fn acquire(&mut self, mode: AcquireMode) -> Result<()> {
        self.release();
        self.metrics.acquisitions += 1;
        let result = match mode {
            AcquireMode::Camera => self.open_camera().await,
            AcquireMode::Image(bytes) => {
                self.active = Some(ActiveSource::Image {
                    bytes,
                    consumed: false,
                });
                Ok(())
            }
        };
        if result.is_err() {
            self.metrics.failed_acquisitions += 1;
        }
        result
    }

    async fn open_camera(&mut self) -> Result<()> {
        if !is_secure_origin(&self.config.origin) {
            warn!("Refusing camera access from insecure origin {}", self.config.origin);
            return Err(BarangError::InsecureContext {
                origin: self.config.origin.clone(),
            });
        }

        let mut last_fault: Option<CameraFault> = None;
        for (attempt, constraints) in StreamConstraints::fallback_chain(&self.config)
            .into_iter()
            .enumerate()
        {
            match self.backend.open(&constraints).await {
                Ok(()) => {
                    info!("Camera stream opened on attempt {} with {:?}", attempt + 1, constraints);
                    self.active = Some(ActiveSource::Camera(constraints));
                    return Ok(());
                }
                Err(fault) => {
                    warn!("Camera constraints {} rejected: {}", attempt + 1, fault);
                    last_fault = Some(match last_fault {
                        Some(previous) => previous.most_specific(fault),
                        None => fault,
                    });
                }
            }
        }

        Err(BarangError::CameraUnavailable(last_fault.unwrap_or_else(|| {
            CameraFault::new(barang_types::CameraFaultKind::Other, "no constraints attempted")
        })))
    }

    /// Captures the next frame into the shared surface.
    ///
    /// Camera mode yields `None` while the stream has nothing to show; image
    /// mode yields the decoded still once and `None` afterwards.
    pub fn next_frame(&mut self) -> Result<Option<&Frame>> {
        let captured = match self.active.as_mut() {
            None => return Err(camera_error("frame requested before a source was acquired")),
            Some(ActiveSource::Camera(_)) => self
                .backend
                .capture_into(&mut self.surface)
                .map_err(BarangError::CameraUnavailable)?,
            Some(ActiveSource::Image { bytes, consumed }) => {
                if *consumed {
                    false
                } else {
                    *consumed = true;
                    let rgba = image::load_from_memory(bytes)
                        .map_err(|err| camera_error(format!("failed to decode image: {err}")))?
                        .to_rgba8();
                    let (width, height) = rgba.dimensions();
                    self.surface.copy_from(width, height, rgba.as_raw());
                    true
                }
            }
        };

        if captured && !self.surface.is_empty() {
            self.metrics.frames_captured += 1;
            Ok(Some(&self.surface))
        } else {
            self.metrics.empty_reads += 1;
            debug!("Frame source returned no pixels");
            Ok(None)
        }
    }

    pub fn surface(&self) -> &Frame {
        &self.surface
    }

    /// Mutable access to the surface, e.g. to draw an overlay after a detection.
    pub fn surface_mut(&mut self) -> &mut Frame {
        &mut self.surface
    }

    pub async fn force_playback(&mut self) -> Result<()> {
        match self.active {
            Some(ActiveSource::Camera(_)) => self
                .backend
                .force_playback()
                .await
                .map_err(BarangError::CameraUnavailable),
            _ => Ok(()),
        }
    }

    /// Stops hardware tracks and detaches the source. Safe to call repeatedly.
    pub fn release(&mut self) {
        match self.active.take() {
            Some(ActiveSource::Camera(_)) => {
                info!("Releasing camera stream");
                self.backend.stop_tracks();
            }
            Some(ActiveSource::Image { .. }) => debug!("Releasing still image source"),
            None => {}
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Camera APIs are only exposed to encrypted transports or loopback hosts.
pub fn is_secure_origin(origin: &str) -> bool {
    let (scheme, rest) = match origin.split_once("://") {
        Some(parts) => parts,
        None => return false,
    };
    let scheme = scheme.to_ascii_lowercase();
    if scheme == "https" || scheme == "wss" {
        return true;
    }

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = if let Some(bracketed) = authority.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or_default()
    } else {
        authority.split(':').next().unwrap_or_default()
    };
    let host = host.to_ascii_lowercase();

    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }
    host.parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockCamera, NoCamera};
    use barang_types::CameraFaultKind;

    fn secure_config() -> CameraConfig {
        CameraConfig {
            origin: "https://barang.example".into(),
            ..CameraConfig::default()
        }
    }

    #[test]
    fn secure_origin_rules() {
        assert!(is_secure_origin("https://barang.example/scan"));
        assert!(is_secure_origin("http://localhost:5173"));
        assert!(is_secure_origin("http://app.localhost"));
        assert!(is_secure_origin("http://127.0.0.1:3000/scan"));
        assert!(is_secure_origin("http://[::1]:8080"));
        assert!(!is_secure_origin("http://192.168.1.20:3000"));
        assert!(!is_secure_origin("http://barang.example"));
        assert!(!is_secure_origin("localhost"));
    }

    #[tokio::test]
    async fn insecure_origin_fails_before_touching_hardware() {
        let camera = MockCamera::new();
        let mut source = FrameSource::new(
            CameraConfig {
                origin: "http://192.168.1.20".into(),
                ..CameraConfig::default()
            },
            camera.clone(),
        );
        let err = source.acquire(AcquireMode::Camera).await.unwrap_err();
        assert!(matches!(err, BarangError::InsecureContext { .. }));
        assert!(camera.state().open_calls.is_empty());
    }

    #[tokio::test]
    async fn falls_back_through_constraint_chain() {
        let camera = MockCamera::new();
        camera.fail_next_open(CameraFault::new(CameraFaultKind::Overconstrained, "16:9"));
        camera.fail_next_open(CameraFault::new(CameraFaultKind::Overconstrained, "rear"));
        let mut source = FrameSource::new(secure_config(), camera.clone());

        source.acquire(AcquireMode::Camera).await.unwrap();
        assert_eq!(camera.state().open_calls.len(), 3);
        assert!(source.active_constraints().unwrap().facing.is_none());
    }

    #[tokio::test]
    async fn reports_most_specific_fault_when_all_attempts_fail() {
        let camera = MockCamera::new();
        camera.fail_next_open(CameraFault::new(CameraFaultKind::Overconstrained, "16:9"));
        camera.fail_next_open(CameraFault::new(CameraFaultKind::PermissionDenied, "denied"));
        camera.fail_next_open(CameraFault::new(CameraFaultKind::NotFound, "none"));
        let mut source = FrameSource::new(secure_config(), camera);

        match source.acquire(AcquireMode::Camera).await {
            Err(BarangError::CameraUnavailable(fault)) => {
                assert_eq!(fault.kind, CameraFaultKind::PermissionDenied)
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(!source.is_active());
        assert_eq!(source.metrics().failed_acquisitions, 1);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let camera = MockCamera::with_frames([Frame::filled(4, 4, [90, 90, 90, 255])]);
        let mut source = FrameSource::new(secure_config(), camera.clone());
        source.acquire(AcquireMode::Camera).await.unwrap();
        assert!(source.next_frame().unwrap().is_some());

        source.release();
        source.release();
        assert!(!source.is_active());
        assert!(!camera.streaming());
        assert_eq!(camera.state().stop_calls, 1);
    }

    #[tokio::test]
    async fn still_image_is_served_once() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(8, 6, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();

        let mut source = FrameSource::new(CameraConfig::default(), NoCamera);
        source.acquire(AcquireMode::Image(png)).await.unwrap();
        let frame = source.next_frame().unwrap().expect("still frame");
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(&frame.data[..4], &[10, 20, 30, 255]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[tokio::test]
    async fn undecodable_image_is_an_error() {
        let mut source = FrameSource::new(CameraConfig::default(), NoCamera);
        source
            .acquire(AcquireMode::Image(b"not an image".to_vec()))
            .await
            .unwrap();
        assert!(source.next_frame().is_err());
    }
}
