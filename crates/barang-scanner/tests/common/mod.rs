#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use barang_camera::MockCamera;
use barang_lookup::{DirectoryEntry, DirectoryLookup, LockerLookup};
use barang_types::{
    config::BarangConfig,
    frame::Frame,
    lookup::{Item, Locker, LookupRequest, LookupResponse},
    Result,
};
use barang_vision::{Detection, SymbolDetector};
pub use barang_vision::testing::qr_frame;
use image::GrayImage;

pub fn config() -> BarangConfig {
    let mut config = BarangConfig::default();
    config.camera.origin = "https://barang.example".into();
    config
}

pub fn grey(level: u8) -> Frame {
    Frame::filled(320, 240, [level, level, level, 255])
}

pub fn black() -> Frame {
    Frame::filled(320, 240, [0, 0, 0, 255])
}

/// Reads a payload keyed by the grey level of the top-left pixel.
pub struct MarkerDetector(pub Vec<(u8, &'static str)>);

impl SymbolDetector for MarkerDetector {
    fn detect(&self, image: &GrayImage) -> Option<Detection> {
        let level = image.get_pixel(0, 0)[0];
        self.0
            .iter()
            .find(|(marker, _)| *marker == level)
            .map(|(_, content)| Detection {
                content: content.to_string(),
                corners: None,
            })
    }
}

pub const KNOWN_LEVEL: u8 = 100;
pub const UNKNOWN_LEVEL: u8 = 120;

pub fn markers() -> MarkerDetector {
    MarkerDetector(vec![(KNOWN_LEVEL, "qrcode:4821"), (UNKNOWN_LEVEL, "qrcode:9999")])
}

pub fn directory() -> DirectoryLookup {
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
                category: None,
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

/// Directory lookup that records whether the camera was streaming when asked.
pub struct WatchingLookup {
    inner: DirectoryLookup,
    camera: MockCamera,
    pub streaming_during_lookup: Arc<Mutex<Vec<bool>>>,
}

impl WatchingLookup {
    pub fn new(camera: &MockCamera) -> Self {
        Self {
            inner: directory(),
            camera: camera.clone(),
            streaming_during_lookup: Arc::default(),
        }
    }

    pub fn observed(&self) -> Vec<bool> {
        self.streaming_during_lookup.lock().unwrap().clone()
    }
}

#[async_trait]
impl LockerLookup for WatchingLookup {
    async fn resolve(&self, request: LookupRequest) -> Result<LookupResponse> {
        self.streaming_during_lookup
            .lock()
            .unwrap()
            .push(self.camera.streaming());
        self.inner.resolve(request).await
    }
}

pub fn encode_png(frame: &Frame) -> Vec<u8> {
    let rgba = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone()).unwrap();
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(rgba)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageOutputFormat::Png,
        )
        .unwrap();
    bytes
}
