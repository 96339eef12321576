//! QR decoding via an ordered strategy cascade.
//!
//! Phone cameras present codes at arbitrary scale, off-centre and under
//! uneven light. Each strategy targets one of those failure modes and the
//! cascade stops at the first payload that passes validation:
//!
//! - **Direct** reads the frame at native resolution, normal then inverted polarity.
//! - **Downscale** resamples wide frames to a fixed width for small or distant codes.
//! - **CenterCrop** keeps a square around the centre when the background is cluttered.
//! - **Binarize** applies hard thresholds against glare and poor lighting.

use barang_types::{
    config::DecoderConfig,
    frame::Frame,
    geometry::{Corners, Point},
    scan::DecodedCode,
};
use image::GrayImage;
use rqrr::PreparedImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::preprocess::{binarize, center_crop, downscale_to_width, invert, to_greyscale};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    Downscale,
    CenterCrop,
    Binarize,
}

impl Strategy {
    pub const CASCADE: [Strategy; 4] = [
        Strategy::Direct,
        Strategy::Downscale,
        Strategy::CenterCrop,
        Strategy::Binarize,
    ];
}

/// Raw symbol read, in the coordinate space of the image it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub content: String,
    pub corners: Option<Corners>,
}

/// Low-level symbol reader the cascade drives.
pub trait SymbolDetector: Send + Sync {
    fn detect(&self, image: &GrayImage) -> Option<Detection>;
}

/// Pure Rust QR reader backed by rqrr.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDetector;

impl SymbolDetector for RqrrDetector {
    fn detect(&self, image: &GrayImage) -> Option<Detection> {
        let (width, height) = image.dimensions();
        let mut prepared = PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| image.get_pixel(x as u32, y as u32)[0],
        );
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => {
                    let [a, b, c, d] = grid.bounds;
                    let corners = Corners([
                        Point::new(a.x, a.y),
                        Point::new(b.x, b.y),
                        Point::new(c.x, c.y),
                        Point::new(d.x, d.y),
                    ]);
                    return Some(Detection {
                        content,
                        corners: Some(corners),
                    });
                }
                Err(err) => debug!("Grid decode failed: {:?}", err),
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Found(DecodedCode),
    /// A symbol was read but its content failed the length gate.
    Rejected { raw: String },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    pub outcome: DecodeOutcome,
    /// Strategy that produced the accepted payload.
    pub strategy: Option<Strategy>,
    pub detector_calls: u32,
}

pub struct Decoder<D = RqrrDetector> {
    config: DecoderConfig,
    detector: D,
}

impl Decoder<RqrrDetector> {
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_detector(config, RqrrDetector)
    }
}

impl<D: SymbolDetector> Decoder<D> {
    pub fn with_detector(config: DecoderConfig, detector: D) -> Self {
        Self { config, detector }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn decode(&self, frame: &Frame) -> DecodeReport {
        let mut report = DecodeReport {
            outcome: DecodeOutcome::NotFound,
            strategy: None,
            detector_calls: 0,
        };
        let Some(grey) = to_greyscale(frame) else {
            return report;
        };

        let mut rejected: Option<String> = None;
        for strategy in Strategy::CASCADE {
            let Some(detection) = self.run_strategy(strategy, &grey, &mut report.detector_calls)
            else {
                continue;
            };
            match validate_payload(&detection.content, &self.config) {
                Some(payload) => {
                    debug!("Decoded {:?} via {:?}", payload, strategy);
                    report.outcome = DecodeOutcome::Found(DecodedCode {
                        payload,
                        corners: detection.corners,
                    });
                    report.strategy = Some(strategy);
                    return report;
                }
                None => {
                    warn!(
                        "Discarding {:?} from {:?}: length outside {}..={}",
                        detection.content,
                        strategy,
                        self.config.min_payload_len,
                        self.config.max_payload_len
                    );
                    rejected.get_or_insert(detection.content);
                }
            }
        }

        if let Some(raw) = rejected {
            report.outcome = DecodeOutcome::Rejected { raw };
        }
        report
    }

    /// Runs one strategy; corners in the result are mapped back to frame space.
    fn run_strategy(
        &self,
        strategy: Strategy,
        grey: &GrayImage,
        calls: &mut u32,
    ) -> Option<Detection> {
        let mut detect = |image: &GrayImage| {
            *calls += 1;
            self.detector.detect(image)
        };

        match strategy {
            Strategy::Direct => detect(grey).or_else(|| detect(&invert(grey))),
            Strategy::Downscale => {
                if grey.width() <= self.config.downscale_width {
                    return None;
                }
                let (small, factor) = downscale_to_width(grey, self.config.downscale_width);
                detect(&small).map(|d| map_corners(d, |p| p.scale(factor)))
            }
            Strategy::CenterCrop => {
                let (crop, (x, y)) = center_crop(grey, self.config.crop_fraction);
                detect(&crop).map(|d| map_corners(d, |p| p.translate(x as i32, y as i32)))
            }
            Strategy::Binarize => {
                let binary = binarize(
                    grey,
                    self.config.binarize_low,
                    self.config.binarize_mid,
                    self.config.binarize_high,
                );
                detect(&binary)
            }
        }
    }
}

fn map_corners(detection: Detection, f: impl Fn(Point) -> Point) -> Detection {
    Detection {
        corners: detection.corners.map(|c| c.map(f)),
        ..detection
    }
}

/// Trims and length-checks a raw read; `None` means "treat as not found".
pub fn validate_payload(raw: &str, config: &DecoderConfig) -> Option<String> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    (config.min_payload_len..=config.max_payload_len)
        .contains(&len)
        .then(|| trimmed.to_string())
}
