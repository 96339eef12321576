//! Cheap plausibility checks run on every frame before decoding.

use barang_types::{config::ValidatorConfig, frame::Frame, scan::FrameRejection};
use serde::{Deserialize, Serialize};

/// Coarse fingerprint of a frame used to spot a stalled stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSignature {
    pub luminance: i32,
    pub non_black_percent: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StabilityState {
    pub last_signature: Option<FrameSignature>,
    /// Consecutive frames whose signature matched the previous one.
    pub consecutive_unchanged: u32,
}

impl StabilityState {
    fn advance(self, signature: FrameSignature) -> Self {
        if self.last_signature == Some(signature) {
            Self {
                last_signature: Some(signature),
                consecutive_unchanged: self.consecutive_unchanged + 1,
            }
        } else {
            Self {
                last_signature: Some(signature),
                consecutive_unchanged: 0,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAnalysis {
    pub accept: bool,
    pub rejection: Option<FrameRejection>,
    pub luminance: f32,
    pub non_black_ratio: f32,
    pub non_black_samples: usize,
    pub sampled: usize,
    pub signature: FrameSignature,
    pub stability: StabilityState,
}

#[derive(Debug, Clone, Copy)]
struct SampleStats {
    luminance: f32,
    non_black_ratio: f32,
    non_black_samples: usize,
    sampled: usize,
}

pub struct FrameValidator {
    config: ValidatorConfig,
    stability: StabilityState,
}

impl FrameValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            stability: StabilityState::default(),
        }
    }

    pub fn stability(&self) -> StabilityState {
        self.stability
    }

    pub fn reset(&mut self) {
        self.stability = StabilityState::default();
    }

    /// Evaluates a frame and advances the stability counter.
    pub fn check(&mut self, frame: &Frame) -> FrameAnalysis {
        let analysis = self.evaluate(frame, self.stability);
        self.stability = analysis.stability;
        analysis
    }

    /// Content check only; leaves the stability counter untouched.
    pub fn has_content(&self, frame: &Frame) -> bool {
        self.is_content_bearing(&self.sample(frame))
    }

    /// Pure evaluation against an explicit previous stability state.
    pub fn evaluate(&self, frame: &Frame, previous: StabilityState) -> FrameAnalysis {
        let stats = self.sample(frame);
        let signature = FrameSignature {
            luminance: stats.luminance.round() as i32,
            non_black_percent: (stats.non_black_ratio * 100.0).round() as i32,
        };
        let stability = previous.advance(signature);
        let frozen = stability.consecutive_unchanged + 1 >= self.config.freeze_after_frames;

        let rejection = if !self.is_content_bearing(&stats) {
            Some(FrameRejection::NoContent)
        } else if frozen {
            Some(FrameRejection::Frozen)
        } else {
            None
        };

        FrameAnalysis {
            accept: rejection.is_none(),
            rejection,
            luminance: stats.luminance,
            non_black_ratio: stats.non_black_ratio,
            non_black_samples: stats.non_black_samples,
            sampled: stats.sampled,
            signature,
            stability,
        }
    }

    fn is_content_bearing(&self, stats: &SampleStats) -> bool {
        stats.non_black_ratio > self.config.min_non_black_ratio
            && stats.luminance >= self.config.min_luminance
            && stats.luminance <= self.config.max_luminance
            && stats.non_black_samples >= self.config.min_non_black_samples
    }

    fn sample(&self, frame: &Frame) -> SampleStats {
        let threshold = self.config.dark_channel_threshold;
        let pixels = if frame.is_empty() { 0 } else { frame.pixel_count() };

        let mut sampled = 0usize;
        let mut non_black = 0usize;
        let mut luminance_sum = 0f64;
        for idx in (0..pixels).step_by(self.config.sample_stride.max(1)) {
            let px = &frame.data[idx * 4..idx * 4 + 3];
            let (r, g, b) = (px[0], px[1], px[2]);
            sampled += 1;
            if r > threshold || g > threshold || b > threshold {
                non_black += 1;
            }
            luminance_sum += 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        }

        if sampled == 0 {
            return SampleStats {
                luminance: 0.0,
                non_black_ratio: 0.0,
                non_black_samples: 0,
                sampled: 0,
            };
        }

        SampleStats {
            luminance: (luminance_sum / sampled as f64) as f32,
            non_black_ratio: non_black as f32 / sampled as f32,
            non_black_samples: non_black,
            sampled,
        }
    }
}
