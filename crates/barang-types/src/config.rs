use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{BarangError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Origin the scanner is served from; camera access needs a secure one.
    pub origin: String,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub frame_rate: u32,
    pub settle_delay_ms: u64,
    pub init_retries: u8,
    pub retry_backoff_ms: u64,
    pub init_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost".into(),
            ideal_width: 1280,
            ideal_height: 720,
            frame_rate: 30,
            settle_delay_ms: 500,
            init_retries: 3,
            retry_backoff_ms: 300,
            init_timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Sample every Nth pixel.
    pub sample_stride: usize,
    /// A sample is non-black when any channel exceeds this value.
    pub dark_channel_threshold: u8,
    pub min_non_black_ratio: f32,
    pub min_luminance: f32,
    pub max_luminance: f32,
    pub min_non_black_samples: usize,
    /// Run length of identical signatures after which frames count as frozen.
    pub freeze_after_frames: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            sample_stride: 100,
            dark_channel_threshold: 20,
            min_non_black_ratio: 0.2,
            min_luminance: 15.0,
            max_luminance: 240.0,
            min_non_black_samples: 10,
            freeze_after_frames: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub downscale_width: u32,
    pub crop_fraction: f32,
    pub min_payload_len: usize,
    pub max_payload_len: usize,
    pub binarize_low: u8,
    pub binarize_mid: u8,
    pub binarize_high: u8,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            downscale_width: 640,
            crop_fraction: 0.7,
            min_payload_len: 4,
            max_payload_len: 50,
            binarize_low: 64,
            binarize_mid: 128,
            binarize_high: 192,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub tick_interval_ms: u64,
    pub suggest_manual_after_attempts: u64,
    pub hint_delay_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 150,
            suggest_manual_after_attempts: 50,
            hint_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// TOML directory of known lockers used by the file-backed lookup.
    pub directory_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
    pub telemetry_dir: Option<String>,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            telemetry_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BarangConfig {
    pub camera: CameraConfig,
    pub validator: ValidatorConfig,
    pub decoder: DecoderConfig,
    pub scanner: ScannerConfig,
    pub lookup: LookupConfig,
    pub ops: OpsConfig,
}

impl BarangConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            BarangError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            BarangError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.ideal_width == 0 || self.camera.ideal_height == 0 {
            return Err(config_error("camera ideal resolution must be non-zero"));
        }
        if self.validator.sample_stride == 0 {
            return Err(config_error("validator.sample_stride must be greater than zero"));
        }
        if !(0.0..1.0).contains(&self.validator.min_non_black_ratio) {
            return Err(config_error(
                "validator.min_non_black_ratio must be within [0.0, 1.0)",
            ));
        }
        if self.validator.min_luminance >= self.validator.max_luminance {
            return Err(config_error(
                "validator.min_luminance must be below validator.max_luminance",
            ));
        }
        if self.validator.freeze_after_frames < 2 {
            return Err(config_error("validator.freeze_after_frames must be at least 2"));
        }
        if !(self.decoder.crop_fraction > 0.0 && self.decoder.crop_fraction <= 1.0) {
            return Err(config_error("decoder.crop_fraction must be within (0.0, 1.0]"));
        }
        if self.decoder.downscale_width == 0 {
            return Err(config_error("decoder.downscale_width must be greater than zero"));
        }
        if self.decoder.min_payload_len == 0
            || self.decoder.min_payload_len > self.decoder.max_payload_len
        {
            return Err(config_error(
                "decoder payload length bounds must satisfy 0 < min <= max",
            ));
        }
        if !(self.decoder.binarize_low <= self.decoder.binarize_mid
            && self.decoder.binarize_mid <= self.decoder.binarize_high)
        {
            return Err(config_error(
                "decoder binarize thresholds must satisfy low <= mid <= high",
            ));
        }
        if self.scanner.tick_interval_ms == 0 {
            return Err(config_error("scanner.tick_interval_ms must be greater than zero"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> BarangError {
    BarangError::Configuration(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_config_from_file_with_partial_sections() {
        let temp_path = std::env::temp_dir().join("barang-config-test.toml");
        let doc = r#"
            [camera]
            origin = "https://barang.example"
            init_retries = 5

            [scanner]
            tick_interval_ms = 200
        "#;
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = BarangConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded.camera.origin, "https://barang.example");
        assert_eq!(loaded.camera.init_retries, 5);
        assert_eq!(loaded.camera.ideal_width, 1280);
        assert_eq!(loaded.scanner.tick_interval_ms, 200);
        assert_eq!(loaded.decoder.max_payload_len, 50);
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn round_trips_through_toml() {
        let config = BarangConfig::default();
        let doc = toml::to_string(&config).expect("serialize config");
        let parsed: BarangConfig = toml::from_str(&doc).expect("parse config");
        assert_eq!(parsed.validator.freeze_after_frames, 10);
        assert_eq!(parsed.decoder.binarize_high, 192);
    }

    #[test]
    fn validate_configuration_rules() {
        let mut config = BarangConfig::default();
        assert!(config.validate().is_ok());

        config.validator.sample_stride = 0;
        assert!(config.validate().is_err());
        config.validator.sample_stride = 100;

        config.decoder.crop_fraction = 1.5;
        assert!(config.validate().is_err());
        config.decoder.crop_fraction = 0.7;

        config.decoder.downscale_width = 0;
        assert!(config.validate().is_err());
        config.decoder.downscale_width = 640;

        config.decoder.min_payload_len = 60;
        assert!(config.validate().is_err());
        config.decoder.min_payload_len = 4;

        config.decoder.binarize_low = 200;
        assert!(config.validate().is_err());
        config.decoder.binarize_low = 64;

        config.validator.min_luminance = 250.0;
        assert!(config.validate().is_err());
        config.validator.min_luminance = 15.0;

        config.scanner.tick_interval_ms = 0;
        assert!(config.validate().is_err());
        config.scanner.tick_interval_ms = 150;

        assert!(config.validate().is_ok());
    }
}
