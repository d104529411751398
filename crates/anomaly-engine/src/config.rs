//! Configuration for the anomaly engine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::features::FeatureThresholds;
use crate::regrid::InterpolationMethod;

/// Configuration for normalization, anomaly computation, feature extraction
/// and the climatology/anomaly stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Degree-day base temperature in °C.
    pub base_temperature_c: f32,

    /// Temperature anomaly (°C) above which a cell counts as hot.
    pub hot_threshold_c: f32,

    /// Temperature anomaly (°C) below which a cell counts as cold.
    pub cold_threshold_c: f32,

    /// Temperatures whose maximum exceeds this are treated as Kelvin.
    pub kelvin_detection_threshold: f32,

    /// Interpolation method for regridding the climatology.
    pub interpolation: InterpolationMethod,

    /// Opt-in: use the nearest present day-of-year bucket within this many
    /// days when the exact bucket is absent. `None` means exact match only.
    pub bucket_fallback_days: Option<u16>,

    /// Spatial chunk edge for Zarr stores.
    pub zarr_chunk_size: usize,

    /// Compression codec for Zarr stores.
    pub zarr_compression: ZarrCompression,

    /// Compression level (1-9).
    pub zarr_compression_level: u8,

    /// Enable byte shuffle filter for better compression.
    pub zarr_shuffle: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_temperature_c: 18.0,
            hot_threshold_c: 8.0,
            cold_threshold_c: -8.0,
            kelvin_detection_threshold: 200.0,
            interpolation: InterpolationMethod::Bilinear,
            bucket_fallback_days: None,
            zarr_chunk_size: 256,
            zarr_compression: ZarrCompression::BloscZstd,
            zarr_compression_level: 1,
            zarr_shuffle: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `CLIMATE_*` environment variables on top of the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay values from a key lookup on top of the defaults.
    ///
    /// Unparseable values are ignored and the default kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("CLIMATE_BASE_TEMPERATURE_C") {
            if let Ok(v) = val.parse() {
                config.base_temperature_c = v;
            }
        }

        if let Some(val) = lookup("CLIMATE_HOT_THRESHOLD_C") {
            if let Ok(v) = val.parse() {
                config.hot_threshold_c = v;
            }
        }

        if let Some(val) = lookup("CLIMATE_COLD_THRESHOLD_C") {
            if let Ok(v) = val.parse() {
                config.cold_threshold_c = v;
            }
        }

        if let Some(val) = lookup("CLIMATE_KELVIN_THRESHOLD") {
            if let Ok(v) = val.parse() {
                config.kelvin_detection_threshold = v;
            }
        }

        if let Some(val) = lookup("CLIMATE_INTERPOLATION") {
            config.interpolation = InterpolationMethod::from_str(&val);
        }

        if let Some(val) = lookup("CLIMATE_BUCKET_FALLBACK_DAYS") {
            config.bucket_fallback_days = match val.to_lowercase().as_str() {
                "" | "none" | "off" => None,
                other => other.parse().ok().or(config.bucket_fallback_days),
            };
        }

        if let Some(val) = lookup("CLIMATE_ZARR_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.zarr_chunk_size = size;
            }
        }

        if let Some(val) = lookup("CLIMATE_ZARR_COMPRESSION") {
            config.zarr_compression = ZarrCompression::from_str(&val);
        }

        if let Some(val) = lookup("CLIMATE_ZARR_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.zarr_compression_level = level;
            }
        }

        if let Some(val) = lookup("CLIMATE_ZARR_SHUFFLE") {
            config.zarr_shuffle = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate().map_err(EngineError::Config)?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [
            ("base_temperature_c", self.base_temperature_c),
            ("hot_threshold_c", self.hot_threshold_c),
            ("cold_threshold_c", self.cold_threshold_c),
            ("kelvin_detection_threshold", self.kelvin_detection_threshold),
        ] {
            if !value.is_finite() {
                return Err(format!("{} must be finite", name));
            }
        }

        if self.cold_threshold_c >= self.hot_threshold_c {
            return Err("cold_threshold_c must be below hot_threshold_c".to_string());
        }

        if let Some(days) = self.bucket_fallback_days {
            if days > 183 {
                return Err("bucket_fallback_days must be <= 183".to_string());
            }
        }

        if self.zarr_chunk_size == 0 {
            return Err("zarr_chunk_size must be > 0".to_string());
        }

        if self.zarr_compression_level == 0 || self.zarr_compression_level > 9 {
            return Err("zarr_compression_level must be 1-9".to_string());
        }

        Ok(())
    }

    /// Extreme-area thresholds for feature extraction.
    pub fn thresholds(&self) -> FeatureThresholds {
        FeatureThresholds {
            hot_threshold: self.hot_threshold_c,
            cold_threshold: self.cold_threshold_c,
        }
    }
}

/// Compression codec for Zarr stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd (recommended).
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" | "blosc_lz4" => Self::BloscLz4,
            _ => Self::BloscZstd,
        }
    }

    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
