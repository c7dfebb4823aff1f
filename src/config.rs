//! Configuration management for CrabScan
//!
//! Provides loading, saving and validation of the tunable capture
//! thresholds, storage preferences and worker timing options.

use crate::errors::CaptureError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Largest accepted blur sample patch side
pub const MAX_BLUR_SAMPLE_SIZE: u32 = 1024;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrabScanConfig {
    pub detection: DetectionConfig,
    pub stability: StabilityConfig,
    pub quality: QualityConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
}

/// Candidate selection gates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionConfig {
    /// Detector class treated as a document (case-insensitive)
    pub target_label: String,
    /// Inclusive lower bound of width/height
    pub min_aspect_ratio: f32,
    /// Inclusive upper bound of width/height
    pub max_aspect_ratio: f32,
    /// Confidence must be strictly greater than this
    pub min_confidence: f32,
}

/// Temporal consensus settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StabilityConfig {
    /// Maximum normalized center shift (exclusive) for a frame to count as stable
    pub max_center_shift: f32,
    /// Consecutive stable frames before a capture is attempted
    pub required_stable_frames: u32,
}

/// Blur screening and post-processing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityConfig {
    /// Side length of the square patch the crop is resampled to
    pub blur_sample_size: u32,
    /// Grayscale variance below which a crop counts as blurred
    pub blur_variance_threshold: f64,
    /// Apply the sharpening filter to the final capture
    pub sharpen: bool,
}

/// Output naming and encoding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub output_directory: String,
    pub filename_prefix: String,
    /// chrono format string for the filename timestamp
    pub timestamp_format: String,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

/// Worker timing options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Auto-reset delay after a capture in milliseconds (0 disables)
    pub capture_reset_delay_ms: u64,
    /// Per-frame processing budget; overruns are logged
    pub frame_budget_ms: u64,
    /// Pending frame slots; older frames are dropped when full
    pub frame_queue_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            target_label: "card".to_string(),
            min_aspect_ratio: 1.3,
            max_aspect_ratio: 1.7,
            min_confidence: 0.80,
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            max_center_shift: 0.02,
            required_stable_frames: 3,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            blur_sample_size: 64,
            blur_variance_threshold: 100.0,
            sharpen: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_directory: "./captures".to_string(),
            filename_prefix: "book_capture".to_string(),
            timestamp_format: "%Y%m%d_%H%M%S".to_string(),
            jpeg_quality: 95,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_reset_delay_ms: 3000,
            frame_budget_ms: 33,
            frame_queue_capacity: 1,
        }
    }
}

impl Default for CrabScanConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            stability: StabilityConfig::default(),
            quality: QualityConfig::default(),
            storage: StorageConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl CrabScanConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CaptureError::Config(format!("Failed to read config file: {}", e)))?;

        let config: CrabScanConfig = toml::from_str(&contents)
            .map_err(|e| CaptureError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(CaptureError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabscan.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let d = &self.detection;
        if d.target_label.trim().is_empty() {
            return Err("Target label must not be empty".to_string());
        }
        if !(d.min_aspect_ratio > 0.0 && d.min_aspect_ratio <= d.max_aspect_ratio) {
            return Err("Aspect ratio bounds must be positive and ordered".to_string());
        }
        if !(0.0..=1.0).contains(&d.min_confidence) {
            return Err("Minimum confidence must be between 0.0 and 1.0".to_string());
        }

        let s = &self.stability;
        if !(s.max_center_shift > 0.0 && s.max_center_shift <= 1.0) {
            return Err("Center shift threshold must be in (0.0, 1.0]".to_string());
        }
        if s.required_stable_frames == 0 {
            return Err("Required stable frames must be at least 1".to_string());
        }

        let q = &self.quality;
        if q.blur_sample_size == 0 || q.blur_sample_size > MAX_BLUR_SAMPLE_SIZE {
            return Err(format!(
                "Blur sample size must be between 1 and {}",
                MAX_BLUR_SAMPLE_SIZE
            ));
        }
        if q.blur_variance_threshold.is_nan() || q.blur_variance_threshold < 0.0 {
            return Err("Blur variance threshold must be non-negative".to_string());
        }

        if self.storage.jpeg_quality == 0 || self.storage.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }
        if self.storage.filename_prefix.contains(['/', '\\']) {
            return Err("Filename prefix must not contain path separators".to_string());
        }

        if self.session.frame_queue_capacity == 0 {
            return Err("Frame queue capacity must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CrabScanConfig::default();
        assert_eq!(config.detection.target_label, "card");
        assert_eq!(config.stability.required_stable_frames, 3);
        assert_eq!(config.quality.blur_sample_size, 64);
        assert_eq!(config.quality.blur_variance_threshold, 100.0);
        assert_eq!(config.session.frame_queue_capacity, 1);
    }

    #[test]
    fn test_config_validation() {
        let config = CrabScanConfig::default();
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.detection.min_aspect_ratio = 2.0;
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.detection.min_confidence = 1.5;
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.stability.required_stable_frames = 0;
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.quality.blur_variance_threshold = f64::NAN;
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.storage.filename_prefix = "../escape".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("crabscan.toml");

        let mut config = CrabScanConfig::default();
        config.detection.target_label = "id_card".to_string();
        config.save_to_file(&config_path).unwrap();

        let loaded = CrabScanConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&CrabScanConfig::default()).unwrap();

        assert!(toml_string.contains("[detection]"));
        assert!(toml_string.contains("[stability]"));
        assert!(toml_string.contains("[quality]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("[session]"));
        assert!(toml_string.contains("blur_variance_threshold"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = CrabScanConfig::load_from_file("nonexistent_crabscan.toml");
        assert_eq!(result.unwrap(), CrabScanConfig::default());
    }

    #[test]
    fn test_load_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        let mut config = CrabScanConfig::default();
        config.storage.jpeg_quality = 0;
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        assert!(matches!(
            CrabScanConfig::load_from_file(&path),
            Err(CaptureError::Config(_))
        ));
    }
}
