//! Blur screening via grayscale variance
//!
//! The crop is resampled to a small fixed square and the population variance
//! of its channel-mean intensities is compared against a threshold. Low
//! variance means little edge energy, a cheap stand-in for defocus.
use crate::config::{QualityConfig, MAX_BLUR_SAMPLE_SIZE};
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Variance statistics for one crop
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BlurMetrics {
    /// Mean grayscale intensity (0-255)
    pub mean: f64,
    /// Population variance of grayscale intensity
    pub variance: f64,
    /// Number of samples the statistics were computed over
    pub samples: usize,
    pub is_blurred: bool,
}

/// Stateless variance-threshold blur test
#[derive(Debug, Clone)]
pub struct BlurDetector {
    sample_size: u32,
    variance_threshold: f64,
}

impl Default for BlurDetector {
    fn default() -> Self {
        Self::new(&QualityConfig::default())
    }
}

impl BlurDetector {
    /// Out-of-range sample sizes are clamped to `1..=MAX_BLUR_SAMPLE_SIZE`.
    pub fn new(config: &QualityConfig) -> Self {
        Self {
            sample_size: config.blur_sample_size.clamp(1, MAX_BLUR_SAMPLE_SIZE),
            variance_threshold: config.blur_variance_threshold,
        }
    }

    pub fn with_threshold(mut self, variance_threshold: f64) -> Self {
        self.variance_threshold = variance_threshold;
        self
    }

    pub fn variance_threshold(&self) -> f64 {
        self.variance_threshold
    }

    /// Compute variance statistics for a crop.
    ///
    /// An empty crop has no samples and is reported as blurred.
    pub fn analyze(&self, region: &RgbImage) -> BlurMetrics {
        if region.width() == 0 || region.height() == 0 {
            return BlurMetrics {
                mean: 0.0,
                variance: 0.0,
                samples: 0,
                is_blurred: true,
            };
        }

        let scaled = imageops::resize(
            region,
            self.sample_size,
            self.sample_size,
            FilterType::Triangle,
        );

        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for pixel in scaled.pixels() {
            let [r, g, b] = pixel.0;
            let gray = (r as f64 + g as f64 + b as f64) / 3.0;
            sum += gray;
            sum_sq += gray * gray;
        }

        let samples = self.sample_size as usize * self.sample_size as usize;
        let mean = sum / samples as f64;
        // Rounding can push a flat patch slightly negative
        let variance = (sum_sq / samples as f64 - mean * mean).max(0.0);
        let is_blurred = variance < self.variance_threshold;

        log::debug!(
            "Blur variance={:.2} (threshold {:.2}) -> {}",
            variance,
            self.variance_threshold,
            if is_blurred { "blurred" } else { "sharp" }
        );

        BlurMetrics {
            mean,
            variance,
            samples,
            is_blurred,
        }
    }

    pub fn is_blurred(&self, region: &RgbImage) -> bool {
        self.analyze(region).is_blurred
    }
}
