//! Core value types shared across the capture pipeline.

use crate::errors::CaptureError;
use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Borrowed RGB view over a frame's pixel bytes.
pub type RgbView<'a> = ImageBuffer<Rgb<u8>, &'a [u8]>;

/// One detector output box in normalized frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Detector confidence in `[0, 1]`
    #[serde(alias = "cnf")]
    pub confidence: f32,
    /// Class label as reported by the detector
    #[serde(alias = "clsName", alias = "cls_name")]
    pub label: String,
}

impl BoundingBox {
    pub fn new(
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        confidence: f32,
        label: impl Into<String>,
    ) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            label: label.into(),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn cx(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    pub fn cy(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }

    /// Width over height, or `None` when the box has no positive extent.
    pub fn aspect_ratio(&self) -> Option<f32> {
        if self.is_valid() {
            Some(self.width() / self.height())
        } else {
            None
        }
    }

    /// Finite coordinates with `x2 > x1` and `y2 > y1`.
    pub fn is_valid(&self) -> bool {
        let finite = [self.x1, self.y1, self.x2, self.y2, self.confidence]
            .iter()
            .all(|v| v.is_finite());
        finite && self.x2 > self.x1 && self.y2 > self.y1
    }
}

/// Detector output for a single frame.
#[derive(Debug, Clone, Default)]
pub struct DetectionBatch {
    pub boxes: Vec<BoundingBox>,
    /// Inference latency reported by the detector
    pub latency: Duration,
}

impl DetectionBatch {
    pub fn new(boxes: Vec<BoundingBox>, latency: Duration) -> Self {
        Self { boxes, latency }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Immutable RGB frame handed to the core by the camera pipeline.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Packed RGB24 bytes, row-major
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Producer sequence number (1-based when assigned by the worker)
    pub sequence: u64,
    /// Microseconds since the producing clock started
    pub timestamp_us: u64,
}

impl CameraFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            sequence: 0,
            timestamp_us: 0,
        }
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_timestamp_us(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Borrow the pixels as an RGB image view.
    ///
    /// Fails when the buffer length does not match `width * height * 3`.
    pub fn view(&self) -> Result<RgbView<'_>, CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::InvalidFrame(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }
        if self.data.len() != self.expected_len() {
            return Err(CaptureError::InvalidFrame(format!(
                "got {} bytes, expected {} for {}x{} RGB",
                self.data.len(),
                self.expected_len(),
                self.width,
                self.height
            )));
        }
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice()).ok_or_else(|| {
            CaptureError::InvalidFrame("buffer does not fit frame dimensions".to_string())
        })
    }
}
