//! Detector collaborator boundary and per-frame candidate selection.
//!
//! The object detector is a black box: the core only needs a label, four
//! normalized coordinates and a confidence per box.
pub mod selector;

pub use selector::CandidateSelector;

use crate::errors::CaptureError;
use crate::types::{CameraFrame, DetectionBatch};

/// Synchronous object detector invoked from the capture worker.
///
/// Implementations must treat the frame as read-only.
pub trait Detector: Send {
    /// Backend identifier used in logs.
    fn name(&self) -> &str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &CameraFrame) -> Result<DetectionBatch, CaptureError>;
}

impl<F> Detector for F
where
    F: FnMut(&CameraFrame) -> Result<DetectionBatch, CaptureError> + Send,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn detect(&mut self, frame: &CameraFrame) -> Result<DetectionBatch, CaptureError> {
        self(frame)
    }
}
