//! Scripted collaborators for tests and offline replay.

use crate::capture::{StatusMessage, StatusSink};
use crate::detection::Detector;
use crate::errors::CaptureError;
use crate::storage::StorageSink;
use crate::types::{BoundingBox, CameraFrame, DetectionBatch};
use image::RgbImage;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Replays a fixed list of per-frame detections, then reports nothing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDetector {
    script: VecDeque<Vec<BoundingBox>>,
    latency: Duration,
    calls: Arc<Mutex<u64>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<BoundingBox>>) -> Self {
        Self {
            script: script.into(),
            latency: Duration::from_millis(5),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Same detections for every one of `frames` calls.
    pub fn repeating(boxes: Vec<BoundingBox>, frames: usize) -> Self {
        Self::new(vec![boxes; frames])
    }

    /// Shared counter of `detect` calls, readable after the detector moves.
    pub fn call_counter(&self) -> Arc<Mutex<u64>> {
        self.calls.clone()
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(&mut self, _frame: &CameraFrame) -> Result<DetectionBatch, CaptureError> {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        let boxes = self.script.pop_front().unwrap_or_default();
        Ok(DetectionBatch::new(boxes, self.latency))
    }
}

/// Collects every published message; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingStatusSink {
    messages: Arc<Mutex<Vec<StatusMessage>>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<StatusMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }
}

impl StatusSink for RecordingStatusSink {
    fn publish(&self, message: &StatusMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
    }
}

/// Storage sink that always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStorage;

impl StorageSink for FailingStorage {
    fn store(&mut self, _image: &RgbImage, filename: &str) -> Result<PathBuf, CaptureError> {
        Err(CaptureError::Storage(format!("refusing to store {}", filename)))
    }
}
