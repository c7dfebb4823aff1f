//! Testing utilities for CrabScan
//!
//! Synthetic frames and scripted collaborators for driving the capture
//! pipeline offline, without a camera or a detection model.

pub mod doubles;
pub mod synthetic_data;

pub use doubles::{FailingStorage, RecordingStatusSink, ScriptedDetector};
pub use synthetic_data::{card_box, synthetic_card_frame, uniform_frame};
