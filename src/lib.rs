//! CrabScan: autonomous document/card auto-capture
//!
//! This crate decides, frame by frame, the single right moment to capture a
//! document from a live camera feed and produces a cleaned-up still.
//!
//! # Features
//! - Candidate selection from labelled, confidence-scored detector boxes
//! - Temporal stability tracking across frames
//! - Quadrilateral extraction and clamped cropping
//! - Variance-based blur screening
//! - 3x3 sharpening of the final capture
//! - A serialized worker with keep-latest frame dropping and race-free retake
//!
//! The camera, the detection model, the UI and persistence stay outside: the
//! core talks to them through [`Detector`], [`StatusSink`] and
//! [`StorageSink`].
//!
//! # Usage
//! ```rust,no_run
//! use crabscan::capture::{CaptureEngine, CaptureSession};
//! use crabscan::types::{BoundingBox, CameraFrame};
//!
//! let engine = CaptureEngine::default();
//! let mut session = CaptureSession::new();
//! # let frames: Vec<(CameraFrame, Vec<BoundingBox>)> = Vec::new();
//! for (frame, boxes) in frames {
//!     let (next, decision) = engine.advance(session, &frame, &boxes);
//!     session = next;
//!     if decision.is_captured() {
//!         break;
//!     }
//! }
//! ```
pub mod capture;
pub mod config;
pub mod detection;
pub mod errors;
pub mod geometry;
pub mod quality;
pub mod stability;
pub mod storage;
pub mod timing;
pub mod types;
pub mod worker;

// Testing utilities - synthetic frames and scripted collaborators
pub mod testing;

// Re-exports for convenience
pub use capture::{
    CaptureDecision, CaptureEngine, CaptureSession, CaptureState, StatusMessage, StatusSink,
};
pub use config::CrabScanConfig;
pub use detection::{CandidateSelector, Detector};
pub use errors::CaptureError;
pub use storage::{DirectoryStorage, MemoryStorage, StorageSink};
pub use types::{BoundingBox, CameraFrame, DetectionBatch};
pub use worker::AutoCaptureWorker;

/// Initialize logging for the capture pipeline
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabscan=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
