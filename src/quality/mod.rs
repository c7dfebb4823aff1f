//! Capture quality module
//!
//! Screens cropped document regions for defocus and post-processes the
//! accepted capture with a sharpening pass.
pub mod blur;
pub mod sharpen;

pub use blur::{BlurDetector, BlurMetrics};
pub use sharpen::{sharpen, SHARPEN_KERNEL};
