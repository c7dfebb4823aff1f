//! Capture state machine
//!
//! Fuses the per-frame selector, stability, geometry and blur checks into a
//! single decision per frame. All cross-frame state lives in
//! [`CaptureSession`], which is passed by value into [`CaptureEngine::advance`]
//! and handed back updated, so the machine can be driven and inspected
//! without any hidden state.
pub mod status;

pub use status::{LogStatusSink, Severity, StatusMessage, StatusSink};

use crate::config::CrabScanConfig;
use crate::detection::CandidateSelector;
use crate::geometry::{self, PixelRect, Quadrilateral};
use crate::quality::{self, BlurDetector, BlurMetrics};
use crate::stability::{StabilityTracker, StabilityUpdate};
use crate::types::{BoundingBox, CameraFrame};
use image::RgbImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CaptureState {
    /// No acceptable candidate in view
    Searching,
    /// Candidate present, stability run below threshold
    Stabilizing,
    /// Run reached threshold; geometry and blur checks in progress
    Evaluating,
    /// Terminal until an explicit retake
    Captured,
}

/// Cross-frame session state, exclusively owned by whoever drives the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSession {
    /// Anchor candidate of the current stability run
    pub last_candidate: Option<BoundingBox>,
    pub stable_frame_count: u32,
    pub has_captured: bool,
    pub state: CaptureState,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            last_candidate: None,
            stable_frame_count: 0,
            has_captured: false,
            state: CaptureState::Searching,
        }
    }

    /// Return to `Searching` with no candidate and a zero counter.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Why an eligible frame produced no capture and no penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Crop had no area after clamping to the frame
    DegenerateGeometry,
    /// Pixel buffer does not match the frame dimensions
    CorruptFrame,
}

/// Final processed still plus where it came from.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub image: RgbImage,
    pub candidate: BoundingBox,
    pub quad: Quadrilateral,
    pub source_rect: PixelRect,
    pub blur: BlurMetrics,
    pub frame_sequence: u64,
}

/// Outcome of evaluating one frame.
#[derive(Debug, Clone)]
pub enum CaptureDecision {
    /// No candidate passed the gates; stability cleared
    Searching,
    /// Candidate tracked but not yet stable long enough
    Stabilizing {
        stable_frames: u32,
        required: u32,
        restarted: bool,
    },
    /// Eligible frame skipped without touching the counter
    Skipped { reason: SkipReason },
    /// Crop failed the variance test; counter reset to zero
    BlurRejected { metrics: BlurMetrics },
    Captured(Box<CapturedImage>),
    /// Session already captured; frame not evaluated
    Idle,
}

impl CaptureDecision {
    pub fn is_captured(&self) -> bool {
        matches!(self, CaptureDecision::Captured(_))
    }
}

/// Per-frame evaluator built from configuration.
#[derive(Debug, Clone)]
pub struct CaptureEngine {
    selector: CandidateSelector,
    tracker: StabilityTracker,
    blur: BlurDetector,
    sharpen: bool,
}

impl Default for CaptureEngine {
    fn default() -> Self {
        Self::new(&CrabScanConfig::default())
    }
}

impl CaptureEngine {
    pub fn new(config: &CrabScanConfig) -> Self {
        Self {
            selector: CandidateSelector::new(&config.detection),
            tracker: StabilityTracker::new(&config.stability),
            blur: BlurDetector::new(&config.quality),
            sharpen: config.quality.sharpen,
        }
    }

    pub fn required_stable_frames(&self) -> u32 {
        self.tracker.required_stable_frames()
    }

    /// Evaluate one frame and its detections against the session.
    pub fn advance(
        &self,
        mut session: CaptureSession,
        frame: &CameraFrame,
        detections: &[BoundingBox],
    ) -> (CaptureSession, CaptureDecision) {
        if session.has_captured {
            return (session, CaptureDecision::Idle);
        }

        let candidate = self.selector.select(detections);
        let update = self.tracker.update(
            &mut session.last_candidate,
            &mut session.stable_frame_count,
            candidate.as_ref(),
        );

        let Some(candidate) = candidate else {
            self.transition(&mut session, CaptureState::Searching);
            return (session, CaptureDecision::Searching);
        };

        if !self.tracker.is_eligible(session.stable_frame_count) {
            self.transition(&mut session, CaptureState::Stabilizing);
            let decision = CaptureDecision::Stabilizing {
                stable_frames: session.stable_frame_count,
                required: self.tracker.required_stable_frames(),
                restarted: update == StabilityUpdate::Restarted,
            };
            return (session, decision);
        }

        self.transition(&mut session, CaptureState::Evaluating);

        let view = match frame.view() {
            Ok(view) => view,
            Err(e) => {
                log::warn!("Skipping frame {}: {}", frame.sequence, e);
                self.transition(&mut session, CaptureState::Stabilizing);
                let decision = CaptureDecision::Skipped {
                    reason: SkipReason::CorruptFrame,
                };
                return (session, decision);
            }
        };

        let Some(region) = geometry::extract_region(&candidate, frame.width, frame.height) else {
            self.transition(&mut session, CaptureState::Stabilizing);
            let decision = CaptureDecision::Skipped {
                reason: SkipReason::DegenerateGeometry,
            };
            return (session, decision);
        };

        let cropped = geometry::crop(&view, &region.rect);
        let metrics = self.blur.analyze(&cropped);

        if metrics.is_blurred {
            log::debug!("Skipped: blurred crop (variance {:.2})", metrics.variance);
            session.stable_frame_count = 0;
            self.transition(&mut session, CaptureState::Stabilizing);
            return (session, CaptureDecision::BlurRejected { metrics });
        }

        let oriented = geometry::orient_portrait(cropped);
        let image = if self.sharpen {
            quality::sharpen(&oriented)
        } else {
            oriented
        };

        session.has_captured = true;
        self.transition(&mut session, CaptureState::Captured);
        log::info!(
            "Captured {}x{} image from frame {} (rect {:?})",
            image.width(),
            image.height(),
            frame.sequence,
            region.rect
        );

        let captured = CapturedImage {
            image,
            candidate,
            quad: region.quad,
            source_rect: region.rect,
            blur: metrics,
            frame_sequence: frame.sequence,
        };
        (session, CaptureDecision::Captured(Box::new(captured)))
    }

    /// Explicit retake: a fresh session regardless of the current one.
    pub fn retake(&self, _session: CaptureSession) -> CaptureSession {
        CaptureSession::new()
    }

    fn transition(&self, session: &mut CaptureSession, next: CaptureState) {
        if session.state != next {
            log::debug!("Capture state {:?} -> {:?}", session.state, next);
            session.state = next;
        }
    }
}
