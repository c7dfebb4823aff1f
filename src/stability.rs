//! Cross-frame stability tracking
//!
//! A candidate is considered stable while its center stays within a small
//! normalized distance of the anchor candidate, the first box of the current
//! run. Any larger move restarts the run with the new box as anchor.

use crate::config::StabilityConfig;
use crate::types::BoundingBox;

/// Result of feeding one frame's candidate into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityUpdate {
    /// No candidate this frame; the run was cleared
    Lost,
    /// A new run started with this frame's candidate as anchor
    Restarted,
    /// The candidate stayed within the displacement threshold
    Held,
}

/// Stateless stability rules; the counters live in
/// [`crate::capture::CaptureSession`].
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    max_center_shift: f32,
    required_stable_frames: u32,
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new(&StabilityConfig::default())
    }
}

impl StabilityTracker {
    pub fn new(config: &StabilityConfig) -> Self {
        Self {
            max_center_shift: config.max_center_shift,
            required_stable_frames: config.required_stable_frames,
        }
    }

    pub fn required_stable_frames(&self) -> u32 {
        self.required_stable_frames
    }

    /// Whether `current` sits close enough to `anchor` on both axes.
    pub fn is_stable(&self, anchor: &BoundingBox, current: &BoundingBox) -> bool {
        let dx = (anchor.cx() - current.cx()).abs();
        let dy = (anchor.cy() - current.cy()).abs();
        log::debug!("Center shift dx={:.4}, dy={:.4}", dx, dy);
        dx < self.max_center_shift && dy < self.max_center_shift
    }

    /// Advance the run counters with this frame's candidate.
    ///
    /// The anchor is only replaced on a restart, so slow drift is measured
    /// against where the run began.
    pub fn update(
        &self,
        anchor: &mut Option<BoundingBox>,
        stable_frames: &mut u32,
        current: Option<&BoundingBox>,
    ) -> StabilityUpdate {
        let Some(current) = current else {
            *anchor = None;
            *stable_frames = 0;
            return StabilityUpdate::Lost;
        };

        let held = anchor
            .as_ref()
            .is_some_and(|prev| self.is_stable(prev, current));

        if held {
            *stable_frames = stable_frames.saturating_add(1);
            StabilityUpdate::Held
        } else {
            *stable_frames = 1;
            *anchor = Some(current.clone());
            StabilityUpdate::Restarted
        }
    }

    /// Capture becomes eligible once the run reaches the threshold.
    pub fn is_eligible(&self, stable_frames: u32) -> bool {
        stable_frames >= self.required_stable_frames
    }
}
