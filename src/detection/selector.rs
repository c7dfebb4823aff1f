use crate::config::DetectionConfig;
use crate::types::BoundingBox;

/// Picks the single best document candidate out of one frame's detections.
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    target_label: String,
    min_aspect_ratio: f32,
    max_aspect_ratio: f32,
    min_confidence: f32,
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::new(&DetectionConfig::default())
    }
}

impl CandidateSelector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            target_label: config.target_label.to_lowercase(),
            min_aspect_ratio: config.min_aspect_ratio,
            max_aspect_ratio: config.max_aspect_ratio,
            min_confidence: config.min_confidence,
        }
    }

    /// Highest-confidence box with the target label, if it passes the
    /// aspect-ratio and confidence gates.
    ///
    /// Gates are applied to the top box only: a lower-confidence box that
    /// would pass is never promoted. Geometrically invalid boxes are dropped
    /// before ranking.
    pub fn select(&self, boxes: &[BoundingBox]) -> Option<BoundingBox> {
        let best = boxes
            .iter()
            .filter(|b| b.label.to_lowercase() == self.target_label)
            .filter(|b| b.is_valid())
            .reduce(|best, b| {
                if b.confidence > best.confidence {
                    b
                } else {
                    best
                }
            })?;

        let aspect_ratio = best.aspect_ratio()?;
        let valid_aspect =
            aspect_ratio >= self.min_aspect_ratio && aspect_ratio <= self.max_aspect_ratio;
        let confident = best.confidence > self.min_confidence;

        log::debug!(
            "Candidate AR={:.3}, conf={:.3} (aspect ok: {}, confident: {})",
            aspect_ratio,
            best.confidence,
            valid_aspect,
            confident
        );

        if valid_aspect && confident {
            Some(best.clone())
        } else {
            None
        }
    }
}
