//! Advisory status messages for the presentation layer.
//!
//! The state machine never touches UI; it produces [`StatusMessage`] values
//! that a [`StatusSink`] may render however it likes.

use super::CaptureDecision;
use serde::{Deserialize, Serialize};

pub const MSG_DETECTING: &str = "Hold steady — detecting card";
pub const MSG_CAPTURING: &str = "Hold steady — capturing...";
pub const MSG_BLURRY: &str = "Image too blurry — hold steady";
pub const MSG_CAPTURED: &str = "Card captured";
pub const MSG_SAVED: &str = "Image saved";
pub const MSG_SAVE_FAILED: &str = "Failed to save image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Searching,
    Stabilizing,
    Warning,
    Success,
    Error,
}

impl Severity {
    /// Indicator color tag as `#RRGGBB`.
    pub fn color_hex(&self) -> &'static str {
        match self {
            Severity::Searching => "#76FF03",
            Severity::Stabilizing => "#FFFF00",
            Severity::Warning => "#FF0000",
            Severity::Success => "#00FFFF",
            Severity::Error => "#FF0000",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub text: String,
    pub severity: Severity,
}

impl StatusMessage {
    pub fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }

    pub fn detecting() -> Self {
        Self::new(MSG_DETECTING, Severity::Searching)
    }

    pub fn saved() -> Self {
        Self::new(MSG_SAVED, Severity::Success)
    }

    pub fn save_failed() -> Self {
        Self::new(MSG_SAVE_FAILED, Severity::Error)
    }
}

impl CaptureDecision {
    /// Message to show for this decision, if it changes what the user sees.
    pub fn status(&self) -> Option<StatusMessage> {
        match self {
            CaptureDecision::Searching => Some(StatusMessage::detecting()),
            CaptureDecision::Stabilizing { .. } => {
                Some(StatusMessage::new(MSG_CAPTURING, Severity::Stabilizing))
            }
            CaptureDecision::BlurRejected { .. } => {
                Some(StatusMessage::new(MSG_BLURRY, Severity::Warning))
            }
            CaptureDecision::Captured(_) => {
                Some(StatusMessage::new(MSG_CAPTURED, Severity::Success))
            }
            CaptureDecision::Skipped { .. } | CaptureDecision::Idle => None,
        }
    }
}

/// Receives status updates; purely advisory.
pub trait StatusSink: Send {
    fn publish(&self, message: &StatusMessage);
}

impl<F> StatusSink for F
where
    F: Fn(&StatusMessage) + Send,
{
    fn publish(&self, message: &StatusMessage) {
        self(message)
    }
}

/// Writes status changes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn publish(&self, message: &StatusMessage) {
        match message.severity {
            Severity::Error => log::error!("{}", message.text),
            Severity::Warning => log::warn!("{}", message.text),
            _ => log::info!("{} [{}]", message.text, message.severity.color_hex()),
        }
    }
}
