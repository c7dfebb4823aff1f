use thiserror::Error;

/// Errors surfaced by the capture core.
///
/// Per-frame outcomes such as "no candidate" or "blur rejected" are not
/// errors; they are reported through [`crate::capture::CaptureDecision`].
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Detection error: {0}")]
    Detection(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Worker error: {0}")]
    Worker(WorkerErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerErrorKind {
    AlreadyStarted,
    NotStarted,
    Stopped,
    JoinTimeout,
    SpawnFailed,
    PoisonedLock,
}

impl std::fmt::Display for WorkerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            WorkerErrorKind::AlreadyStarted => "worker is already started",
            WorkerErrorKind::NotStarted => "worker is not started",
            WorkerErrorKind::Stopped => "worker is stopped",
            WorkerErrorKind::JoinTimeout => "timed out joining worker thread",
            WorkerErrorKind::SpawnFailed => "failed to spawn worker thread",
            WorkerErrorKind::PoisonedLock => "lock poisoned by previous panic",
        };
        write!(f, "{}", msg)
    }
}

impl CaptureError {
    pub fn poisoned_lock() -> Self {
        CaptureError::Worker(WorkerErrorKind::PoisonedLock)
    }
}
