//! Frame timing utilities
//!
//! Monotonic clock for stamping submitted frames and measuring how long each
//! frame spends in the pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock for frame timestamps
///
/// All timestamps derive from this single start instant so they order
/// consistently across threads.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Arc<Instant>,
}

impl FrameClock {
    /// Create a new clock with the current instant as time zero
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Create a clock sharing an existing start instant
    pub fn from_instant(start: Instant) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    /// Microseconds elapsed since the clock started
    #[inline]
    pub fn timestamp_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Microseconds from the clock start to `instant` (zero if earlier)
    #[inline]
    pub fn timestamp_us_at(&self, instant: Instant) -> u64 {
        instant.saturating_duration_since(*self.start).as_micros() as u64
    }

    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Measures one frame's processing time against a budget.
#[derive(Debug, Clone, Copy)]
pub struct FrameBudget {
    started: Instant,
    budget: Duration,
}

impl FrameBudget {
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed time, logging a warning when over budget. A zero budget
    /// disables the check.
    pub fn finish(&self, sequence: u64) -> Duration {
        let elapsed = self.elapsed();
        if !self.budget.is_zero() && elapsed > self.budget {
            log::warn!(
                "Frame {} took {:.1}ms, over the {:.1}ms budget",
                sequence,
                elapsed.as_secs_f64() * 1000.0,
                self.budget.as_secs_f64() * 1000.0
            );
        }
        elapsed
    }
}
