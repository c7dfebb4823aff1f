use crate::errors::{CaptureError, WorkerErrorKind};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Bounded queue that drops the oldest item when full.
///
/// With capacity 1 this is a "keep only latest" slot.
pub(crate) struct FrameQueue<T> {
    inner: Mutex<QueueInner<T>>,
    cv: Condvar,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
    closed: bool,
}

impl<T> FrameQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity.clamp(1, 1024)),
                capacity: capacity.max(1),
                dropped: 0,
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner<T>> {
        // Queue state stays consistent across a panicking holder
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push an item, evicting the oldest when at capacity. Returns `false`
    /// when the queue is closed.
    pub(crate) fn push_drop_oldest(&self, item: T) -> bool {
        let mut g = self.lock();
        if g.closed {
            return false;
        }

        if g.items.len() >= g.capacity {
            g.items.pop_front();
            g.dropped = g.dropped.saturating_add(1);
        }
        g.items.push_back(item);
        self.cv.notify_one();
        true
    }

    pub(crate) fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>, CaptureError> {
        let mut g = self.lock();

        if timeout == Duration::ZERO {
            return Ok(g.items.pop_front());
        }

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = g.items.pop_front() {
                return Ok(Some(item));
            }
            if g.closed {
                return Err(CaptureError::Worker(WorkerErrorKind::Stopped));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let (ng, _) = self
                .cv
                .wait_timeout(g, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            g = ng;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub(crate) fn clear(&self) {
        self.lock().items.clear();
    }

    pub(crate) fn close(&self) {
        let mut g = self.lock();
        g.closed = true;
        self.cv.notify_all();
    }

    pub(crate) fn reopen(&self) {
        self.lock().closed = false;
    }
}
