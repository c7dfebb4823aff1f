//! Serialized capture worker
//!
//! Frames from the camera pipeline land in a small drop-oldest queue and are
//! evaluated one at a time on a single named thread. Session state is only
//! mutated under one mutex, and every reset bumps a generation counter: an
//! evaluation that started before a reset is discarded instead of merged.
mod queue;

use crate::capture::{
    CaptureDecision, CaptureEngine, CaptureSession, StatusMessage, StatusSink,
};
use crate::config::CrabScanConfig;
use crate::detection::Detector;
use crate::errors::{CaptureError, WorkerErrorKind};
use crate::storage::{capture_filename, StorageSink};
use crate::timing::{FrameBudget, FrameClock};
use crate::types::{CameraFrame, DetectionBatch};
use queue::FrameQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Counters describing worker activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkerStats {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub frames_ignored: u64,
    pub stale_discarded: u64,
    pub blur_rejections: u64,
    pub captures: u64,
    pub storage_failures: u64,
}

struct Shared {
    session: CaptureSession,
    generation: u64,
    captured_at: Option<Instant>,
    stats: WorkerStats,
}

struct StatusChannel {
    sink: Box<dyn StatusSink>,
    last: Option<StatusMessage>,
}

struct Inner {
    engine: CaptureEngine,
    /// Held for a whole frame evaluation; frames never overlap
    evaluation: Mutex<()>,
    config: CrabScanConfig,
    shared: Mutex<Shared>,
    detector: Mutex<Box<dyn Detector>>,
    status: Mutex<StatusChannel>,
    storage: Mutex<Box<dyn StorageSink>>,
    queue: FrameQueue<CameraFrame>,
    clock: FrameClock,
    next_sequence: AtomicU64,
    stop_flag: AtomicBool,
}

/// Runs the capture state machine over submitted frames.
pub struct AutoCaptureWorker {
    inner: Arc<Inner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AutoCaptureWorker {
    pub fn new<D, S, T>(
        config: CrabScanConfig,
        detector: D,
        status: S,
        storage: T,
    ) -> Result<Self, CaptureError>
    where
        D: Detector + 'static,
        S: StatusSink + 'static,
        T: StorageSink + 'static,
    {
        config.validate().map_err(CaptureError::Config)?;

        let inner = Inner {
            engine: CaptureEngine::new(&config),
            evaluation: Mutex::new(()),
            queue: FrameQueue::new(config.session.frame_queue_capacity),
            config,
            shared: Mutex::new(Shared {
                session: CaptureSession::new(),
                generation: 0,
                captured_at: None,
                stats: WorkerStats::default(),
            }),
            detector: Mutex::new(Box::new(detector)),
            status: Mutex::new(StatusChannel {
                sink: Box::new(status),
                last: None,
            }),
            storage: Mutex::new(Box::new(storage)),
            clock: FrameClock::new(),
            next_sequence: AtomicU64::new(1),
            stop_flag: AtomicBool::new(false),
        };

        Ok(Self {
            inner: Arc::new(inner),
            thread: Mutex::new(None),
        })
    }

    /// Spawn the worker thread.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut thread = self
            .thread
            .lock()
            .map_err(|_| CaptureError::poisoned_lock())?;
        if thread.is_some() {
            return Err(CaptureError::Worker(WorkerErrorKind::AlreadyStarted));
        }

        self.inner.stop_flag.store(false, Ordering::Relaxed);
        self.inner.queue.reopen();

        let inner = self.inner.clone();
        let handle = std::thread::Builder::new()
            .name("crabscan-capture-worker".to_string())
            .spawn(move || worker_loop(inner))
            .map_err(|e| {
                log::error!("Failed to spawn capture worker: {}", e);
                CaptureError::Worker(WorkerErrorKind::SpawnFailed)
            })?;

        *thread = Some(handle);
        log::info!("Capture worker started");
        Ok(())
    }

    /// Signal the worker to stop and wait up to `join_timeout` for it.
    pub fn stop(&self, join_timeout: Duration) -> Result<(), CaptureError> {
        let handle = self
            .thread
            .lock()
            .map_err(|_| CaptureError::poisoned_lock())?
            .take();
        let Some(handle) = handle else {
            return Err(CaptureError::Worker(WorkerErrorKind::NotStarted));
        };

        self.inner.stop_flag.store(true, Ordering::Relaxed);
        self.inner.queue.close();

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if handle.join().is_err() {
                    log::error!("Capture worker panicked");
                }
                break;
            }
            if start.elapsed() >= join_timeout {
                // Keep the handle so a later stop can retry the join
                *self
                    .thread
                    .lock()
                    .map_err(|_| CaptureError::poisoned_lock())? = Some(handle);
                return Err(CaptureError::Worker(WorkerErrorKind::JoinTimeout));
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        log::info!("Capture worker stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.thread.lock().map(|t| t.is_some()).unwrap_or(false)
    }

    /// Queue a frame for evaluation, stamping sequence and timestamp when
    /// the producer left them unset. Returns `false` once stopped.
    pub fn submit(&self, mut frame: CameraFrame) -> bool {
        if frame.sequence == 0 {
            frame.sequence = self.inner.next_sequence.fetch_add(1, Ordering::Relaxed);
        }
        if frame.timestamp_us == 0 {
            frame.timestamp_us = self.inner.clock.timestamp_us();
        }
        self.inner.queue.push_drop_oldest(frame)
    }

    /// Evaluate one frame on the calling thread.
    ///
    /// Blocks while another frame is being evaluated. Returns `None` when a
    /// reset landed while the frame was in flight.
    pub fn process_frame(
        &self,
        frame: CameraFrame,
    ) -> Result<Option<CaptureDecision>, CaptureError> {
        self.inner.process_frame(frame)
    }

    /// Return to `Searching`, discarding any in-flight evaluation.
    pub fn retake(&self) -> Result<(), CaptureError> {
        self.inner.reset("retake")
    }

    /// Copy of the current session state.
    pub fn snapshot(&self) -> Result<CaptureSession, CaptureError> {
        Ok(self.inner.shared()?.session.clone())
    }

    pub fn stats(&self) -> Result<WorkerStats, CaptureError> {
        let mut stats = self.inner.shared()?.stats;
        stats.frames_dropped = self.inner.queue.dropped();
        Ok(stats)
    }

    pub fn config(&self) -> &CrabScanConfig {
        &self.inner.config
    }
}

impl Drop for AutoCaptureWorker {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.stop(Duration::from_millis(500)) {
                log::warn!("Error stopping capture worker in drop: {}", e);
            }
        }
    }
}

impl Inner {
    fn shared(&self) -> Result<MutexGuard<'_, Shared>, CaptureError> {
        self.shared.lock().map_err(|_| CaptureError::poisoned_lock())
    }

    fn reset(&self, reason: &str) -> Result<(), CaptureError> {
        {
            let mut shared = self.shared()?;
            shared.session.reset();
            shared.generation = shared.generation.wrapping_add(1);
            shared.captured_at = None;
        }
        log::info!("Capture session reset ({})", reason);
        self.publish(&StatusMessage::detecting());
        Ok(())
    }

    /// Auto-reset once the capture has been displayed long enough.
    fn maybe_auto_reset(&self) -> Result<(), CaptureError> {
        let delay = self.config.session.capture_reset_delay_ms;
        if delay == 0 {
            return Ok(());
        }

        let due = self
            .shared()?
            .captured_at
            .is_some_and(|at| at.elapsed() >= Duration::from_millis(delay));
        if due {
            self.reset("capture display timeout")?;
        }
        Ok(())
    }

    fn process_frame(&self, frame: CameraFrame) -> Result<Option<CaptureDecision>, CaptureError> {
        // Reset does not take this lock, so a retake still lands mid-frame
        let _evaluating = self
            .evaluation
            .lock()
            .map_err(|_| CaptureError::poisoned_lock())?;

        let budget =
            FrameBudget::start(Duration::from_millis(self.config.session.frame_budget_ms));
        self.maybe_auto_reset()?;

        let (session, generation) = {
            let mut shared = self.shared()?;
            if shared.session.has_captured {
                shared.stats.frames_ignored += 1;
                return Ok(Some(CaptureDecision::Idle));
            }
            (shared.session.clone(), shared.generation)
        };

        let batch = self.detect(&frame)?;
        let (next, decision) = self.engine.advance(session, &frame, &batch.boxes);

        {
            let mut shared = self.shared()?;
            if shared.generation != generation {
                log::debug!("Discarding stale evaluation of frame {}", frame.sequence);
                shared.stats.stale_discarded += 1;
                return Ok(None);
            }

            shared.session = next;
            shared.stats.frames_processed += 1;
            match &decision {
                CaptureDecision::BlurRejected { .. } => shared.stats.blur_rejections += 1,
                CaptureDecision::Captured(_) => {
                    shared.stats.captures += 1;
                    shared.captured_at = Some(Instant::now());
                }
                _ => {}
            }
        }

        if let Some(message) = decision.status() {
            self.publish(&message);
        }

        if let CaptureDecision::Captured(captured) = &decision {
            self.persist(&captured.image)?;
        }

        budget.finish(frame.sequence);
        Ok(Some(decision))
    }

    /// Detector failures count as an empty detection list for this frame.
    fn detect(&self, frame: &CameraFrame) -> Result<DetectionBatch, CaptureError> {
        let mut detector = self
            .detector
            .lock()
            .map_err(|_| CaptureError::poisoned_lock())?;
        match detector.detect(frame) {
            Ok(batch) => {
                log::debug!(
                    "{}: {} boxes in {}ms for frame {}",
                    detector.name(),
                    batch.boxes.len(),
                    batch.latency.as_millis(),
                    frame.sequence
                );
                Ok(batch)
            }
            Err(e) => {
                log::warn!("{} failed on frame {}: {}", detector.name(), frame.sequence, e);
                Ok(DetectionBatch::empty())
            }
        }
    }

    /// Hand the capture to storage; failures are reported, never undone.
    fn persist(&self, image: &image::RgbImage) -> Result<(), CaptureError> {
        let storage_config = &self.config.storage;
        let filename = capture_filename(
            &storage_config.filename_prefix,
            &storage_config.timestamp_format,
            chrono::Local::now(),
        );

        let result = self
            .storage
            .lock()
            .map_err(|_| CaptureError::poisoned_lock())?
            .store(image, &filename);

        match result {
            Ok(path) => {
                log::info!("Capture stored at {:?}", path);
                self.publish(&StatusMessage::saved());
            }
            Err(e) => {
                log::error!("Failed to store capture {}: {}", filename, e);
                self.shared()?.stats.storage_failures += 1;
                self.publish(&StatusMessage::save_failed());
            }
        }
        Ok(())
    }

    /// Forward a message unless it repeats the previous one.
    fn publish(&self, message: &StatusMessage) {
        let Ok(mut channel) = self.status.lock() else {
            log::warn!("Status sink lock poisoned; dropping {:?}", message.text);
            return;
        };
        if channel.last.as_ref() == Some(message) {
            return;
        }
        channel.sink.publish(message);
        channel.last = Some(message.clone());
    }
}

fn worker_loop(inner: Arc<Inner>) {
    while !inner.stop_flag.load(Ordering::Relaxed) {
        if let Err(e) = inner.maybe_auto_reset() {
            log::error!("Capture worker halted: {}", e);
            break;
        }

        match inner.queue.pop_timeout(POLL_INTERVAL) {
            Ok(Some(frame)) => {
                let sequence = frame.sequence;
                if let Err(e) = inner.process_frame(frame) {
                    log::error!("Frame {} failed: {}", sequence, e);
                    if matches!(e, CaptureError::Worker(WorkerErrorKind::PoisonedLock)) {
                        break;
                    }
                }
            }
            Ok(None) => continue,
            Err(_) => break,
        }
    }

    inner.queue.clear();
    log::debug!("Capture worker loop exited");
}
