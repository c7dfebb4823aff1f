//! Capture worker tests
//!
//! Covers the serialized worker around the state machine: status
//! publication, storage outcomes, retake while a frame is in flight,
//! auto-reset and the background thread.

use crabscan::capture::status::{
    MSG_CAPTURED, MSG_CAPTURING, MSG_DETECTING, MSG_SAVED, MSG_SAVE_FAILED,
};
use crabscan::capture::{CaptureDecision, CaptureState};
use crabscan::config::CrabScanConfig;
use crabscan::errors::{CaptureError, WorkerErrorKind};
use crabscan::storage::MemoryStorage;
use crabscan::testing::{
    card_box, synthetic_card_frame, FailingStorage, RecordingStatusSink, ScriptedDetector,
};
use crabscan::types::{BoundingBox, CameraFrame, DetectionBatch};
use crabscan::worker::AutoCaptureWorker;
use std::sync::mpsc;
use std::time::{Duration, Instant};

fn card() -> BoundingBox {
    card_box(0.5, 0.5, 0.45, 0.3, 0.93)
}

fn card_frame() -> CameraFrame {
    synthetic_card_frame(640, 480, &card())
}

#[test]
fn test_worker_captures_and_stores() {
    let status = RecordingStatusSink::new();
    let storage = MemoryStorage::new();
    let worker = AutoCaptureWorker::new(
        CrabScanConfig::default(),
        ScriptedDetector::repeating(vec![card()], 10),
        status.clone(),
        storage.clone(),
    )
    .unwrap();

    let mut decisions = Vec::new();
    for _ in 0..4 {
        decisions.push(worker.process_frame(card_frame()).unwrap().unwrap());
    }

    assert!(decisions[2].is_captured());
    assert!(matches!(decisions[3], CaptureDecision::Idle));

    assert_eq!(storage.len(), 1);
    let (filename, _) = &storage.images()[0];
    assert!(filename.starts_with("book_capture_"));
    assert!(filename.ends_with(".jpg"));

    // Stabilizing is published once despite two stabilizing frames
    assert_eq!(
        status.texts(),
        vec![
            MSG_CAPTURING.to_string(),
            MSG_CAPTURED.to_string(),
            MSG_SAVED.to_string()
        ]
    );

    let stats = worker.stats().unwrap();
    assert_eq!(stats.frames_processed, 3);
    assert_eq!(stats.frames_ignored, 1);
    assert_eq!(stats.captures, 1);
    assert_eq!(worker.snapshot().unwrap().state, CaptureState::Captured);
}

#[test]
fn test_repeated_searching_is_published_once() {
    let status = RecordingStatusSink::new();
    let worker = AutoCaptureWorker::new(
        CrabScanConfig::default(),
        ScriptedDetector::new(vec![]),
        status.clone(),
        MemoryStorage::new(),
    )
    .unwrap();

    for _ in 0..5 {
        let decision = worker.process_frame(card_frame()).unwrap().unwrap();
        assert!(matches!(decision, CaptureDecision::Searching));
    }

    assert_eq!(status.texts(), vec![MSG_DETECTING.to_string()]);
}

#[test]
fn test_storage_failure_keeps_capture() {
    let status = RecordingStatusSink::new();
    let worker = AutoCaptureWorker::new(
        CrabScanConfig::default(),
        ScriptedDetector::repeating(vec![card()], 10),
        status.clone(),
        FailingStorage,
    )
    .unwrap();

    for _ in 0..3 {
        worker.process_frame(card_frame()).unwrap();
    }

    let session = worker.snapshot().unwrap();
    assert!(session.has_captured);
    assert_eq!(session.state, CaptureState::Captured);
    assert_eq!(worker.stats().unwrap().storage_failures, 1);

    let messages = status.messages();
    let last = messages.last().unwrap();
    assert_eq!(last.text, MSG_SAVE_FAILED);
    assert_eq!(last.severity.color_hex(), "#FF0000");
}

#[test]
fn test_detector_error_counts_as_no_detection() {
    let detector = |_frame: &CameraFrame| -> Result<DetectionBatch, CaptureError> {
        Err(CaptureError::Detection("model unavailable".to_string()))
    };
    let worker = AutoCaptureWorker::new(
        CrabScanConfig::default(),
        detector,
        RecordingStatusSink::new(),
        MemoryStorage::new(),
    )
    .unwrap();

    let decision = worker.process_frame(card_frame()).unwrap().unwrap();
    assert!(matches!(decision, CaptureDecision::Searching));
}

#[test]
fn test_retake_discards_in_flight_evaluation() {
    let mut config = CrabScanConfig::default();
    config.stability.required_stable_frames = 1;

    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let detector = move |_frame: &CameraFrame| -> Result<DetectionBatch, CaptureError> {
        let _ = entered_tx.send(());
        let _ = release_rx.recv_timeout(Duration::from_secs(5));
        Ok(DetectionBatch::new(vec![card()], Duration::ZERO))
    };

    let status = RecordingStatusSink::new();
    let storage = MemoryStorage::new();
    let worker = AutoCaptureWorker::new(config, detector, status.clone(), storage.clone()).unwrap();

    let outcome = std::thread::scope(|scope| {
        let evaluation = scope.spawn(|| worker.process_frame(card_frame()));

        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        worker.retake().unwrap();
        release_tx.send(()).unwrap();

        evaluation.join().unwrap()
    });

    // The frame would have captured, but the reset landed first
    assert!(outcome.unwrap().is_none());

    let session = worker.snapshot().unwrap();
    assert!(!session.has_captured);
    assert_eq!(session.state, CaptureState::Searching);
    assert_eq!(session.stable_frame_count, 0);

    assert!(storage.is_empty());
    assert_eq!(worker.stats().unwrap().stale_discarded, 1);
    assert_eq!(status.texts(), vec![MSG_DETECTING.to_string()]);
}

#[test]
fn test_overlapping_frames_capture_once() {
    let mut config = CrabScanConfig::default();
    config.stability.required_stable_frames = 1;

    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let detector = move |_frame: &CameraFrame| -> Result<DetectionBatch, CaptureError> {
        let _ = entered_tx.send(());
        std::thread::sleep(Duration::from_millis(200));
        Ok(DetectionBatch::new(vec![card()], Duration::ZERO))
    };

    let storage = MemoryStorage::new();
    let worker =
        AutoCaptureWorker::new(config, detector, RecordingStatusSink::new(), storage.clone())
            .unwrap();

    let decisions = std::thread::scope(|scope| {
        let first = scope.spawn(|| worker.process_frame(card_frame()));
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        // Submitted while the first frame is still inside the detector
        let second = scope.spawn(|| worker.process_frame(card_frame()));
        [first.join().unwrap(), second.join().unwrap()]
    });

    let decisions: Vec<_> = decisions.into_iter().map(|d| d.unwrap().unwrap()).collect();
    assert_eq!(decisions.iter().filter(|d| d.is_captured()).count(), 1);
    assert!(decisions.iter().any(|d| matches!(d, CaptureDecision::Idle)));

    assert_eq!(storage.len(), 1);
    let stats = worker.stats().unwrap();
    assert_eq!(stats.captures, 1);
    assert_eq!(stats.frames_processed, 1);
    assert_eq!(stats.frames_ignored, 1);
}

#[test]
fn test_overlapping_frames_both_count_toward_stability() {
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let detector = move |_frame: &CameraFrame| -> Result<DetectionBatch, CaptureError> {
        let _ = entered_tx.send(());
        std::thread::sleep(Duration::from_millis(100));
        Ok(DetectionBatch::new(vec![card()], Duration::ZERO))
    };

    let worker = AutoCaptureWorker::new(
        CrabScanConfig::default(),
        detector,
        RecordingStatusSink::new(),
        MemoryStorage::new(),
    )
    .unwrap();

    std::thread::scope(|scope| {
        let first = scope.spawn(|| worker.process_frame(card_frame()));
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = scope.spawn(|| worker.process_frame(card_frame()));
        first.join().unwrap().unwrap();
        second.join().unwrap().unwrap();
    });

    assert_eq!(worker.snapshot().unwrap().stable_frame_count, 2);
}

#[test]
fn test_retake_after_capture_allows_new_capture() {
    let storage = MemoryStorage::new();
    let worker = AutoCaptureWorker::new(
        CrabScanConfig::default(),
        ScriptedDetector::repeating(vec![card()], 10),
        RecordingStatusSink::new(),
        storage.clone(),
    )
    .unwrap();

    for _ in 0..3 {
        worker.process_frame(card_frame()).unwrap();
    }
    assert!(worker.snapshot().unwrap().has_captured);

    worker.retake().unwrap();
    let session = worker.snapshot().unwrap();
    assert_eq!(session.state, CaptureState::Searching);
    assert_eq!(session.stable_frame_count, 0);

    let decisions: Vec<_> = (0..3)
        .map(|_| worker.process_frame(card_frame()).unwrap().unwrap())
        .collect();
    assert!(decisions[2].is_captured());
    assert_eq!(storage.len(), 2);
}

#[test]
fn test_auto_reset_after_display_delay() {
    let mut config = CrabScanConfig::default();
    config.stability.required_stable_frames = 1;
    config.session.capture_reset_delay_ms = 30;

    let status = RecordingStatusSink::new();
    let mut script = vec![vec![card()]];
    script.extend(std::iter::repeat(vec![]).take(5));
    let worker = AutoCaptureWorker::new(
        config,
        ScriptedDetector::new(script),
        status.clone(),
        MemoryStorage::new(),
    )
    .unwrap();

    assert!(worker.process_frame(card_frame()).unwrap().unwrap().is_captured());
    std::thread::sleep(Duration::from_millis(60));

    let decision = worker.process_frame(card_frame()).unwrap().unwrap();
    assert!(matches!(decision, CaptureDecision::Searching));
    assert!(!worker.snapshot().unwrap().has_captured);
    assert_eq!(status.texts().last().map(String::as_str), Some(MSG_DETECTING));
}

#[test]
fn test_no_auto_reset_when_disabled() {
    let mut config = CrabScanConfig::default();
    config.stability.required_stable_frames = 1;
    config.session.capture_reset_delay_ms = 0;

    let worker = AutoCaptureWorker::new(
        config,
        ScriptedDetector::repeating(vec![card()], 10),
        RecordingStatusSink::new(),
        MemoryStorage::new(),
    )
    .unwrap();

    assert!(worker.process_frame(card_frame()).unwrap().unwrap().is_captured());
    std::thread::sleep(Duration::from_millis(20));
    assert!(matches!(
        worker.process_frame(card_frame()).unwrap().unwrap(),
        CaptureDecision::Idle
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = CrabScanConfig::default();
    config.stability.required_stable_frames = 0;

    let result = AutoCaptureWorker::new(
        config,
        ScriptedDetector::new(vec![]),
        RecordingStatusSink::new(),
        MemoryStorage::new(),
    );
    assert!(matches!(result, Err(CaptureError::Config(_))));
}

#[test]
fn test_background_thread_captures() {
    let storage = MemoryStorage::new();
    let worker = AutoCaptureWorker::new(
        CrabScanConfig::default(),
        ScriptedDetector::repeating(vec![card()], 10_000),
        RecordingStatusSink::new(),
        storage.clone(),
    )
    .unwrap();

    worker.start().unwrap();
    assert!(worker.is_running());
    assert!(matches!(
        worker.start(),
        Err(CaptureError::Worker(WorkerErrorKind::AlreadyStarted))
    ));

    let frame = card_frame();
    let deadline = Instant::now() + Duration::from_secs(5);
    while worker.stats().unwrap().captures == 0 && Instant::now() < deadline {
        assert!(worker.submit(frame.clone()));
        std::thread::sleep(Duration::from_millis(5));
    }

    worker.stop(Duration::from_secs(2)).unwrap();
    assert!(!worker.is_running());
    assert_eq!(storage.len(), 1);
    assert!(worker.snapshot().unwrap().has_captured);

    // Closed queue refuses new frames
    assert!(!worker.submit(frame));
    assert!(matches!(
        worker.stop(Duration::from_millis(100)),
        Err(CaptureError::Worker(WorkerErrorKind::NotStarted))
    ));
}
