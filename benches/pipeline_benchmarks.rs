//! Performance benchmarks for the CrabScan capture pipeline
//!
//! Run with: cargo bench
//!
//! The whole per-frame evaluation has to fit a camera frame interval, so
//! these track the expensive stages separately and end to end.

use crabscan::capture::{CaptureEngine, CaptureSession};
use crabscan::detection::CandidateSelector;
use crabscan::geometry::{crop, extract_region};
use crabscan::quality::{sharpen, BlurDetector};
use crabscan::testing::{card_box, synthetic_card_frame};
use crabscan::types::BoundingBox;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const RESOLUTIONS: [(u32, u32); 3] = [(640, 480), (1280, 720), (1920, 1080)];

fn bench_selector(c: &mut Criterion) {
    let selector = CandidateSelector::default();
    let mut boxes: Vec<BoundingBox> = (0..20)
        .map(|i| BoundingBox::new(0.1, 0.1, 0.5, 0.4, i as f32 / 20.0, "person"))
        .collect();
    boxes.push(card_box(0.5, 0.5, 0.45, 0.3, 0.93));

    c.bench_function("select_candidate_21_boxes", |b| {
        b.iter(|| selector.select(black_box(&boxes)))
    });
}

fn bench_blur(c: &mut Criterion) {
    let mut group = c.benchmark_group("blur_variance");
    let detector = BlurDetector::default();
    let card = card_box(0.5, 0.5, 0.6, 0.4, 0.93);

    for (w, h) in RESOLUTIONS {
        let frame = synthetic_card_frame(w, h, &card);
        let view = frame.view().unwrap();
        let rect = extract_region(&card, w, h).unwrap().rect;
        let region = crop(&view, &rect);

        group.throughput(Throughput::Elements((region.width() * region.height()) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", w, h)),
            &region,
            |b, region| b.iter(|| detector.analyze(black_box(region))),
        );
    }
    group.finish();
}

fn bench_sharpen(c: &mut Criterion) {
    let mut group = c.benchmark_group("sharpen");
    let card = card_box(0.5, 0.5, 0.6, 0.4, 0.93);

    for (w, h) in RESOLUTIONS {
        let frame = synthetic_card_frame(w, h, &card);
        let view = frame.view().unwrap();
        let rect = extract_region(&card, w, h).unwrap().rect;
        let region = crop(&view, &rect);

        group.throughput(Throughput::Elements((region.width() * region.height()) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", w, h)),
            &region,
            |b, region| b.iter(|| sharpen(black_box(region))),
        );
    }
    group.finish();
}

fn bench_capture_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture_evaluation");
    group.sample_size(30);
    let engine = CaptureEngine::default();
    let card = card_box(0.5, 0.5, 0.6, 0.4, 0.93);

    for (w, h) in RESOLUTIONS {
        let frame = synthetic_card_frame(w, h, &card);
        let boxes = vec![card.clone()];
        // Session one frame short of eligibility, so each iteration evaluates
        let primed = {
            let (s, _) = engine.advance(CaptureSession::new(), &frame, &boxes);
            let (s, _) = engine.advance(s, &frame, &boxes);
            s
        };

        group.bench_function(BenchmarkId::from_parameter(format!("{}x{}", w, h)), |b| {
            b.iter(|| engine.advance(primed.clone(), black_box(&frame), black_box(&boxes)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_selector,
    bench_blur,
    bench_sharpen,
    bench_capture_frame
);
criterion_main!(benches);
