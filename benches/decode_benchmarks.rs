//! Benchmarks for overlay decoding, stream processing and analysis.
//!
//! Run with: cargo bench
//!
//! The end-to-end benchmark encodes a synthetic capture first.

#[path = "../tests/common/mod.rs"]
mod common;

use std::time::Duration;

use criterion::{BenchmarkId, Criterion};
use common::{BASE_TICKS, Capture, FRAME_TICKS};
use framestamp::{
    AnalysisOptions, CaptureMetadata, DecodedStream, FfmpegLogLevel, FrameRecord,
    FrameStreamProcessor, OutputOptions, OverlayDecoder, OverlayOrigin, analyze, analyze_video,
    render_overlay, set_ffmpeg_log_level, stamp_overlay,
};
use image::RgbImage;

fn benchmark_overlay_decode(criterion: &mut Criterion) {
    let decoder = OverlayDecoder::new(OverlayOrigin::default());
    let clean = render_overlay(BASE_TICKS, 0, 255);
    let dim = render_overlay(BASE_TICKS, 100, 112);
    let uniform = RgbImage::new(128, 3);

    let mut group = criterion.benchmark_group("overlay decode");
    group.bench_function("high contrast", |bencher| {
        bencher.iter(|| decoder.decode(&clean));
    });
    group.bench_function("low contrast", |bencher| {
        bencher.iter(|| decoder.decode(&dim));
    });
    group.bench_function("ambiguous", |bencher| {
        bencher.iter(|| decoder.decode(&uniform));
    });
    group.finish();
}

fn benchmark_stream_processing(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("stream processing");
    group.sample_size(30);

    for &(width, height) in &[(320_u32, 240_u32), (1920, 1080)] {
        let frames: Vec<RgbImage> = (0..60)
            .map(|k| {
                let mut frame = RgbImage::new(width, height);
                if k % 10 != 0 {
                    let _ = stamp_overlay(
                        &mut frame,
                        OverlayOrigin::default(),
                        BASE_TICKS + k * FRAME_TICKS,
                    );
                }
                frame
            })
            .collect();
        let options = AnalysisOptions::new();

        group.bench_with_input(
            BenchmarkId::new("60 frames", format!("{width}x{height}")),
            &frames,
            |bencher, frames| {
                bencher.iter(|| {
                    FrameStreamProcessor::new(&options)
                        .process(frames.iter().cloned().map(Ok))
                        .map(|stream| stream.records.len())
                });
            },
        );
    }
    group.finish();
}

fn benchmark_analysis(criterion: &mut Criterion) {
    let metadata = CaptureMetadata::new(1000.0, 1600.0, 18_001, 0);
    let records: Vec<FrameRecord> = (0..18_000_u64)
        .map(|index| FrameRecord {
            index,
            epoch_ms: 1_000_000.0
                + index as f64 * 33.3
                + if index % 500 == 0 { 90.0 } else { 0.0 },
        })
        .collect();

    criterion.bench_function("analyze 18000 timestamps", |bencher| {
        bencher.iter(|| {
            let stream = DecodedStream {
                records: records.clone(),
                frames_read: records.len() as u64,
                ..DecodedStream::default()
            };
            analyze(stream, &metadata)
        });
    });
}

fn benchmark_end_to_end(criterion: &mut Criterion) {
    set_ffmpeg_log_level(FfmpegLogLevel::Error);

    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let capture = Capture {
        width: 640,
        height: 360,
        frames: 300,
        blank: (0..300).step_by(50).collect(),
        ..Capture::default()
    };
    let pair = capture.write_pair(output.path().join("stamped"));
    let options = AnalysisOptions::new().with_output(
        OutputOptions::new(output.path())
            .with_charts(false)
            .with_miss_images(false),
    );

    let mut group = criterion.benchmark_group("end to end");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(15));
    group.bench_function("analyze 300 frames at 640x360", |bencher| {
        bencher.iter(|| {
            analyze_video(&pair, &options).map(|analysis| analysis.result.outliers.len())
        });
    });
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_overlay_decode,
    benchmark_stream_processing,
    benchmark_analysis,
    benchmark_end_to_end,
);
criterion::criterion_main!(benches);
