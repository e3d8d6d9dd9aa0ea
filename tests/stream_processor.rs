//! Frame stream processor tests.
//!
//! Streams are built from synthetic frames: `stamped(k)` carries an overlay,
//! `blank()` is uniformly black and never decodes.

use std::sync::{Arc, Mutex};

use framestamp::{
    AnalysisOptions, Anchor, DecodeFailure, DiagnosticSink, FrameOutcome, FrameStreamProcessor,
    FramestampError, OverlayDecoder, OverlayOrigin, ProgressCallback, ProgressInfo, stamp_overlay,
    step, ticks::ticks_to_epoch_ms,
};
use image::RgbImage;

/// 2024-01-01T00:00:00Z.
const BASE_TICKS: u64 = 638_396_640_000_000_000;
/// 33.3333 ms.
const FRAME_TICKS: u64 = 333_333;

fn ticks_for(k: u64) -> u64 {
    BASE_TICKS + k * FRAME_TICKS
}

fn stamped(k: u64) -> RgbImage {
    let mut frame = RgbImage::new(160, 16);
    stamp_overlay(&mut frame, OverlayOrigin::default(), ticks_for(k)).expect("Overlay fits");
    frame
}

fn blank() -> RgbImage {
    RgbImage::new(160, 16)
}

/// Frames 0–2 and 4–6 fail, 3 and 7 decode.
fn anchoring_stream() -> Vec<Result<RgbImage, FramestampError>> {
    (0..8)
        .map(|k| Ok(if k == 3 || k == 7 { stamped(k) } else { blank() }))
        .collect()
}

// ── anchoring ──────────────────────────────────────────────────────

#[test]
fn misses_report_the_last_valid_frame() {
    let stream = FrameStreamProcessor::new(&AnalysisOptions::new())
        .process(anchoring_stream())
        .expect("Two frames decode");

    assert_eq!(stream.frames_read, 8);
    let indices: Vec<u64> = stream.records.iter().map(|record| record.index).collect();
    assert_eq!(indices, vec![3, 7]);
    assert_eq!(stream.records[0].epoch_ms, ticks_to_epoch_ms(ticks_for(3)));

    let failed: Vec<u64> = stream.misses.iter().map(|miss| miss.failed_index).collect();
    assert_eq!(failed, vec![0, 1, 2, 4, 5, 6]);

    for miss in &stream.misses[..3] {
        assert_eq!(miss.last_valid_index, None);
        assert_eq!(miss.last_valid_epoch_ms, None);
    }
    for miss in &stream.misses[3..] {
        assert_eq!(miss.last_valid_index, Some(3));
        assert_eq!(miss.last_valid_epoch_ms, Some(ticks_to_epoch_ms(ticks_for(3))));
    }
}

#[test]
fn step_keeps_anchor_on_miss() {
    let decoder = OverlayDecoder::new(OverlayOrigin::default());

    let (anchor, outcome) = step(Anchor::NoAnchor, 0, &decoder, &stamped(0));
    assert!(matches!(outcome, FrameOutcome::Valid { .. }));
    assert_eq!(anchor.index(), Some(0));

    let (after_miss, outcome) = step(anchor, 1, &decoder, &blank());
    assert_eq!(after_miss, anchor);
    match outcome {
        FrameOutcome::Missed { event, failure } => {
            assert_eq!(event.last_valid_index, Some(0));
            assert_eq!(event.failed_index, 1);
            assert_eq!(event.failure, failure.kind);
        }
        FrameOutcome::Valid { .. } => panic!("Blank frame must not decode"),
    }
}

#[test]
fn push_frame_tracks_anchor_incrementally() {
    let options = AnalysisOptions::new();
    let mut processor = FrameStreamProcessor::new(&options);
    assert_eq!(processor.anchor(), Anchor::NoAnchor);

    processor.push_frame(stamped(0));
    processor.push_frame(blank());
    assert_eq!(processor.anchor().index(), Some(0));
    processor.push_frame(stamped(2));
    assert_eq!(processor.anchor().index(), Some(2));
    assert_eq!(processor.frames_read(), 3);

    let stream = processor.finish().expect("Two frames decode");
    assert_eq!(stream.records.len(), 2);
    assert_eq!(stream.misses.len(), 1);
}

#[test]
fn decoded_timestamps_are_in_frame_order() {
    let frames = (0..20).map(|k| Ok(stamped(k)));
    let stream = FrameStreamProcessor::new(&AnalysisOptions::new())
        .process(frames)
        .expect("All frames decode");
    assert_eq!(stream.records.len(), 20);
    assert!(stream.misses.is_empty());
    assert!(
        stream
            .records
            .windows(2)
            .all(|pair| pair[1].epoch_ms > pair[0].epoch_ms)
    );
}

// ── termination ────────────────────────────────────────────────────

#[test]
fn all_misses_is_an_empty_result() {
    let frames = (0..5).map(|_| Ok(blank()));
    let error = FrameStreamProcessor::new(&AnalysisOptions::new())
        .process(frames)
        .expect_err("Nothing decodes");
    assert!(matches!(error, FramestampError::EmptyResult { frames_read: 5 }));
}

#[test]
fn empty_source_is_unreadable() {
    let error = FrameStreamProcessor::new(&AnalysisOptions::new())
        .with_source("captures/run_01.mp4")
        .process(std::iter::empty())
        .expect_err("No frames");
    match error {
        FramestampError::SourceUnreadable { path, reason } => {
            assert_eq!(path.to_str(), Some("captures/run_01.mp4"));
            assert!(reason.contains("no frames"), "{reason}");
        }
        other => panic!("Expected SourceUnreadable, got: {other}"),
    }
}

#[test]
fn failure_before_first_frame_is_unreadable() {
    let frames = vec![Err(FramestampError::VideoDecodeError("corrupt header".into()))];
    let error = FrameStreamProcessor::new(&AnalysisOptions::new())
        .process(frames)
        .expect_err("Frame 0 cannot be read");
    match error {
        FramestampError::SourceUnreadable { reason, .. } => {
            assert!(reason.contains("frame 0"), "{reason}");
            assert!(reason.contains("corrupt header"), "{reason}");
        }
        other => panic!("Expected SourceUnreadable, got: {other}"),
    }
}

#[test]
fn failure_mid_stream_aborts_the_video() {
    let frames = vec![
        Ok(stamped(0)),
        Ok(stamped(1)),
        Err(FramestampError::VideoDecodeError("truncated packet".into())),
        Ok(stamped(3)),
    ];
    let error = FrameStreamProcessor::new(&AnalysisOptions::new())
        .process(frames)
        .expect_err("Source failed");
    assert!(matches!(error, FramestampError::VideoDecodeError(_)));
}

// ── capture & diagnostics ──────────────────────────────────────────

#[test]
fn captures_first_valid_frames_only() {
    let options = AnalysisOptions::new().with_capture_first_valid(2);
    let stream = FrameStreamProcessor::new(&options)
        .process(anchoring_stream().into_iter().chain((8..12).map(|k| Ok(stamped(k)))))
        .expect("Frames decode");

    assert_eq!(stream.captured.len(), 2);
    assert_eq!(stream.captured[0].index, 3);
    assert_eq!(stream.captured[1].index, 7);
    assert_eq!(stream.captured[1].ticks, ticks_for(7));
    assert_eq!(stream.captured[1].bits, format!("{:064b}", ticks_for(7)));
    assert_eq!(stream.captured[0].image.dimensions(), (160, 16));
}

#[test]
fn no_capture_by_default() {
    let stream = FrameStreamProcessor::new(&AnalysisOptions::new())
        .process(anchoring_stream())
        .expect("Frames decode");
    assert!(stream.captured.is_empty());
}

#[derive(Default)]
struct RecordingSink {
    indices: Vec<u64>,
    fail: bool,
}

impl DiagnosticSink for RecordingSink {
    fn record_miss(
        &mut self,
        frame_index: u64,
        failure: &DecodeFailure,
    ) -> Result<(), FramestampError> {
        assert!(failure.region.is_some());
        self.indices.push(frame_index);
        if self.fail {
            return Err(FramestampError::VideoDecodeError("disk full".into()));
        }
        Ok(())
    }
}

#[test]
fn sink_receives_every_miss() {
    let mut sink = RecordingSink::default();
    let stream = FrameStreamProcessor::new(&AnalysisOptions::new())
        .with_diagnostic_sink(&mut sink)
        .process(anchoring_stream())
        .expect("Frames decode");
    assert_eq!(stream.misses.len(), 6);
    assert_eq!(sink.indices, vec![0, 1, 2, 4, 5, 6]);
}

#[test]
fn sink_errors_do_not_abort() {
    let mut sink = RecordingSink {
        fail: true,
        ..RecordingSink::default()
    };
    let stream = FrameStreamProcessor::new(&AnalysisOptions::new())
        .with_diagnostic_sink(&mut sink)
        .process(anchoring_stream())
        .expect("Sink failures are ignored");
    assert_eq!(stream.records.len(), 2);
    assert_eq!(sink.indices.len(), 6);
}

// ── progress ───────────────────────────────────────────────────────

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().expect("Lock poisoned").push(info.clone());
    }
}

#[test]
fn progress_fires_per_batch_and_at_the_end() {
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    let options = AnalysisOptions::new()
        .with_progress(recorder.clone())
        .with_batch_size(3);

    FrameStreamProcessor::new(&options)
        .with_expected_frames(Some(16))
        .process(anchoring_stream())
        .expect("Frames decode");

    let infos = recorder.infos.lock().expect("Lock poisoned");
    let reads: Vec<u64> = infos.iter().map(|info| info.frames_read).collect();
    assert_eq!(reads, vec![3, 6, 8]);

    let last = infos.last().expect("Final report");
    assert_eq!(last.valid, 2);
    assert_eq!(last.misses, 6);
    assert_eq!(last.total, Some(16));
    assert_eq!(last.percentage, Some(50.0));
}
