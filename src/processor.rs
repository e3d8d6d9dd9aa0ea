//! Single forward pass over a video's frames.
//!
//! [`FrameStreamProcessor`] decodes each frame's overlay in order, converts
//! the tick value to epoch milliseconds, and sorts the outcome into two
//! records: [`FrameRecord`]s for frames that decoded and [`MissEvent`]s for
//! frames that did not. A per-frame failure never stops the pass.
//!
//! The last successful frame is tracked as an [`Anchor`], a plain value
//! threaded through [`step`]. A run of consecutive misses therefore reports
//! the same anchor, and no miss ever points past the most recent success.
//!
//! # Example
//!
//! ```
//! use framestamp::{AnalysisOptions, FrameStreamProcessor, OverlayOrigin, stamp_overlay};
//! use image::RgbImage;
//!
//! let mut frame = RgbImage::new(160, 90);
//! stamp_overlay(&mut frame, OverlayOrigin::default(), 638_400_000_000_000_000)?;
//!
//! let stream = FrameStreamProcessor::new(&AnalysisOptions::new())
//!     .process([Ok(frame), Ok(RgbImage::new(160, 90))])?;
//! assert_eq!(stream.records.len(), 1);
//! assert_eq!(stream.misses[0].last_valid_index, Some(0));
//! # Ok::<(), framestamp::FramestampError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;

use crate::configuration::AnalysisOptions;
use crate::diagnostics::DiagnosticSink;
use crate::error::FramestampError;
use crate::overlay::{DecodeFailure, DecodeFailureKind, DecodedOverlay, OverlayDecoder};
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::ticks::{format_local, ticks_to_epoch_ms};

/// A frame whose overlay decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    /// Zero-based position of the frame in the stream.
    pub index: u64,
    /// Decoded capture time in milliseconds since the Unix epoch.
    pub epoch_ms: f64,
}

/// A frame whose overlay did not decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissEvent {
    /// Index of the most recent valid frame before this one, if any.
    pub last_valid_index: Option<u64>,
    /// Epoch milliseconds of that frame, if any.
    pub last_valid_epoch_ms: Option<f64>,
    /// Index of the frame that failed.
    pub failed_index: u64,
    /// Why it failed.
    pub failure: DecodeFailureKind,
}

/// The last frame that decoded successfully.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Anchor {
    /// No frame has decoded yet.
    #[default]
    NoAnchor,
    /// The most recent valid frame.
    Anchored {
        /// Frame index.
        index: u64,
        /// Its epoch milliseconds.
        epoch_ms: f64,
    },
}

impl Anchor {
    /// Index of the anchored frame.
    pub fn index(&self) -> Option<u64> {
        match self {
            Anchor::NoAnchor => None,
            Anchor::Anchored { index, .. } => Some(*index),
        }
    }

    /// Epoch milliseconds of the anchored frame.
    pub fn epoch_ms(&self) -> Option<f64> {
        match self {
            Anchor::NoAnchor => None,
            Anchor::Anchored { epoch_ms, .. } => Some(*epoch_ms),
        }
    }
}

/// Result of decoding one frame.
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    /// The overlay decoded.
    Valid {
        /// Record to append.
        record: FrameRecord,
        /// Raw decoder output.
        decoded: DecodedOverlay,
    },
    /// The overlay did not decode.
    Missed {
        /// Event to append.
        event: MissEvent,
        /// Decoder failure, including the region pixels.
        failure: DecodeFailure,
    },
}

/// Decode frame `index` and advance the anchor.
///
/// Pure: the returned anchor is the input anchor on a miss and the new
/// frame on success.
pub fn step(
    anchor: Anchor,
    index: u64,
    decoder: &OverlayDecoder,
    frame: &RgbImage,
) -> (Anchor, FrameOutcome) {
    match decoder.decode(frame) {
        Ok(decoded) => {
            let epoch_ms = ticks_to_epoch_ms(decoded.ticks);
            let record = FrameRecord { index, epoch_ms };
            (
                Anchor::Anchored { index, epoch_ms },
                FrameOutcome::Valid { record, decoded },
            )
        }
        Err(failure) => {
            let event = MissEvent {
                last_valid_index: anchor.index(),
                last_valid_epoch_ms: anchor.epoch_ms(),
                failed_index: index,
                failure: failure.kind,
            };
            (anchor, FrameOutcome::Missed { event, failure })
        }
    }
}

/// A successfully decoded frame kept for inspection.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Frame index.
    pub index: u64,
    /// The full decoded frame.
    pub image: RgbImage,
    /// Decoded tick value.
    pub ticks: u64,
    /// Decoded epoch milliseconds.
    pub epoch_ms: f64,
    /// Decoded bit string.
    pub bits: String,
}

/// Everything the forward pass collected for one video.
#[derive(Debug, Clone, Default)]
pub struct DecodedStream {
    /// Valid frames, in frame order.
    pub records: Vec<FrameRecord>,
    /// Missed frames, in frame order.
    pub misses: Vec<MissEvent>,
    /// The first few valid frames, when capture was requested.
    pub captured: Vec<CapturedFrame>,
    /// Number of frames consumed from the source.
    pub frames_read: u64,
}

/// Stateful driver around [`step`].
pub struct FrameStreamProcessor<'a> {
    decoder: OverlayDecoder,
    anchor: Anchor,
    stream: DecodedStream,
    capture_limit: usize,
    tz_offset_minutes: i32,
    source: PathBuf,
    label: String,
    sink: Option<&'a mut dyn DiagnosticSink>,
    progress: Arc<dyn ProgressCallback>,
    tracker: ProgressTracker,
}

impl<'a> FrameStreamProcessor<'a> {
    /// Create a processor using the decoder, capture and progress settings
    /// of `options`.
    pub fn new(options: &AnalysisOptions) -> Self {
        Self {
            decoder: options.decoder(),
            anchor: Anchor::NoAnchor,
            stream: DecodedStream::default(),
            capture_limit: options.capture_first_valid,
            tz_offset_minutes: 0,
            source: PathBuf::new(),
            label: String::new(),
            sink: None,
            progress: Arc::clone(&options.progress),
            tracker: ProgressTracker::new(options.batch_size, None),
        }
    }

    /// Name the source for log messages and errors.
    #[must_use]
    pub fn with_source<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        self.label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.source = path.to_path_buf();
        self
    }

    /// Timezone used when logging decoded frames.
    #[must_use]
    pub fn with_tz_offset(mut self, tz_offset_minutes: i32) -> Self {
        self.tz_offset_minutes = tz_offset_minutes;
        self
    }

    /// Expected frame count, used for progress percentages.
    #[must_use]
    pub fn with_expected_frames(mut self, total: Option<u64>) -> Self {
        self.tracker = ProgressTracker::new(self.tracker.batch_size(), total);
        self
    }

    /// Hand failed regions to `sink`.
    #[must_use]
    pub fn with_diagnostic_sink(mut self, sink: &'a mut dyn DiagnosticSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The current anchor.
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Number of frames consumed so far.
    pub fn frames_read(&self) -> u64 {
        self.stream.frames_read
    }

    /// Decode the next frame of the stream.
    pub fn push_frame(&mut self, frame: RgbImage) {
        let index = self.stream.frames_read;
        self.stream.frames_read += 1;

        let (anchor, outcome) = step(self.anchor, index, &self.decoder, &frame);
        self.anchor = anchor;

        let is_valid = matches!(outcome, FrameOutcome::Valid { .. });
        match outcome {
            FrameOutcome::Valid { record, decoded } => {
                log::debug!(
                    "[{}] Frame {index:04} → ticks={}, epoch_ms={:.3}, local={}, bits={}",
                    self.label,
                    decoded.ticks,
                    record.epoch_ms,
                    format_local(record.epoch_ms, self.tz_offset_minutes),
                    decoded.bits,
                );
                if self.stream.captured.len() < self.capture_limit {
                    self.stream.captured.push(CapturedFrame {
                        index,
                        image: frame,
                        ticks: decoded.ticks,
                        epoch_ms: record.epoch_ms,
                        bits: decoded.bits,
                    });
                }
                self.stream.records.push(record);
            }
            FrameOutcome::Missed { event, failure } => {
                if index == 0 {
                    log::warn!("[{}] Frame 0000 decode failed: {}", self.label, failure.kind);
                } else {
                    log::debug!(
                        "[{}] Frame {index:04} decode failed ({})",
                        self.label,
                        failure.kind
                    );
                }
                if let Some(sink) = self.sink.as_deref_mut() {
                    if let Err(error) = sink.record_miss(index, &failure) {
                        log::warn!(
                            "[{}] Could not save miss evidence for frame {index:04}: {error}",
                            self.label
                        );
                    }
                }
                self.stream.misses.push(event);
            }
        }

        if let Some(info) = self.tracker.advance(is_valid) {
            self.progress.on_progress(&info);
        }
    }

    /// Consume every frame of `frames`, then [`finish`](Self::finish).
    ///
    /// # Errors
    ///
    /// - [`FramestampError::SourceUnreadable`] if the source fails before
    ///   yielding a frame, or yields none.
    /// - Any error the source yields after the first frame.
    /// - [`FramestampError::EmptyResult`] if no overlay decoded.
    pub fn process<I>(mut self, frames: I) -> Result<DecodedStream, FramestampError>
    where
        I: IntoIterator<Item = Result<RgbImage, FramestampError>>,
    {
        for frame in frames {
            match frame {
                Ok(frame) => self.push_frame(frame),
                Err(error) if self.stream.frames_read == 0 => {
                    return Err(FramestampError::SourceUnreadable {
                        path: self.source,
                        reason: format!("cannot read frame 0: {error}"),
                    });
                }
                Err(error) => return Err(error),
            }
        }
        self.finish()
    }

    /// Close the pass and return what was collected.
    ///
    /// # Errors
    ///
    /// - [`FramestampError::SourceUnreadable`] if no frame was pushed.
    /// - [`FramestampError::EmptyResult`] if no overlay decoded.
    pub fn finish(self) -> Result<DecodedStream, FramestampError> {
        self.progress.on_progress(&self.tracker.snapshot());

        if self.stream.frames_read == 0 {
            return Err(FramestampError::SourceUnreadable {
                path: self.source,
                reason: "no frames could be read".to_string(),
            });
        }
        if self.stream.records.is_empty() {
            return Err(FramestampError::EmptyResult {
                frames_read: self.stream.frames_read,
            });
        }
        Ok(self.stream)
    }
}
