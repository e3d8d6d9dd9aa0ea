//! Temporal consistency checks.
//!
//! [`analyze`] runs once over everything the stream processor collected for
//! a video. It always computes frame counts, inter-frame deltas and the
//! observed frame rate. With valid [`CaptureMetadata`] it also compares the
//! first and last decoded timestamps with the declared start and stop, and
//! flags every delta whose magnitude reaches twice the declared frame
//! interval.
//!
//! The outlier threshold comes from the *requested* schedule, not from the
//! observed deltas, so the question answered is "did capture stall or jump
//! relative to what was asked for", however many frames decoded.
//!
//! Negative deltas smaller than the threshold pass silently. Such a delta
//! may be an out-of-order or duplicated decode, but it may equally be two
//! captures within the same millisecond; the analyzer does not try to tell
//! them apart.
//!
//! Millisecond values that are compared or reported as integers are rounded
//! half-to-even.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::metadata::CaptureMetadata;
use crate::processor::{DecodedStream, FrameRecord, MissEvent};

/// Direction of an outlier delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutlierKind {
    /// Time advanced by at least the threshold: capture stalled.
    Lag,
    /// Time went backwards by at least the threshold.
    NegativeOutlier,
}

impl Display for OutlierKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OutlierKind::Lag => write!(f, "lag"),
            OutlierKind::NegativeOutlier => write!(f, "negative outlier"),
        }
    }
}

/// A delta that reached the outlier threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierEvent {
    /// Index of the later frame of the pair.
    pub frame_index: u64,
    /// Epoch milliseconds of that frame.
    pub epoch_ms: f64,
    /// Signed delta to the previous valid frame.
    pub delta_ms: f64,
    /// `|delta_ms|` rounded to whole milliseconds, as compared.
    pub rounded_delta_ms: i64,
    /// Direction.
    pub kind: OutlierKind,
}

/// Comparison of the decoded stream with the capture metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataComparison {
    /// Declared start, epoch milliseconds.
    pub start_ts_ms: f64,
    /// Declared stop, epoch milliseconds.
    pub stop_ts_ms: f64,
    /// Declared time between frames.
    pub nominal_interval_ms: f64,
    /// Outlier threshold, twice the nominal interval.
    pub threshold_ms: f64,
    /// Threshold rounded to whole milliseconds, as compared.
    pub rounded_threshold_ms: i64,
    /// First decoded timestamp minus the declared start, rounded.
    pub offset_start_ms: i64,
    /// Last decoded timestamp minus the declared stop, rounded.
    pub offset_end_ms: i64,
}

impl MetadataComparison {
    /// The first frame does not match the declared start.
    pub fn start_mismatch(&self) -> bool {
        self.offset_start_ms != 0
    }

    /// The last frame does not match the declared stop.
    pub fn end_mismatch(&self) -> bool {
        self.offset_end_ms != 0
    }
}

/// Everything known about one video after the analysis.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Valid frames, in frame order.
    pub records: Vec<FrameRecord>,
    /// Missed frames, in frame order.
    pub misses: Vec<MissEvent>,
    /// `records[k].epoch_ms - records[k - 1].epoch_ms` for `k >= 1`.
    pub deltas: Vec<f64>,
    /// Deltas at or above the threshold. Empty without valid metadata.
    pub outliers: Vec<OutlierEvent>,
    /// Metadata comparison. `None` without valid metadata.
    pub comparison: Option<MetadataComparison>,
    /// Average frame rate over the decoded span, rounded; 0 when undefined.
    ///
    /// Duplicate or near-duplicate ticks can make the span tiny and the rate
    /// huge, hence `u64`.
    pub observed_fps: u64,
    /// Frames read from the source.
    pub total_frames: u64,
    /// Declared frame count, when the metadata is valid.
    pub expected_frames: Option<u64>,
    /// Timezone for presenting local times, minutes east of UTC.
    pub tz_offset_minutes: i32,
}

impl AnalysisResult {
    /// Number of frames that decoded.
    pub fn valid_frames(&self) -> usize {
        self.records.len()
    }

    /// First valid frame.
    pub fn first_record(&self) -> Option<&FrameRecord> {
        self.records.first()
    }

    /// Last valid frame.
    pub fn last_record(&self) -> Option<&FrameRecord> {
        self.records.last()
    }

    /// Time between the first and last valid frame, 0 with fewer than two.
    pub fn span_ms(&self) -> f64 {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) if self.records.len() > 1 => last.epoch_ms - first.epoch_ms,
            _ => 0.0,
        }
    }
}

/// Analyse a decoded stream against its capture metadata.
///
/// The comparison and outliers are skipped when the metadata is invalid or
/// when the stream holds no valid frame.
pub fn analyze(stream: DecodedStream, metadata: &CaptureMetadata) -> AnalysisResult {
    let DecodedStream {
        records,
        misses,
        frames_read,
        ..
    } = stream;

    let deltas: Vec<f64> = records
        .windows(2)
        .map(|pair| pair[1].epoch_ms - pair[0].epoch_ms)
        .collect();

    let comparison = compare(&records, metadata);
    let outliers = comparison
        .map(|comparison| find_outliers(&records, &deltas, comparison.rounded_threshold_ms))
        .unwrap_or_default();

    let mut result = AnalysisResult {
        records,
        misses,
        deltas,
        outliers,
        comparison,
        observed_fps: 0,
        total_frames: frames_read,
        expected_frames: metadata.expected_frames(),
        tz_offset_minutes: metadata.tz_offset_minutes,
    };
    result.observed_fps = observed_fps(result.valid_frames(), result.span_ms());
    result
}

fn compare(records: &[FrameRecord], metadata: &CaptureMetadata) -> Option<MetadataComparison> {
    let start_ts_ms = metadata.start_ts_ms()?;
    let stop_ts_ms = metadata.stop_ts_ms()?;
    let nominal_interval_ms = metadata.nominal_interval_ms()?;
    let first = records.first()?;
    let last = records.last()?;

    let threshold_ms = 2.0 * nominal_interval_ms;
    Some(MetadataComparison {
        start_ts_ms,
        stop_ts_ms,
        nominal_interval_ms,
        threshold_ms,
        rounded_threshold_ms: round_ms(threshold_ms),
        offset_start_ms: round_ms(first.epoch_ms - start_ts_ms),
        offset_end_ms: round_ms(last.epoch_ms - stop_ts_ms),
    })
}

fn find_outliers(
    records: &[FrameRecord],
    deltas: &[f64],
    rounded_threshold_ms: i64,
) -> Vec<OutlierEvent> {
    deltas
        .iter()
        .zip(records.iter().skip(1))
        .filter_map(|(&delta_ms, record)| {
            let rounded_delta_ms = round_ms(delta_ms.abs());
            (rounded_delta_ms >= rounded_threshold_ms).then(|| OutlierEvent {
                frame_index: record.index,
                epoch_ms: record.epoch_ms,
                delta_ms,
                rounded_delta_ms,
                kind: if delta_ms > 0.0 {
                    OutlierKind::Lag
                } else {
                    OutlierKind::NegativeOutlier
                },
            })
        })
        .collect()
}

fn observed_fps(valid_frames: usize, span_ms: f64) -> u64 {
    if valid_frames > 1 && span_ms > 0.0 {
        // Saturates only for spans below ~1e-16 ms, which ticks cannot express.
        ((valid_frames - 1) as f64 * 1000.0 / span_ms).round_ties_even() as u64
    } else {
        0
    }
}

/// Round a millisecond value to the nearest integer, ties to even.
pub(crate) fn round_ms(value: f64) -> i64 {
    value.round_ties_even() as i64
}
