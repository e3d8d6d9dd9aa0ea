//! The `<base>_lag.log` text report.
//!
//! The layout is line-oriented so it can be grepped: `#` header lines with
//! the metadata comparison and summary counts, then one `OUTLIER:` line per
//! outlier and one `MISS:` line per missed frame. Millisecond values are
//! printed as whole numbers.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::{AnalysisResult, MetadataComparison, round_ms};
use crate::error::FramestampError;
use crate::processor::FrameRecord;
use crate::ticks::format_local;

const HEADER_WIDTH: usize = 28;
const SUMMARY_WIDTH: usize = 27;

/// One side of the start/stop comparison.
struct Boundary<'r> {
    declared_label: &'static str,
    which: &'static str,
    declared_ms: f64,
    record: &'r FrameRecord,
    offset_label: &'static str,
    offset_ms: i64,
    edge: &'static str,
}

/// Renders an [`AnalysisResult`] as a lag log.
#[derive(Debug, Clone, Copy)]
pub struct LagReport<'a> {
    result: &'a AnalysisResult,
}

impl<'a> LagReport<'a> {
    /// Wrap a result for rendering.
    pub fn new(result: &'a AnalysisResult) -> Self {
        Self { result }
    }

    /// `<prefix>_lag.log`.
    pub fn path_for<P: AsRef<Path>>(prefix: P) -> PathBuf {
        let mut name = prefix.as_ref().as_os_str().to_os_string();
        name.push("_lag.log");
        PathBuf::from(name)
    }

    /// Render the complete log.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match (
            &self.result.comparison,
            self.result.first_record(),
            self.result.last_record(),
        ) {
            (Some(comparison), Some(first), Some(last)) => {
                self.write_comparison(&mut out, comparison, first, last);
            }
            _ => {
                out.push_str("# Metadata invalid or missing; skipped start/stop comparisons.\n\n");
            }
        }
        self.write_summary(&mut out);
        self.write_outliers(&mut out);
        self.write_misses(&mut out);
        out
    }

    /// Write the log to `<prefix>_lag.log` and return its path.
    ///
    /// # Errors
    ///
    /// Returns [`FramestampError::IoError`] if the file cannot be written.
    pub fn write<P: AsRef<Path>>(&self, prefix: P) -> Result<PathBuf, FramestampError> {
        let path = Self::path_for(prefix);
        fs::write(&path, self.render())?;
        Ok(path)
    }

    fn local(&self, epoch_ms: f64) -> String {
        format_local(epoch_ms, self.result.tz_offset_minutes)
    }

    fn write_comparison(
        &self,
        out: &mut String,
        comparison: &MetadataComparison,
        first: &FrameRecord,
        last: &FrameRecord,
    ) {
        self.write_boundary(
            out,
            Boundary {
                declared_label: "Metadata startTs",
                which: "First",
                declared_ms: comparison.start_ts_ms,
                record: first,
                offset_label: "Offset_start",
                offset_ms: comparison.offset_start_ms,
                edge: "start",
            },
        );
        self.write_boundary(
            out,
            Boundary {
                declared_label: "Metadata stopTs",
                which: "Last",
                declared_ms: comparison.stop_ts_ms,
                record: last,
                offset_label: "Offset_end",
                offset_ms: comparison.offset_end_ms,
                edge: "stop",
            },
        );
    }

    fn write_boundary(&self, out: &mut String, boundary: Boundary<'_>) {
        let Boundary {
            declared_label,
            which,
            declared_ms,
            record,
            offset_label,
            offset_ms,
            edge,
        } = boundary;

        let _ = writeln!(
            out,
            "{:<HEADER_WIDTH$}{} ms    (Local {})",
            format!("# {declared_label}:"),
            round_ms(declared_ms),
            self.local(declared_ms)
        );
        let _ = writeln!(
            out,
            "{:<HEADER_WIDTH$}{} → {} ms    (Local {})",
            format!("# {which} decoded frame idx:"),
            record.index,
            round_ms(record.epoch_ms),
            self.local(record.epoch_ms)
        );
        let _ = writeln!(
            out,
            "{:<HEADER_WIDTH$}{offset_ms} ms",
            format!("# {offset_label}:")
        );
        if offset_ms != 0 {
            let _ = writeln!(
                out,
                "# ALERT: {which} frame TS does not match metadata {edge} (offset {offset_ms} ms)"
            );
        }
        out.push('\n');
    }

    fn write_summary(&self, out: &mut String) {
        let result = self.result;
        let expected = result
            .expected_frames
            .map(|frames| frames.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        let rows = [
            ("Observed average FPS", format!("{} Hz", result.observed_fps)),
            ("Total frames read", result.total_frames.to_string()),
            ("Valid timestamps", result.valid_frames().to_string()),
            ("Frames expected", expected),
        ];
        for (label, value) in rows {
            let _ = writeln!(out, "{:<SUMMARY_WIDTH$}{value}", format!("# {label}:"));
        }

        match &result.comparison {
            Some(comparison) => {
                let _ = writeln!(out, "# Gaps (|Δt|) ≥ {} ms", comparison.rounded_threshold_ms);
            }
            None => out.push_str("# Gaps (|Δt|) ≥ N/A (no metadata)\n"),
        }
        out.push('\n');
    }

    fn write_outliers(&self, out: &mut String) {
        let Some(comparison) = &self.result.comparison else {
            return;
        };
        for outlier in &self.result.outliers {
            let _ = writeln!(
                out,
                "OUTLIER: Frame {} (Local {}) : |Δt| = {} ms ≥ {} ms ({})",
                outlier.frame_index,
                self.local(outlier.epoch_ms),
                outlier.rounded_delta_ms,
                comparison.rounded_threshold_ms,
                outlier.kind
            );
        }
    }

    fn write_misses(&self, out: &mut String) {
        for miss in &self.result.misses {
            let last_index = miss
                .last_valid_index
                .map(|index| index.to_string())
                .unwrap_or_else(|| "None".to_string());
            let last_ms = miss
                .last_valid_epoch_ms
                .map(|epoch_ms| format!("{} ms", round_ms(epoch_ms)))
                .unwrap_or_else(|| "None".to_string());
            let _ = writeln!(
                out,
                "MISS: last valid idx = {last_index}, last valid ts = {last_ms}, failed idx = {}",
                miss.failed_index
            );
        }
    }
}
