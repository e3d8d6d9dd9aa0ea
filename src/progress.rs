//! Progress reporting.
//!
//! Decoding a long capture touches every frame, so the stream processor
//! reports how far it got through a [`ProgressCallback`]. Callbacks only
//! observe; they cannot stop a run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framestamp::{AnalysisOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{} frames, {} misses", info.frames_read, info.misses);
//!     }
//! }
//!
//! let options = AnalysisOptions::new()
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_batch_size(100);
//! ```

use std::time::{Duration, Instant};

/// A snapshot of decoding progress for one video.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames consumed from the source so far.
    pub frames_read: u64,
    /// Frames whose overlay decoded.
    pub valid: u64,
    /// Frames whose overlay did not decode.
    pub misses: u64,
    /// Expected frame count, when the source knows it.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since the first frame.
    pub elapsed: Duration,
}

/// Receives progress updates while frames are decoded.
///
/// Implementations must be [`Send`] and [`Sync`] so one callback can be
/// shared by videos processed on different threads.
pub trait ProgressCallback: Send + Sync {
    /// Called every `batch_size` frames and once more at the end.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks counters and decides when to fire the callback.
pub(crate) struct ProgressTracker {
    started: Instant,
    batch_size: u64,
    total: Option<u64>,
    frames_read: u64,
    valid: u64,
    misses: u64,
}

impl ProgressTracker {
    pub(crate) fn new(batch_size: u64, total: Option<u64>) -> Self {
        Self {
            started: Instant::now(),
            batch_size: batch_size.max(1),
            total,
            frames_read: 0,
            valid: 0,
            misses: 0,
        }
    }

    pub(crate) fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Count one frame; returns a snapshot when a report is due.
    pub(crate) fn advance(&mut self, decoded: bool) -> Option<ProgressInfo> {
        self.frames_read += 1;
        if decoded {
            self.valid += 1;
        } else {
            self.misses += 1;
        }
        (self.frames_read % self.batch_size == 0).then(|| self.snapshot())
    }

    pub(crate) fn snapshot(&self) -> ProgressInfo {
        let percentage = self.total.filter(|&total| total > 0).map(|total| {
            (self.frames_read as f32 / total as f32 * 100.0).min(100.0)
        });
        ProgressInfo {
            frames_read: self.frames_read,
            valid: self.valid,
            misses: self.misses,
            total: self.total,
            percentage,
            elapsed: self.started.elapsed(),
        }
    }
}
