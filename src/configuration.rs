//! Analysis configuration.
//!
//! [`AnalysisOptions`] is a builder that threads the overlay location,
//! decoder tuning, progress reporting and output settings through the
//! pipeline without widening every function signature.
//!
//! # Example
//!
//! ```
//! use framestamp::{AnalysisOptions, OutputOptions, OverlayOrigin};
//!
//! let options = AnalysisOptions::new()
//!     .with_overlay_origin(OverlayOrigin::new(0, 2))
//!     .with_min_gap(8)
//!     .with_capture_first_valid(5)
//!     .with_output(OutputOptions::new("reports").with_charts(false));
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::overlay::{DEFAULT_MIN_GAP, OverlayDecoder, OverlayOrigin};
use crate::progress::{NoOpProgress, ProgressCallback};

/// Where and what to write for each analysed video.
#[derive(Debug, Clone)]
#[must_use]
pub struct OutputOptions {
    /// Directory for logs, charts and miss images. `None` writes next to
    /// each video.
    pub directory: Option<PathBuf>,
    /// Render the duration bar chart and the delta histogram.
    pub charts: bool,
    /// Save the overlay region of every missed frame as a PNG.
    pub miss_images: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            directory: None,
            charts: true,
            miss_images: true,
        }
    }
}

impl OutputOptions {
    /// Write everything into `directory`.
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: Some(directory.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Enable or disable chart rendering. Defaults to `true`.
    pub fn with_charts(mut self, charts: bool) -> Self {
        self.charts = charts;
        self
    }

    /// Enable or disable miss images. Defaults to `true`.
    pub fn with_miss_images(mut self, miss_images: bool) -> Self {
        self.miss_images = miss_images;
        self
    }

    /// Output directory for a video at `video_path`.
    pub(crate) fn directory_for(&self, video_path: &Path) -> PathBuf {
        match &self.directory {
            Some(directory) => directory.clone(),
            None => video_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}

/// Settings for decoding and analysing one or more videos.
///
/// A default-constructed value reads the overlay at `(0, 0)` with a minimum
/// gap of 10, captures no debug frames and reports no progress.
#[derive(Clone)]
#[must_use]
pub struct AnalysisOptions {
    pub(crate) origin: OverlayOrigin,
    pub(crate) min_gap: u32,
    pub(crate) capture_first_valid: usize,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) batch_size: u64,
    pub(crate) output: OutputOptions,
}

impl Debug for AnalysisOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AnalysisOptions")
            .field("origin", &self.origin)
            .field("min_gap", &self.min_gap)
            .field("capture_first_valid", &self.capture_first_valid)
            .field("batch_size", &self.batch_size)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            origin: OverlayOrigin::default(),
            min_gap: DEFAULT_MIN_GAP,
            capture_first_valid: 0,
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
            output: OutputOptions::default(),
        }
    }

    /// Set the top-left corner of the overlay region.
    pub fn with_overlay_origin(mut self, origin: OverlayOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Set the minimum gap between dark and bright bit clusters.
    pub fn with_min_gap(mut self, min_gap: u32) -> Self {
        self.min_gap = min_gap;
        self
    }

    /// Keep the first `count` successfully decoded frames for inspection.
    pub fn with_capture_first_valid(mut self, count: usize) -> Self {
        self.capture_first_valid = count;
        self
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Fire the progress callback every `size` frames. Clamped to at least 1.
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the output settings used by the pipeline.
    pub fn with_output(mut self, output: OutputOptions) -> Self {
        self.output = output;
        self
    }

    /// The configured overlay origin.
    pub fn overlay_origin(&self) -> OverlayOrigin {
        self.origin
    }

    /// The configured output settings.
    pub fn output(&self) -> &OutputOptions {
        &self.output
    }

    /// Build the overlay decoder these options describe.
    pub fn decoder(&self) -> OverlayDecoder {
        OverlayDecoder::new(self.origin).with_min_gap(self.min_gap)
    }
}
