//! # framestamp
//!
//! Recover per-frame capture timestamps from videos carrying an optical
//! timecode overlay, and audit them against the recorder's metadata.
//!
//! Each frame of a stamped video carries a 128×3 pixel strip encoding a
//! 64-bit tick count (100 ns units since 0001-01-01). `framestamp` decodes
//! that strip with a per-frame adaptive threshold, converts the ticks to
//! epoch milliseconds, and checks the resulting sequence: dropped or
//! undecodable frames, stalls and backwards jumps, and boundary offsets
//! against the declared start and stop. Video decoding is powered by FFmpeg
//! via the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Analyse a capture
//!
//! ```no_run
//! use framestamp::{AnalysisOptions, VideoPair, analyze_video};
//!
//! let pair = VideoPair::from_base("captures/run_01");
//! let analysis = analyze_video(&pair, &AnalysisOptions::new())?;
//! println!(
//!     "{} valid of {} frames, {} outliers",
//!     analysis.result.valid_frames(),
//!     analysis.result.total_frames,
//!     analysis.result.outliers.len()
//! );
//! # Ok::<(), framestamp::FramestampError>(())
//! ```
//!
//! ### Decode a single frame
//!
//! ```no_run
//! use framestamp::{OverlayDecoder, OverlayOrigin};
//!
//! let frame = image::open("frame.png")?.to_rgb8();
//! match OverlayDecoder::new(OverlayOrigin::new(0, 0)).decode(&frame) {
//!     Ok(decoded) => println!("ticks = {}", decoded.ticks),
//!     Err(failure) => println!("no timestamp: {}", failure.kind),
//! }
//! # Ok::<(), image::ImageError>(())
//! ```
//!
//! ### Drive the stages yourself
//!
//! ```no_run
//! use framestamp::{
//!     AnalysisOptions, CaptureMetadata, FrameStreamProcessor, LagReport, VideoSource, analyze,
//! };
//!
//! let metadata = CaptureMetadata::load("run_01.json")?;
//! let mut source = VideoSource::open("run_01.mp4")?;
//! let stream = FrameStreamProcessor::new(&AnalysisOptions::new()).process(source.frames()?)?;
//! let result = analyze(stream, &metadata);
//! print!("{}", LagReport::new(&result).render());
//! # Ok::<(), framestamp::FramestampError>(())
//! ```
//!
//! ## Features
//!
//! - **Adaptive overlay decoding**: the threshold sits in the largest gap of
//!   each frame's own samples, so exposure and compression shifts are
//!   tolerated; inseparable frames are rejected, not guessed
//! - **Miss tracking**: every undecodable frame is recorded together with
//!   the last frame that did decode
//! - **Timing audit**: start/stop offsets, outliers at twice the declared
//!   frame interval, observed frame rate
//! - **Reports**: `<base>_lag.log`, a delta bar chart, a delta histogram and
//!   a PNG of every missed overlay
//! - **Progress**: callbacks while long captures decode
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | `analyze_batch_parallel()` analyses independent videos on the rayon pool |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system. Chart
//! labels need fontconfig and at least one sans-serif font at runtime.

pub mod analysis;
pub mod chart;
pub mod configuration;
pub mod diagnostics;
pub mod error;
pub mod ffmpeg;
pub mod metadata;
pub mod overlay;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod report;
pub mod source;
pub mod ticks;

pub use analysis::{AnalysisResult, MetadataComparison, OutlierEvent, OutlierKind, analyze};
pub use chart::{
    auto_bin_edges, chart_title, render_duration_plot, render_histogram, write_charts,
};
pub use configuration::{AnalysisOptions, OutputOptions};
pub use diagnostics::{DiagnosticSink, PngMissWriter};
pub use error::FramestampError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use metadata::{CaptureMetadata, VideoMetadata};
pub use overlay::{
    DecodeFailure, DecodeFailureKind, DecodedOverlay, OverlayDecoder, OverlayOrigin,
    render_overlay, stamp_overlay,
};
#[cfg(feature = "rayon")]
pub use pipeline::analyze_batch_parallel;
pub use pipeline::{
    BatchEntry, VideoAnalysis, VideoPair, analyze_batch, analyze_video, find_pairs_in_directory,
};
pub use processor::{
    Anchor, CapturedFrame, DecodedStream, FrameOutcome, FrameRecord, FrameStreamProcessor,
    MissEvent, step,
};
pub use progress::{ProgressCallback, ProgressInfo};
pub use report::LagReport;
pub use source::{VideoFrames, VideoSource};
