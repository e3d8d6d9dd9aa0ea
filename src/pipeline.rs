//! Per-video orchestration.
//!
//! A capture is a pair of files sharing a base name: `<base>.mp4` holding the
//! stamped video and `<base>.json` holding the recorder's metadata.
//! [`analyze_video`] runs the whole chain for one pair. It loads the
//! metadata, decodes every frame, analyses the timestamps and writes the lag
//! log, the charts and the miss images. [`analyze_batch`] does the same for
//! many pairs, logging and skipping the ones that abort.

use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::{AnalysisResult, analyze};
use crate::chart::write_charts;
use crate::configuration::AnalysisOptions;
use crate::diagnostics::PngMissWriter;
use crate::error::FramestampError;
use crate::metadata::{CaptureMetadata, VideoMetadata};
use crate::processor::{CapturedFrame, FrameStreamProcessor};
use crate::report::LagReport;
use crate::source::VideoSource;

/// A video and its capture metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPair {
    /// Shared file stem, used to name every output.
    pub base: String,
    /// The `.mp4` file.
    pub video: PathBuf,
    /// The `.json` file.
    pub metadata: PathBuf,
}

impl VideoPair {
    /// Pair `<base>.mp4` with `<base>.json`. Neither file has to exist yet.
    pub fn from_base<P: AsRef<Path>>(base: P) -> Self {
        let base = base.as_ref();
        let name = base
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut video = base.as_os_str().to_os_string();
        video.push(".mp4");
        let mut metadata = base.as_os_str().to_os_string();
        metadata.push(".json");
        Self {
            base: name,
            video: PathBuf::from(video),
            metadata: PathBuf::from(metadata),
        }
    }

    /// Both files are present.
    pub fn exists(&self) -> bool {
        self.video.is_file() && self.metadata.is_file()
    }
}

/// List every `*.mp4` in `directory` that has a sibling `.json`, sorted by
/// path. Videos without metadata are logged and skipped.
///
/// # Errors
///
/// Returns [`FramestampError::IoError`] if the directory cannot be listed.
pub fn find_pairs_in_directory<P: AsRef<Path>>(
    directory: P,
) -> Result<Vec<VideoPair>, FramestampError> {
    let mut videos = Vec::new();
    for entry in fs::read_dir(directory.as_ref())? {
        let path = entry?.path();
        let is_mp4 = path
            .extension()
            .is_some_and(|extension| extension == "mp4");
        if is_mp4 && path.is_file() {
            videos.push(path);
        }
    }
    videos.sort();

    let pairs = videos
        .into_iter()
        .filter_map(|video| {
            let pair = VideoPair::from_base(video.with_extension(""));
            if pair.metadata.is_file() {
                Some(pair)
            } else {
                log::warn!("No JSON found for '{}', skipping.", video.display());
                None
            }
        })
        .collect();
    Ok(pairs)
}

/// Everything produced for one video.
#[derive(Debug, Clone)]
pub struct VideoAnalysis {
    /// The analysed pair.
    pub pair: VideoPair,
    /// What the container reports about the video.
    pub video_metadata: VideoMetadata,
    /// The capture metadata, possibly invalid.
    pub capture_metadata: CaptureMetadata,
    /// The analysis.
    pub result: AnalysisResult,
    /// The first valid frames, when capture was requested.
    pub captured: Vec<CapturedFrame>,
    /// Path of the written lag log.
    pub lag_log: PathBuf,
    /// Paths of the written charts.
    pub charts: Vec<PathBuf>,
    /// Number of miss images written.
    pub miss_images: u64,
}

/// Analyse one video and write its outputs.
///
/// # Errors
///
/// Aborts the video, with no partial outputs beyond miss images already
/// written, when:
///
/// - the metadata file cannot be read ([`FramestampError::MetadataUnreadable`]);
/// - the video cannot be opened or read ([`FramestampError::SourceUnreadable`]);
/// - no overlay decodes ([`FramestampError::EmptyResult`]);
/// - an output cannot be written.
pub fn analyze_video(
    pair: &VideoPair,
    options: &AnalysisOptions,
) -> Result<VideoAnalysis, FramestampError> {
    let base = pair.base.as_str();
    let output_directory = options.output().directory_for(&pair.video);
    if !output_directory.as_os_str().is_empty() {
        fs::create_dir_all(&output_directory)?;
    }
    let prefix = output_directory.join(base);

    let capture_metadata = CaptureMetadata::load(&pair.metadata)?;
    match (&capture_metadata.issue, capture_metadata.valid) {
        (Some(issue), false) => log::warn!(
            "[{base}] Metadata invalid ({issue}); skipping start/stop and outlier checks."
        ),
        _ => log_metadata(base, &capture_metadata),
    }

    let mut source = VideoSource::open(&pair.video)?;
    let video_metadata = source.metadata().clone();
    let frames = source
        .frames()
        .map_err(|error| FramestampError::SourceUnreadable {
            path: pair.video.clone(),
            reason: error.to_string(),
        })?;

    let mut miss_writer = PngMissWriter::new(&prefix);
    let processor = FrameStreamProcessor::new(options)
        .with_source(&pair.video)
        .with_tz_offset(capture_metadata.tz_offset_minutes)
        .with_expected_frames(
            capture_metadata
                .expected_frames()
                .or(Some(video_metadata.frame_count).filter(|&count| count > 0)),
        );
    let processor = if options.output().miss_images {
        processor.with_diagnostic_sink(&mut miss_writer)
    } else {
        processor
    };

    let mut stream = match processor.process(frames) {
        Ok(stream) => stream,
        Err(FramestampError::EmptyResult { frames_read }) => {
            log::warn!("[{base}] No valid frame timestamps decoded; skipping.");
            return Err(FramestampError::EmptyResult { frames_read });
        }
        Err(error) => return Err(error),
    };
    drop(source);

    let captured = std::mem::take(&mut stream.captured);
    let result = analyze(stream, &capture_metadata);
    log::info!(
        "[{base}] {} frames read, {} valid, {} misses, {} outliers",
        result.total_frames,
        result.valid_frames(),
        result.misses.len(),
        result.outliers.len()
    );

    let lag_log = LagReport::new(&result).write(&prefix)?;
    log::info!("[{base}] Wrote lag/offset log: '{}'", lag_log.display());

    let charts = if options.output().charts {
        write_charts(&result, &prefix)?
    } else {
        Vec::new()
    };

    Ok(VideoAnalysis {
        pair: pair.clone(),
        video_metadata,
        capture_metadata,
        result,
        captured,
        lag_log,
        charts,
        miss_images: miss_writer.written(),
    })
}

fn log_metadata(base: &str, metadata: &CaptureMetadata) {
    let (Some(start), Some(stop), Some(interval)) = (
        metadata.start_ts_ms(),
        metadata.stop_ts_ms(),
        metadata.nominal_interval_ms(),
    ) else {
        return;
    };
    log::info!(
        "[{base}] Metadata startTs={start:.3} ms, stopTs={stop:.3} ms, numFrames={}, \
         nominal_interval_ms={interval:.3}, threshold_ms={:.3}, tzOffset={} min",
        metadata.num_frames,
        2.0 * interval,
        metadata.tz_offset_minutes
    );
}

/// Outcome of one video in a batch.
#[derive(Debug)]
pub struct BatchEntry {
    /// The pair that was analysed.
    pub pair: VideoPair,
    /// Its analysis, or why it aborted.
    pub outcome: Result<VideoAnalysis, FramestampError>,
}

/// Analyse `pairs` one after another. An aborted video is logged and does
/// not stop the batch.
pub fn analyze_batch(pairs: &[VideoPair], options: &AnalysisOptions) -> Vec<BatchEntry> {
    pairs
        .iter()
        .map(|pair| run_entry(pair, options))
        .collect()
}

/// Analyse `pairs` on the rayon thread pool, one independent pipeline per
/// video. Results keep the order of `pairs`.
#[cfg(feature = "rayon")]
pub fn analyze_batch_parallel(pairs: &[VideoPair], options: &AnalysisOptions) -> Vec<BatchEntry> {
    use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

    pairs
        .par_iter()
        .map(|pair| run_entry(pair, options))
        .collect()
}

fn run_entry(pair: &VideoPair, options: &AnalysisOptions) -> BatchEntry {
    let outcome = analyze_video(pair, options);
    if let Err(error) = &outcome {
        log::error!("[{}] Analysis aborted: {error}", pair.base);
    }
    BatchEntry {
        pair: pair.clone(),
        outcome,
    }
}
