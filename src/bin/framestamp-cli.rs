use std::{io::Write, path::PathBuf, sync::Arc};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framestamp::{
    AnalysisOptions, BatchEntry, FfmpegLogLevel, OutputOptions, OverlayDecoder, OverlayOrigin,
    ProgressCallback, ProgressInfo, VideoAnalysis, VideoPair, analyze_batch,
    find_pairs_in_directory,
    ticks::{format_local, ticks_to_datetime, ticks_to_epoch_ms},
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  framestamp analyze --dir captures\n  framestamp analyze --file captures/run_01 --output reports --debug\n  framestamp decode frame.png --overlay-y 2\n  framestamp completions zsh > _framestamp";

/// Valid frames kept and dumped by `analyze --debug`.
const DEBUG_FRAMES: usize = 5;

#[derive(Debug, Parser)]
#[command(
    name = "framestamp",
    version,
    about = "Decode per-frame overlay timestamps and audit capture timing",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Enable debug logging, including one line per decoded frame.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress spinner while frames decode.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Args, Clone)]
struct OverlayArgs {
    /// Overlay top-left X.
    #[arg(long, default_value_t = 0)]
    overlay_x: u32,

    /// Overlay top-left Y.
    #[arg(long, default_value_t = 0)]
    overlay_y: u32,

    /// Smallest gap between dark and bright bit sums that still decodes.
    #[arg(long, default_value_t = framestamp::overlay::DEFAULT_MIN_GAP)]
    min_gap: u32,
}

impl OverlayArgs {
    fn origin(&self) -> OverlayOrigin {
        OverlayOrigin::new(self.overlay_x, self.overlay_y)
    }
}

#[derive(Debug, Args, Clone)]
#[group(required = true, multiple = false)]
struct Target {
    /// Directory of .mp4 files with matching .json metadata.
    #[arg(long, short = 'd')]
    dir: Option<PathBuf>,

    /// Base path (no extension) of one .mp4 + .json pair.
    #[arg(long, short = 'f')]
    file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyse one capture or a directory of captures.
    #[command(
        about = "Analyse frame timestamps against capture metadata",
        after_help = "Examples:\n  framestamp analyze --dir captures --progress\n  framestamp analyze --file captures/run_01 --json"
    )]
    Analyze {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        overlay: OverlayArgs,

        /// Output directory for logs, charts and miss images (default: next to each video).
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Dump the first 5 valid frames of the first video as PNGs.
        #[arg(long)]
        debug: bool,

        /// Do not render the duration plot and histogram.
        #[arg(long)]
        no_charts: bool,

        /// Do not save the overlay region of missed frames.
        #[arg(long)]
        no_miss_images: bool,

        /// Print a machine-readable summary.
        #[arg(long)]
        json: bool,

        /// Analyse videos concurrently.
        #[cfg(feature = "rayon")]
        #[arg(long)]
        parallel: bool,
    },

    /// Decode the overlay of a single image.
    #[command(
        about = "Decode the overlay of a still image",
        after_help = "Examples:\n  framestamp decode frame.png\n  framestamp decode frame.png --overlay-x 16 --min-gap 6"
    )]
    Decode {
        /// Image file (png, jpg, bmp, ...).
        image: PathBuf,

        #[command(flatten)]
        overlay: OverlayArgs,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completion scripts",
        after_help = "Examples:\n  framestamp completions bash > framestamp.bash\n  framestamp completions zsh > _framestamp"
    )]
    Completions {
        /// Shell type.
        shell: Shell,
    },
}

fn init_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .write_style(env_logger::WriteStyle::Auto)
        .init();
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    value.parse().ok()
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let level = match &global.log_level {
        Some(level) => {
            parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?
        }
        None => FfmpegLogLevel::Error,
    };
    framestamp::set_ffmpeg_log_level(level);
    Ok(())
}

fn warn(message: impl AsRef<str>) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.as_ref().yellow());
}

struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.green} {prefix:.bold} {pos} frames {msg}",
        )?);
        Ok(Self { bar })
    }

    fn start(&self, base: &str) {
        self.bar.reset();
        self.bar.set_prefix(base.to_string());
        self.bar.set_message("");
    }
}

impl ProgressCallback for SpinnerProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.frames_read);
        let percentage = info
            .percentage
            .map(|percentage| format!(" ({percentage:.0}%)"))
            .unwrap_or_default();
        self.bar.set_message(format!(
            "{} valid, {} misses{percentage}",
            info.valid, info.misses
        ));
    }
}

fn resolve_pairs(target: &Target) -> Result<Vec<VideoPair>, Box<dyn std::error::Error>> {
    if let Some(directory) = &target.dir {
        if !directory.is_dir() {
            return Err(format!("directory '{}' not found", directory.display()).into());
        }
        let pairs = find_pairs_in_directory(directory)?;
        if pairs.is_empty() {
            return Err(format!("no valid pairs in '{}'", directory.display()).into());
        }
        return Ok(pairs);
    }

    let base = target.file.as_ref().ok_or("either --dir or --file is required")?;
    let pair = VideoPair::from_base(base);
    if !pair.exists() {
        return Err(format!(
            "video or JSON not found ({} / {})",
            pair.video.display(),
            pair.metadata.display()
        )
        .into());
    }
    Ok(vec![pair])
}

#[cfg(feature = "rayon")]
fn run_batch(pairs: &[VideoPair], options: &AnalysisOptions, parallel: bool) -> Vec<BatchEntry> {
    if parallel {
        framestamp::analyze_batch_parallel(pairs, options)
    } else {
        analyze_batch(pairs, options)
    }
}

#[cfg(not(feature = "rayon"))]
fn run_batch(pairs: &[VideoPair], options: &AnalysisOptions, _parallel: bool) -> Vec<BatchEntry> {
    analyze_batch(pairs, options)
}

fn dump_debug_frames(analysis: &VideoAnalysis) -> Result<(), Box<dyn std::error::Error>> {
    let directory = analysis
        .lag_log
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    for frame in &analysis.captured {
        let path = directory.join(format!("{}_debug_{:04}.png", analysis.pair.base, frame.index));
        frame.image.save(&path)?;
        log::info!(
            "[{}] DEBUG frame {:04}: ticks={}, epoch_ms={:.3}, local={}, bits={} → '{}'",
            analysis.pair.base,
            frame.index,
            frame.ticks,
            frame.epoch_ms,
            format_local(frame.epoch_ms, analysis.result.tz_offset_minutes),
            frame.bits,
            path.display()
        );
    }
    Ok(())
}

fn summary_json(entry: &BatchEntry) -> serde_json::Value {
    match &entry.outcome {
        Ok(analysis) => {
            let result = &analysis.result;
            json!({
                "base": entry.pair.base,
                "status": "ok",
                "frames_read": result.total_frames,
                "valid_frames": result.valid_frames(),
                "frames_expected": result.expected_frames,
                "misses": result.misses.len(),
                "outliers": result.outliers.len(),
                "observed_fps": result.observed_fps,
                "metadata_valid": analysis.capture_metadata.valid,
                "offset_start_ms": result.comparison.map(|c| c.offset_start_ms),
                "offset_end_ms": result.comparison.map(|c| c.offset_end_ms),
                "threshold_ms": result.comparison.map(|c| c.rounded_threshold_ms),
                "lag_log": analysis.lag_log.display().to_string(),
                "charts": analysis.charts.iter().map(|path| path.display().to_string()).collect::<Vec<_>>(),
                "miss_images": analysis.miss_images,
            })
        }
        Err(error) => json!({
            "base": entry.pair.base,
            "status": "aborted",
            "error": error.to_string(),
        }),
    }
}

fn print_summary(entry: &BatchEntry) {
    match &entry.outcome {
        Ok(analysis) => {
            let result = &analysis.result;
            println!(
                "{} {}: {}/{} frames valid, {} misses, {} outliers, {} Hz → {}",
                "done".green().bold(),
                entry.pair.base,
                result.valid_frames(),
                result.total_frames,
                result.misses.len(),
                result.outliers.len(),
                result.observed_fps,
                analysis.lag_log.display()
            );
            if let Some(comparison) = &result.comparison {
                if comparison.start_mismatch() || comparison.end_mismatch() {
                    warn(format!(
                        "{}: boundary offsets start={} ms, end={} ms",
                        entry.pair.base, comparison.offset_start_ms, comparison.offset_end_ms
                    ));
                }
            }
        }
        Err(error) => {
            eprintln!("{} {}: {error}", "aborted".red().bold(), entry.pair.base);
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logger(cli.global.verbose);
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Analyze {
            target,
            overlay,
            output,
            debug,
            no_charts,
            no_miss_images,
            json,
            #[cfg(feature = "rayon")]
            parallel,
        } => {
            #[cfg(not(feature = "rayon"))]
            let parallel = false;

            let pairs = resolve_pairs(&target)?;

            let output_options = match &output {
                Some(directory) => OutputOptions::new(directory),
                None => OutputOptions::default(),
            }
            .with_charts(!no_charts)
            .with_miss_images(!no_miss_images);

            let mut options = AnalysisOptions::new()
                .with_overlay_origin(overlay.origin())
                .with_min_gap(overlay.min_gap)
                .with_output(output_options);

            let spinner = if cli.global.progress && !parallel {
                let spinner = Arc::new(SpinnerProgress::new()?);
                options = options
                    .with_progress(Arc::clone(&spinner) as Arc<dyn ProgressCallback>)
                    .with_batch_size(25);
                Some(spinner)
            } else {
                None
            };
            if cli.global.progress && parallel {
                warn("--progress is ignored with --parallel");
            }

            let mut entries = Vec::with_capacity(pairs.len());
            let mut remaining = pairs.as_slice();
            if debug {
                if let Some((first, rest)) = pairs.split_first() {
                    if let Some(spinner) = &spinner {
                        spinner.start(&first.base);
                    }
                    let debug_options = options.clone().with_capture_first_valid(DEBUG_FRAMES);
                    entries.extend(analyze_batch(std::slice::from_ref(first), &debug_options));
                    remaining = rest;
                }
            }
            match &spinner {
                Some(spinner) => {
                    for pair in remaining {
                        spinner.start(&pair.base);
                        entries.extend(analyze_batch(std::slice::from_ref(pair), &options));
                    }
                    spinner.bar.finish_and_clear();
                }
                None => entries.extend(run_batch(remaining, &options, parallel)),
            }

            if debug {
                if let Some(Ok(analysis)) = entries.first().map(|entry| &entry.outcome) {
                    dump_debug_frames(analysis)?;
                }
            }

            if json {
                let payload: Vec<_> = entries.iter().map(summary_json).collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                entries.iter().for_each(print_summary);
            }

            let aborted = entries.iter().filter(|entry| entry.outcome.is_err()).count();
            if aborted > 0 {
                warn(format!("{aborted} of {} video(s) aborted", entries.len()));
            }
        }
        Commands::Decode {
            image,
            overlay,
            json,
        } => {
            let frame = image::open(&image)?.to_rgb8();
            let decoder = OverlayDecoder::new(overlay.origin()).with_min_gap(overlay.min_gap);
            let decoded = decoder
                .decode(&frame)
                .map_err(|failure| format!("{}: {}", image.display(), failure.kind))?;

            let epoch_ms = ticks_to_epoch_ms(decoded.ticks);
            let utc = ticks_to_datetime(decoded.ticks)
                .map(|datetime| datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string())
                .unwrap_or_else(|| "out of range".to_string());

            if json {
                let payload = json!({
                    "ticks": decoded.ticks,
                    "bits": decoded.bits,
                    "epoch_ms": epoch_ms,
                    "utc": utc,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Ticks: {}", decoded.ticks);
                println!("Bits: {}", decoded.bits);
                println!("Epoch: {epoch_ms:.3} ms");
                println!("UTC: {utc}");
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framestamp", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, parse_log_level};
    use clap::Parser;
    use framestamp::FfmpegLogLevel;

    #[test]
    fn parse_log_level_aliases() {
        assert_eq!(parse_log_level("quiet"), Some(FfmpegLogLevel::Quiet));
        assert_eq!(parse_log_level("WARN"), Some(FfmpegLogLevel::Warning));
        assert_eq!(parse_log_level("Error"), Some(FfmpegLogLevel::Error));
        assert!(parse_log_level("trace").is_none());
    }

    #[test]
    fn analyze_requires_exactly_one_target() {
        assert!(Cli::try_parse_from(["framestamp", "analyze"]).is_err());
        assert!(
            Cli::try_parse_from(["framestamp", "analyze", "--dir", "a", "--file", "b"]).is_err()
        );
        assert!(Cli::try_parse_from(["framestamp", "analyze", "--dir", "a"]).is_ok());
    }

    #[test]
    fn overlay_flags_default_and_override() {
        let cli = Cli::try_parse_from([
            "framestamp",
            "analyze",
            "--file",
            "captures/run_01",
            "--overlay-y",
            "2",
            "--min-gap",
            "6",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.global.verbose);
        let Commands::Analyze { overlay, .. } = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(overlay.overlay_x, 0);
        assert_eq!(overlay.overlay_y, 2);
        assert_eq!(overlay.min_gap, 6);
    }
}
