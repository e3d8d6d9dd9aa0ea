//! Inter-frame delta charts.
//!
//! Two images summarise the deltas of one video:
//!
//! - a duration plot, one gray bar per delta with a zero baseline and dashed
//!   lines at ± the outlier threshold when one is known;
//! - a histogram of the same deltas with automatically chosen bins.
//!
//! Both are drawn with `plotters` into an in-memory RGB buffer, wrapped as an
//! [`RgbImage`] and saved as JPEG. Titles carry the video's base name and a
//! `(no JSON)` marker when the sidecar was unusable.

use std::error::Error;
use std::path::{Path, PathBuf};

use image::RgbImage;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::analysis::AnalysisResult;
use crate::error::FramestampError;

/// Size of the duration plot in pixels.
pub const DURATION_PLOT_SIZE: (u32, u32) = (1500, 600);
/// Size of the histogram in pixels.
pub const HISTOGRAM_SIZE: (u32, u32) = (900, 600);

const MARGIN: u32 = 15;
const X_LABEL_AREA: u32 = 45;
const Y_LABEL_AREA: u32 = 70;

/// Upper bound on histogram bins: one per pixel column of the plot area.
pub const MAX_HISTOGRAM_BINS: usize = (HISTOGRAM_SIZE.0 - Y_LABEL_AREA - 2 * MARGIN) as usize;

const FONT: &str = "sans-serif";
const TITLE_SIZE: u32 = 22;
const LABEL_SIZE: u32 = 15;

const BAR_FILL: RGBColor = RGBColor(128, 128, 128);
const BAR_EDGE: RGBColor = RGBColor(169, 169, 169);
const THRESHOLD_LINE: RGBColor = RGBColor(169, 169, 169);

/// Bars narrower than this many pixels are drawn without an edge.
const MIN_EDGED_BAR: u32 = 4;

type DrawResult = Result<(), Box<dyn Error>>;

/// Chart title: `<kind> [<base>]`, or `<kind> [<base> (no JSON)]` when the
/// metadata was unusable.
pub fn chart_title(kind: &str, base: &str, has_metadata: bool) -> String {
    if has_metadata {
        format!("{kind} [{base}]")
    } else {
        format!("{kind} [{base} (no JSON)]")
    }
}

/// Draw one bar per delta (x = 1..n) with a zero baseline and, when
/// `threshold_ms` is given, dashed lines at ± the threshold with a legend.
///
/// # Errors
///
/// Returns [`FramestampError::ChartError`] if plotting fails, for instance
/// when no font can be loaded for the labels.
pub fn render_duration_plot(
    deltas: &[f64],
    threshold_ms: Option<f64>,
    title: &str,
) -> Result<RgbImage, FramestampError> {
    render_with(DURATION_PLOT_SIZE, |root| {
        draw_duration_plot(root, deltas, threshold_ms, title)
    })
}

/// Draw a histogram of `deltas` using [`auto_bin_edges`].
///
/// # Errors
///
/// Returns [`FramestampError::ChartError`] if plotting fails.
pub fn render_histogram(deltas: &[f64], title: &str) -> Result<RgbImage, FramestampError> {
    render_with(HISTOGRAM_SIZE, |root| draw_histogram(root, deltas, title))
}

fn render_with<F>(size: (u32, u32), draw: F) -> Result<RgbImage, FramestampError>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> DrawResult,
{
    let (width, height) = size;
    let mut buffer = vec![0_u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
        draw(&root)
            .and_then(|()| root.present().map_err(Into::into))
            .map_err(|error| FramestampError::ChartError(error.to_string()))?;
    }
    RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| FramestampError::ChartError("chart buffer size mismatch".to_string()))
}

fn draw_duration_plot(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    deltas: &[f64],
    threshold_ms: Option<f64>,
    title: &str,
) -> DrawResult {
    root.fill(&WHITE)?;

    let threshold = threshold_ms.map(f64::abs);
    let (y_min, y_max) = value_range(
        deltas
            .iter()
            .copied()
            .chain(threshold.into_iter().flat_map(|t| [t, -t])),
    );
    let x_max = deltas.len().max(1) as f64 + 0.5;

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, TITLE_SIZE))
        .margin(MARGIN)
        .x_label_area_size(X_LABEL_AREA)
        .y_label_area_size(Y_LABEL_AREA)
        .build_cartesian_2d(0.5..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Frame index")
        .y_desc("Inter-frame Δt (ms)")
        .x_label_formatter(&|x| format!("{x:.0}"))
        .y_label_formatter(&|y| format!("{y:.0}"))
        .label_style((FONT, LABEL_SIZE))
        .axis_desc_style((FONT, LABEL_SIZE))
        .draw()?;

    let bar = |position: usize, delta: f64| {
        let x = (position + 1) as f64;
        [(x - 0.4, 0.0), (x + 0.4, delta)]
    };
    chart.draw_series(
        deltas
            .iter()
            .enumerate()
            .map(|(position, &delta)| Rectangle::new(bar(position, delta), BAR_FILL.filled())),
    )?;
    let plot_width = DURATION_PLOT_SIZE.0 - Y_LABEL_AREA - 2 * MARGIN;
    if deltas.len() as u64 * u64::from(MIN_EDGED_BAR) <= u64::from(plot_width) {
        chart.draw_series(deltas.iter().enumerate().map(|(position, &delta)| {
            Rectangle::new(bar(position, delta), BAR_EDGE.stroke_width(1))
        }))?;
    }

    chart.draw_series(LineSeries::new([(0.5, 0.0), (x_max, 0.0)], BLACK))?;

    if let Some(threshold) = threshold {
        for (value, sign) in [(threshold, '+'), (-threshold, '-')] {
            chart
                .draw_series(DashedLineSeries::new(
                    [(0.5, value), (x_max, value)],
                    12,
                    8,
                    THRESHOLD_LINE.stroke_width(2),
                ))?
                .label(format!("{sign}{threshold:.0} ms"))
                .legend(|(x, y)| {
                    PathElement::new(vec![(x, y), (x + 24, y)], THRESHOLD_LINE.stroke_width(2))
                });
        }
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE)
            .border_style(BLACK)
            .label_font((FONT, LABEL_SIZE))
            .draw()?;
    }
    Ok(())
}

fn draw_histogram(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    deltas: &[f64],
    title: &str,
) -> DrawResult {
    root.fill(&WHITE)?;

    let edges = auto_bin_edges(deltas);
    let counts = bin_counts(deltas, &edges);
    let (x_min, x_max) = match (edges.first(), edges.last()) {
        (Some(&first), Some(&last)) if last > first => (first, last),
        _ => (0.0, 1.0),
    };
    let tallest = counts.iter().copied().max().unwrap_or(0);
    let y_max = tallest + (tallest / 20).max(1);

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, TITLE_SIZE))
        .margin(MARGIN)
        .x_label_area_size(X_LABEL_AREA)
        .y_label_area_size(Y_LABEL_AREA)
        .build_cartesian_2d(x_min..x_max, 0_u64..y_max)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Inter-frame Δt (ms)")
        .y_desc("Count")
        .x_label_formatter(&|x| format!("{x:.1}"))
        .y_label_formatter(&|count| count.to_string())
        .label_style((FONT, LABEL_SIZE))
        .axis_desc_style((FONT, LABEL_SIZE))
        .draw()?;

    let filled_bins = || {
        edges
            .windows(2)
            .zip(&counts)
            .filter(|&(_, &count)| count > 0)
            .map(|(bin, &count)| [(bin[0], 0_u64), (bin[1], count)])
    };
    chart.draw_series(filled_bins().map(|corners| Rectangle::new(corners, BAR_FILL.filled())))?;
    if counts.len() * MIN_EDGED_BAR as usize <= MAX_HISTOGRAM_BINS {
        chart.draw_series(
            filled_bins().map(|corners| Rectangle::new(corners, BAR_EDGE.stroke_width(1))),
        )?;
    }
    Ok(())
}

/// Range covering every value and zero, with 5 % headroom.
fn value_range(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (mut min, mut max) = (0.0_f64, 0.0_f64);
    for value in values.into_iter().filter(|value| value.is_finite()) {
        min = min.min(value);
        max = max.max(value);
    }
    let pad = ((max - min) * 0.05).max(1.0);
    (if min < 0.0 { min - pad } else { min }, max + pad)
}

/// Bin edges chosen the way numpy's `bins="auto"` does.
///
/// The bin width is the smaller of the Sturges and Freedman–Diaconis
/// estimates, falling back to Sturges when the interquartile range is zero.
/// A constant sample gets a single bin of width 1 centred on the value.
/// Returns no edges for an empty sample.
///
/// The count is capped at [`MAX_HISTOGRAM_BINS`]: a tight core with one far
/// outlier would otherwise ask for millions of sub-pixel bins.
pub fn auto_bin_edges(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len() as f64;
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let range = max - min;

    let (first, last) = if range == 0.0 {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };

    let sturges = range / (count.log2() + 1.0);
    let iqr = percentile(&sorted, 0.75) - percentile(&sorted, 0.25);
    let freedman_diaconis = 2.0 * iqr * count.powf(-1.0 / 3.0);
    let bin_width = if freedman_diaconis > 0.0 {
        freedman_diaconis.min(sturges)
    } else {
        sturges
    };

    let bins = if bin_width > 0.0 {
        ((last - first) / bin_width)
            .ceil()
            .clamp(1.0, MAX_HISTOGRAM_BINS as f64) as usize
    } else {
        1
    };

    // The last edge is pinned so the maximum always falls in the last bin.
    (0..=bins)
        .map(|edge| match edge {
            edge if edge == bins => last,
            edge => first + (last - first) * edge as f64 / bins as f64,
        })
        .collect()
}

/// Count `values` into the bins described by `edges`; the last bin includes
/// its right edge.
pub fn bin_counts(values: &[f64], edges: &[f64]) -> Vec<u64> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let bins = edges.len() - 1;
    let first = edges[0];
    let last = edges[bins];
    let mut counts = vec![0_u64; bins];

    for &value in values {
        if !value.is_finite() || value < first || value > last {
            continue;
        }
        let position = ((value - first) / (last - first) * bins as f64).floor() as usize;
        counts[position.min(bins - 1)] += 1;
    }
    counts
}

/// `<prefix>_duration_plot.jpg`.
pub fn duration_plot_path<P: AsRef<Path>>(prefix: P) -> PathBuf {
    suffixed(prefix.as_ref(), "_duration_plot.jpg")
}

/// `<prefix>_histogram.jpg`.
pub fn histogram_path<P: AsRef<Path>>(prefix: P) -> PathBuf {
    suffixed(prefix.as_ref(), "_histogram.jpg")
}

/// Render and save both charts for `result`.
///
/// The file name of `prefix` is used as the base name in the titles.
/// Returns the written paths; nothing is written when there are no deltas.
///
/// # Errors
///
/// Returns [`FramestampError::ChartError`] if a chart cannot be drawn and
/// [`FramestampError::ImageError`] if it cannot be encoded or written.
pub fn write_charts<P: AsRef<Path>>(
    result: &AnalysisResult,
    prefix: P,
) -> Result<Vec<PathBuf>, FramestampError> {
    if result.deltas.is_empty() {
        log::debug!("No inter-frame deltas; skipping charts");
        return Ok(Vec::new());
    }
    let prefix = prefix.as_ref();
    let base = prefix
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let has_metadata = result.comparison.is_some();
    let threshold = result
        .comparison
        .map(|comparison| comparison.rounded_threshold_ms as f64);

    let duration_plot = duration_plot_path(prefix);
    render_duration_plot(
        &result.deltas,
        threshold,
        &chart_title("Durations", &base, has_metadata),
    )?
    .save(&duration_plot)?;
    log::info!("Saved duration plot: '{}'", duration_plot.display());

    let histogram = histogram_path(prefix);
    render_histogram(
        &result.deltas,
        &chart_title("Histogram of Δt", &base, has_metadata),
    )?
    .save(&histogram)?;
    log::info!("Saved histogram (auto bins): '{}'", histogram.display());

    Ok(vec![duration_plot, histogram])
}

fn suffixed(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    let position = fraction * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
