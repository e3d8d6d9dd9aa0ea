//! Overlay timecode decoding.
//!
//! Every frame carries a 128×3 pixel strip that encodes a 64-bit tick count.
//! Bit `i` (most significant first) occupies columns `2i` and `2i + 1`; a
//! bright pair is a `1`, a dark pair is a `0`. All three rows carry the same
//! pattern, the decoder reads the middle one.
//!
//! Instead of a fixed brightness cutoff, [`OverlayDecoder`] derives a
//! threshold from each frame's own samples: the 64 pair sums are sorted and
//! the cut is placed in the middle of the largest gap between neighbours.
//! When that gap is smaller than the configured minimum the two clusters are
//! not separable and the frame is rejected rather than guessed.
//!
//! # Example
//!
//! ```
//! use framestamp::{OverlayDecoder, OverlayOrigin, render_overlay};
//!
//! let region = render_overlay(638_500_000_000_000_000, 16, 235);
//! let decoded = OverlayDecoder::new(OverlayOrigin::default())
//!     .decode(&region)
//!     .unwrap();
//! assert_eq!(decoded.ticks, 638_500_000_000_000_000);
//! ```

use image::{GenericImage, Rgb, RgbImage, imageops};
use thiserror::Error;

use crate::error::FramestampError;

/// Width of the overlay region in pixels.
pub const OVERLAY_WIDTH: u32 = 128;
/// Height of the overlay region in pixels.
pub const OVERLAY_HEIGHT: u32 = 3;
/// Number of bits carried by one overlay.
pub const BIT_COUNT: usize = 64;
/// Default minimum gap (in summed channel intensity) between the dark and
/// bright clusters.
pub const DEFAULT_MIN_GAP: u32 = 10;

/// Top-left corner of the overlay region inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OverlayOrigin {
    /// Column of the leftmost overlay pixel.
    pub x: u32,
    /// Row of the top overlay row.
    pub y: u32,
}

impl OverlayOrigin {
    /// Create an origin at `(x, y)`.
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// A successfully decoded overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOverlay {
    /// Decoded tick count (100 ns units since 0001-01-01).
    pub ticks: u64,
    /// The 64 decoded bits, most significant first, as `'0'`/`'1'`.
    pub bits: String,
}

/// Why an overlay could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeFailureKind {
    /// The frame is too small to contain the region at the configured origin.
    #[error("Frame too small for a 128×3 overlay at ({x},{y}); size=({width}×{height})")]
    RegionOutOfBounds {
        /// Configured origin column.
        x: u32,
        /// Configured origin row.
        y: u32,
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },

    /// No clean separation between dark and bright bit pairs.
    #[error("No clear black/white gap in overlay (max gap {max_gap} < {min_gap})")]
    AmbiguousThreshold {
        /// Largest difference between neighbouring sorted sums.
        max_gap: u32,
        /// Minimum gap the decoder was configured with.
        min_gap: u32,
    },
}

/// A per-frame decode failure.
///
/// Carries the pixels of the region that failed (clipped to the frame for
/// [`DecodeFailureKind::RegionOutOfBounds`], `None` when the origin lies
/// entirely outside the frame) so callers can persist them for inspection.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct DecodeFailure {
    /// What went wrong.
    pub kind: DecodeFailureKind,
    /// The overlay pixels as found in the frame.
    pub region: Option<RgbImage>,
}

/// Adaptive-threshold overlay decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct OverlayDecoder {
    origin: OverlayOrigin,
    min_gap: u32,
}

impl OverlayDecoder {
    /// Create a decoder reading the region at `origin`, with the default
    /// minimum gap of [`DEFAULT_MIN_GAP`].
    pub fn new(origin: OverlayOrigin) -> Self {
        Self {
            origin,
            min_gap: DEFAULT_MIN_GAP,
        }
    }

    /// Set the minimum gap between the dark and bright clusters.
    ///
    /// The default of 10 suits 8-bit footage; sources with a compressed
    /// dynamic range may need a smaller value.
    pub fn with_min_gap(mut self, min_gap: u32) -> Self {
        self.min_gap = min_gap;
        self
    }

    /// The configured region origin.
    pub fn origin(&self) -> OverlayOrigin {
        self.origin
    }

    /// The configured minimum gap.
    pub fn min_gap(&self) -> u32 {
        self.min_gap
    }

    /// Copy the overlay region out of `frame`, clipped to the frame bounds.
    pub fn extract_region(&self, frame: &RgbImage) -> Option<RgbImage> {
        let OverlayOrigin { x, y } = self.origin;
        if x >= frame.width() || y >= frame.height() {
            return None;
        }
        Some(imageops::crop_imm(frame, x, y, OVERLAY_WIDTH, OVERLAY_HEIGHT).to_image())
    }

    /// Decode the overlay of one frame.
    ///
    /// # Errors
    ///
    /// - [`DecodeFailureKind::RegionOutOfBounds`] if the region does not fit.
    /// - [`DecodeFailureKind::AmbiguousThreshold`] if the largest gap between
    ///   sorted pair sums is below the minimum gap.
    pub fn decode(&self, frame: &RgbImage) -> Result<DecodedOverlay, DecodeFailure> {
        let OverlayOrigin { x, y } = self.origin;
        let fits = u64::from(x) + u64::from(OVERLAY_WIDTH) <= u64::from(frame.width())
            && u64::from(y) + u64::from(OVERLAY_HEIGHT) <= u64::from(frame.height());
        if !fits {
            return Err(DecodeFailure {
                kind: DecodeFailureKind::RegionOutOfBounds {
                    x,
                    y,
                    width: frame.width(),
                    height: frame.height(),
                },
                region: self.extract_region(frame),
            });
        }

        let sums = pair_sums(frame, self.origin);

        let mut sorted = sums;
        sorted.sort_unstable();

        // First occurrence of the largest neighbour difference.
        let mut gap_index = 0;
        let mut max_gap = 0;
        for (index, pair) in sorted.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            if gap > max_gap {
                max_gap = gap;
                gap_index = index;
            }
        }

        if max_gap < self.min_gap {
            return Err(DecodeFailure {
                kind: DecodeFailureKind::AmbiguousThreshold {
                    max_gap,
                    min_gap: self.min_gap,
                },
                region: self.extract_region(frame),
            });
        }

        // sum > (lo + hi) / 2, kept in integers.
        let doubled_threshold = sorted[gap_index] + sorted[gap_index + 1];
        let mut ticks = 0_u64;
        let mut bits = String::with_capacity(BIT_COUNT);
        for sum in sums {
            let bit = 2 * sum > doubled_threshold;
            ticks = (ticks << 1) | u64::from(bit);
            bits.push(if bit { '1' } else { '0' });
        }

        Ok(DecodedOverlay { ticks, bits })
    }
}

/// Sum the six channel values of each bit's pixel pair on the middle row.
///
/// The caller guarantees that the region fits inside `frame`.
fn pair_sums(frame: &RgbImage, origin: OverlayOrigin) -> [u32; BIT_COUNT] {
    let row = origin.y + 1;
    let mut sums = [0_u32; BIT_COUNT];
    for (bit, sum) in sums.iter_mut().enumerate() {
        let column = origin.x + 2 * bit as u32;
        let Rgb(left) = *frame.get_pixel(column, row);
        let Rgb(right) = *frame.get_pixel(column + 1, row);
        *sum = left
            .iter()
            .chain(right.iter())
            .map(|&channel| u32::from(channel))
            .sum();
    }
    sums
}

/// Build a 128×3 overlay region encoding `ticks`.
///
/// Each `1` bit is painted with `high` on every channel, each `0` bit with
/// `low`.
pub fn render_overlay(ticks: u64, low: u8, high: u8) -> RgbImage {
    RgbImage::from_fn(OVERLAY_WIDTH, OVERLAY_HEIGHT, |column, _| {
        let bit = (column / 2) as usize;
        let set = (ticks >> (BIT_COUNT - 1 - bit)) & 1 == 1;
        let value = if set { high } else { low };
        Rgb([value, value, value])
    })
}

/// Paint an overlay encoding `ticks` into `frame` at `origin`.
///
/// Uses black and white pixels.
///
/// # Errors
///
/// Returns [`FramestampError::ImageError`] if the region does not fit.
pub fn stamp_overlay(
    frame: &mut RgbImage,
    origin: OverlayOrigin,
    ticks: u64,
) -> Result<(), FramestampError> {
    let region = render_overlay(ticks, 0, 255);
    frame.copy_from(&region, origin.x, origin.y)?;
    Ok(())
}
