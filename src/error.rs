//! Error types for the `framestamp` crate.
//!
//! [`FramestampError`] covers the whole-video conditions that abort the
//! analysis of one video: an unreadable source or metadata file, a stream
//! without a single decodable overlay, and the usual I/O and image failures.
//! Per-frame overlay failures are not errors at this level; they are
//! [`DecodeFailure`](crate::DecodeFailure) values that the stream processor
//! turns into miss events.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all fallible `framestamp` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FramestampError {
    /// The video could not be opened or its first frame could not be read.
    #[error("Cannot read video source {path}: {reason}")]
    SourceUnreadable {
        /// Path of the video that failed.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded or converted to RGB.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The capture metadata file could not be read at all.
    ///
    /// Malformed *content* is not an error: it yields a
    /// [`CaptureMetadata`](crate::CaptureMetadata) with `valid == false`.
    #[error("Cannot read capture metadata {path}: {reason}")]
    MetadataUnreadable {
        /// Path of the metadata file.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Not a single frame of the stream carried a decodable overlay.
    #[error("No valid frame timestamps decoded ({frames_read} frames read)")]
    EmptyResult {
        /// Number of frames consumed from the source.
        frames_read: u64,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// A chart could not be drawn, typically because no font could be loaded
    /// for its labels.
    #[error("Chart rendering error: {0}")]
    ChartError(String),

    /// An error from the `image` crate while writing diagnostics or charts.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for FramestampError {
    fn from(error: FfmpegError) -> Self {
        FramestampError::FfmpegError(error.to_string())
    }
}
