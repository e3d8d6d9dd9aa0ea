//! FFmpeg-backed frame source.
//!
//! [`VideoSource`] opens a video file and [`VideoSource::frames`] yields
//! every frame of its best video stream as an RGB24 [`RgbImage`], in decode
//! order, one at a time. Nothing is buffered beyond the frame being
//! converted, and the demuxer is released when the source is dropped.
//!
//! # Example
//!
//! ```no_run
//! use framestamp::{FramestampError, VideoSource};
//!
//! let mut source = VideoSource::open("capture.mp4")?;
//! println!("{} fps", source.metadata().frames_per_second);
//! for frame in source.frames()? {
//!     let frame = frame?;
//!     println!("{}×{}", frame.width(), frame.height());
//! }
//! # Ok::<(), FramestampError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::error::FramestampError;
use crate::metadata::VideoMetadata;

/// An opened video file.
pub struct VideoSource {
    input_context: Input,
    video_stream_index: usize,
    metadata: VideoMetadata,
    path: PathBuf,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("path", &self.path)
            .field("video_stream_index", &self.video_stream_index)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open a video file and locate its best video stream.
    ///
    /// Initializes FFmpeg (idempotent).
    ///
    /// # Errors
    ///
    /// - [`FramestampError::SourceUnreadable`] if the file cannot be opened
    ///   or its decoder cannot be created.
    /// - [`FramestampError::NoVideoStream`] if there is no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FramestampError> {
        let path = path.as_ref().to_path_buf();
        let unreadable = |reason: String| FramestampError::SourceUnreadable {
            path: path.clone(),
            reason,
        };

        log::debug!("Opening video: {}", path.display());

        ffmpeg_next::init()
            .map_err(|error| unreadable(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| unreadable(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(FramestampError::NoVideoStream)?;
        let video_stream_index = stream.index();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| unreadable(format!("cannot create video decoder: {error}")))?;

        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        let duration_seconds = if input_context.duration() > 0 {
            input_context.duration() as f64 / 1_000_000.0
        } else {
            0.0
        };
        let frame_count = match stream.frames() {
            frames if frames > 0 => frames as u64,
            _ => (duration_seconds * frames_per_second).round() as u64,
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            codec,
        };
        log::debug!(
            "{}: {}×{} @ {:.2} fps, ~{} frames [{}]",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.frame_count,
            metadata.codec
        );

        Ok(Self {
            input_context,
            video_stream_index,
            metadata,
            path,
        })
    }

    /// Stream metadata reported by the container.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate over every frame from the current position.
    ///
    /// The source is not restartable: a second call continues where the
    /// first iterator stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the decoder or the RGB converter cannot be set up.
    pub fn frames(&mut self) -> Result<VideoFrames<'_>, FramestampError> {
        let stream = self
            .input_context
            .stream(self.video_stream_index)
            .ok_or(FramestampError::NoVideoStream)?;
        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        Ok(VideoFrames {
            input_context: &mut self.input_context,
            video_stream_index: self.video_stream_index,
            decoder,
            scaler,
            width,
            height,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            eof_sent: false,
            done: false,
        })
    }
}

/// Lazy iterator over the decoded frames of a [`VideoSource`].
pub struct VideoFrames<'a> {
    input_context: &'a mut Input,
    video_stream_index: usize,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    width: u32,
    height: u32,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    eof_sent: bool,
    done: bool,
}

impl VideoFrames<'_> {
    fn convert_current_frame(&mut self) -> Result<RgbImage, FramestampError> {
        self.scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
        let buffer = packed_rgb(&self.rgb_frame, self.width, self.height);
        RgbImage::from_raw(self.width, self.height, buffer).ok_or_else(|| {
            FramestampError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }

    fn fail(&mut self, error: FramestampError) -> Option<Result<RgbImage, FramestampError>> {
        self.done = true;
        Some(Err(error))
    }
}

impl Iterator for VideoFrames<'_> {
    type Item = Result<RgbImage, FramestampError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return match self.convert_current_frame() {
                    Ok(image) => Some(Ok(image)),
                    Err(error) => self.fail(error),
                };
            }

            if self.eof_sent {
                self.done = true;
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            return self.fail(error.into());
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        return self.fail(error.into());
                    }
                    self.eof_sent = true;
                }
                Err(error) => {
                    log::debug!("Skipping unreadable packet: {error}");
                }
            }
        }
    }
}

/// Copy an RGB24 frame into a tightly packed buffer, dropping row padding.
fn packed_rgb(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_bytes = width as usize * 3;
    let data = frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * height as usize].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            buffer.extend_from_slice(&data[start..start + row_bytes]);
        }
        buffer
    }
}
