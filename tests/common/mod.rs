//! Synthetic stamped captures for end-to-end tests and benchmarks.
//!
//! Frames are encoded losslessly (PNG in a QuickTime container, RGB24 end to
//! end) so the overlay survives the round trip through FFmpeg bit for bit.
//! The files keep the `.mp4` name the pipeline pairs on; FFmpeg detects the
//! container from its contents.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use ffmpeg_next::codec::{self, Id};
use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::{self, Pixel};
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::{Error, Packet, Rational};
use framestamp::{OverlayOrigin, VideoPair, stamp_overlay};
use image::{Rgb, RgbImage};
use serde_json::json;

/// 2024-01-01 00:00:00 UTC in ticks.
pub const BASE_TICKS: u64 = 638_396_640_000_000_000;
/// The same instant in Unix seconds.
pub const BASE_UNIX_SECONDS: f64 = 1_704_067_200.0;
/// One frame at 30 fps, in ticks.
pub const FRAME_TICKS: u64 = 333_333;

/// Layout of a generated capture.
#[derive(Debug, Clone)]
pub struct Capture {
    pub width: u32,
    pub height: u32,
    pub frames: u64,
    /// Frames left without an overlay.
    pub blank: Vec<u64>,
    /// From this frame on, every timestamp is shifted by `stall_ticks`.
    pub stall_from: Option<u64>,
    pub stall_ticks: u64,
}

impl Default for Capture {
    /// 30 frames at 30 fps, 202 px wide so RGB rows need stride padding,
    /// frames 5 and 12 blank and a 100 ms stall before frame 20.
    fn default() -> Self {
        Self {
            width: 202,
            height: 24,
            frames: 30,
            blank: vec![5, 12],
            stall_from: Some(20),
            stall_ticks: 1_000_000,
        }
    }
}

impl Capture {
    /// Ticks stamped on frame `index`, blank or not.
    pub fn ticks(&self, index: u64) -> u64 {
        let stall = match self.stall_from {
            Some(from) if index >= from => self.stall_ticks,
            _ => 0,
        };
        BASE_TICKS + index * FRAME_TICKS + stall
    }

    pub fn images(&self) -> Vec<RgbImage> {
        (0..self.frames)
            .map(|index| {
                let mut frame = RgbImage::from_pixel(self.width, self.height, Rgb([90, 90, 90]));
                if !self.blank.contains(&index) {
                    stamp_overlay(&mut frame, OverlayOrigin::default(), self.ticks(index))
                        .expect("Overlay fits the frame");
                }
                frame
            })
            .collect()
    }

    /// Write `<base>.mp4` and a sidecar declaring the first and last stamped
    /// instants, rounded to the millisecond.
    pub fn write_pair<P: AsRef<Path>>(&self, base: P) -> VideoPair {
        let pair = VideoPair::from_base(base);
        write_video(&pair.video, &self.images(), 30).expect("Failed to encode capture");

        let last_ms = (self.ticks(self.frames - 1) - BASE_TICKS) as f64 / 10_000.0;
        let sidecar = json!({
            "file": {
                "startTs": BASE_UNIX_SECONDS,
                "stopTs": BASE_UNIX_SECONDS + last_ms.round() / 1000.0,
                "numFrames": self.frames,
                "tzOffset": 60,
            }
        });
        fs::write(&pair.metadata, sidecar.to_string()).expect("Failed to write sidecar");
        pair
    }
}

/// Encode RGB frames losslessly at `fps`.
pub fn write_video(path: &Path, frames: &[RgbImage], fps: i32) -> Result<(), Error> {
    let (width, height) = frames.first().ok_or(Error::InvalidData)?.dimensions();
    ffmpeg_next::init()?;

    let mut output = format::output_as(path, "mov")?;
    let needs_global_header = output.format().flags().contains(format::Flags::GLOBAL_HEADER);
    let png = ffmpeg_next::encoder::find(Id::PNG).ok_or(Error::EncoderNotFound)?;

    let mut stream = output.add_stream(png)?;
    let stream_index = stream.index();
    let frame_time_base = Rational::new(1, fps);
    stream.set_time_base(frame_time_base);

    let mut encoder = codec::context::Context::from_parameters(stream.parameters())?
        .encoder()
        .video()?;
    encoder.set_width(width);
    encoder.set_height(height);
    encoder.set_format(Pixel::RGB24);
    encoder.set_time_base(frame_time_base);
    encoder.set_frame_rate(Some(Rational::new(fps, 1)));
    if needs_global_header {
        encoder.set_flags(codec::Flags::GLOBAL_HEADER);
    }
    let mut encoder = encoder.open_as(png)?;
    stream.set_parameters(&encoder);

    output.write_header()?;
    let stream_time_base = output
        .stream(stream_index)
        .ok_or(Error::StreamNotFound)?
        .time_base();

    let row_bytes = width as usize * 3;
    for (index, image) in frames.iter().enumerate() {
        let mut frame = VideoFrame::new(Pixel::RGB24, width, height);
        let stride = frame.stride(0);
        let data = frame.data_mut(0);
        for (row, pixels) in image.as_raw().chunks_exact(row_bytes).enumerate() {
            data[row * stride..row * stride + row_bytes].copy_from_slice(pixels);
        }
        frame.set_pts(Some(index as i64));

        encoder.send_frame(&frame)?;
        write_packets(&mut encoder, &mut output, stream_index, frame_time_base, stream_time_base)?;
    }

    encoder.send_eof()?;
    write_packets(&mut encoder, &mut output, stream_index, frame_time_base, stream_time_base)?;
    output.write_trailer()
}

fn write_packets(
    encoder: &mut ffmpeg_next::encoder::video::Encoder,
    output: &mut Output,
    stream_index: usize,
    from: Rational,
    to: Rational,
) -> Result<(), Error> {
    let mut packet = Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.set_duration(1);
        packet.rescale_ts(from, to);
        packet.write_interleaved(output)?;
    }
    Ok(())
}
