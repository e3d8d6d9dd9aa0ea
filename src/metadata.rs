//! Metadata types.
//!
//! Two kinds of metadata describe a capture:
//!
//! - [`CaptureMetadata`], the sidecar JSON written by the recorder, declaring
//!   when recording started and stopped and how many frames it asked for.
//!   The analyzer compares the decoded timestamps against it.
//! - [`VideoMetadata`], what the container itself reports about the video
//!   stream (dimensions, nominal frame rate, estimated frame count).
//!
//! Sidecar problems never abort an analysis. A missing field, a value that
//! does not parse, or fewer than two declared frames yields a
//! `CaptureMetadata` with `valid == false`, and the analyzer falls back to
//! decode-only mode. Only a file that cannot be read at all is an error.
//!
//! # Example
//!
//! ```
//! use framestamp::CaptureMetadata;
//!
//! let metadata = CaptureMetadata::from_json_str(
//!     r#"{"file": {"startTs": 1000.0, "stopTs": 1003.0, "numFrames": 4, "tzOffset": -300}}"#,
//! );
//! assert!(metadata.valid);
//! assert_eq!(metadata.nominal_interval_ms(), Some(1000.0));
//! ```

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::FramestampError;

/// Recorder-declared timing of a capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureMetadata {
    /// Declared start time, seconds since the Unix epoch.
    pub start_ts: f64,
    /// Declared stop time, seconds since the Unix epoch.
    pub stop_ts: f64,
    /// Declared number of frames.
    pub num_frames: u64,
    /// Local timezone of the recorder, minutes east of UTC.
    pub tz_offset_minutes: i32,
    /// Whether the comparison fields are usable.
    pub valid: bool,
    /// Why the metadata is not usable, when `valid` is `false`.
    pub issue: Option<String>,
}

impl CaptureMetadata {
    /// Metadata that disables every comparison.
    pub fn invalid<S: Into<String>>(issue: S) -> Self {
        Self {
            start_ts: 0.0,
            stop_ts: 0.0,
            num_frames: 0,
            tz_offset_minutes: 0,
            valid: false,
            issue: Some(issue.into()),
        }
    }

    /// Build valid metadata from known values.
    ///
    /// The result is still marked invalid when `num_frames < 2`.
    pub fn new(start_ts: f64, stop_ts: f64, num_frames: u64, tz_offset_minutes: i32) -> Self {
        let mut metadata = Self {
            start_ts,
            stop_ts,
            num_frames,
            tz_offset_minutes,
            valid: true,
            issue: None,
        };
        metadata.check_frame_count();
        metadata
    }

    /// Read and parse a sidecar JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`FramestampError::MetadataUnreadable`] only when the file
    /// cannot be read. Malformed content produces invalid metadata instead.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FramestampError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|error| FramestampError::MetadataUnreadable {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        Ok(Self::from_json_str(&text))
    }

    /// Parse sidecar JSON of the form
    /// `{"file": {"startTs": .., "stopTs": .., "numFrames": .., "tzOffset": ..}}`.
    ///
    /// Numbers may also be given as numeric strings. `tzOffset` is optional
    /// and defaults to 0. When a required field is missing or malformed the
    /// whole document is invalid and `tzOffset` is reset to 0 as well.
    pub fn from_json_str(text: &str) -> Self {
        let document: Value = match serde_json::from_str(text) {
            Ok(document) => document,
            Err(error) => return Self::invalid(format!("JSON does not parse: {error}")),
        };
        let file = document.get("file").unwrap_or(&Value::Null);

        match required_fields(file).and_then(|fields| Ok((fields, tz_offset(file)?))) {
            Ok(((start_ts, stop_ts, num_frames), tz_offset_minutes)) => {
                Self::new(start_ts, stop_ts, num_frames, tz_offset_minutes)
            }
            Err(issue) => Self::invalid(issue),
        }
    }

    fn check_frame_count(&mut self) {
        if self.num_frames < 2 {
            self.valid = false;
            self.issue = Some(format!("numFrames < 2 ({})", self.num_frames));
        }
    }

    /// Declared start in epoch milliseconds, when valid.
    pub fn start_ts_ms(&self) -> Option<f64> {
        self.valid.then(|| self.start_ts * 1000.0)
    }

    /// Declared stop in epoch milliseconds, when valid.
    pub fn stop_ts_ms(&self) -> Option<f64> {
        self.valid.then(|| self.stop_ts * 1000.0)
    }

    /// Expected time between frames in milliseconds, when valid.
    pub fn nominal_interval_ms(&self) -> Option<f64> {
        if !self.valid {
            return None;
        }
        let span_ms = (self.stop_ts - self.start_ts) * 1000.0;
        Some(span_ms / (self.num_frames - 1) as f64)
    }

    /// Declared frame count, when valid.
    pub fn expected_frames(&self) -> Option<u64> {
        self.valid.then_some(self.num_frames)
    }
}

fn required_fields(file: &Value) -> Result<(f64, f64, u64), String> {
    let start_ts = float_field(required(file, "startTs")?, "startTs")?;
    let stop_ts = float_field(required(file, "stopTs")?, "stopTs")?;
    let num_frames = integer_field(required(file, "numFrames")?, "numFrames")?;
    let num_frames =
        u64::try_from(num_frames).map_err(|_| format!("numFrames is negative: {num_frames}"))?;
    Ok((start_ts, stop_ts, num_frames))
}

fn tz_offset(file: &Value) -> Result<i32, String> {
    match file.get("tzOffset") {
        None | Some(Value::Null) => Ok(0),
        Some(value) => {
            let offset = integer_field(value, "tzOffset")?;
            i32::try_from(offset).map_err(|_| format!("tzOffset out of range: {offset}"))
        }
    }
}

fn required<'v>(file: &'v Value, name: &str) -> Result<&'v Value, String> {
    match file.get(name) {
        None | Some(Value::Null) => Err(format!("missing field {name}")),
        Some(value) => Ok(value),
    }
}

fn float_field(value: &Value, name: &str) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|number| number.is_finite())
        .ok_or_else(|| format!("{name} is not a number: {value}"))
}

fn integer_field(value: &Value, name: &str) -> Result<i64, String> {
    let parsed = match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite())
                .map(|value| value.trunc() as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| format!("{name} is not an integer: {value}"))
}

/// Metadata for a video stream, as reported by the container.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Nominal frames per second (approximate for variable-frame-rate
    /// content).
    pub frames_per_second: f64,
    /// Estimated total number of frames, from duration and frame rate.
    pub frame_count: u64,
    /// Codec name (e.g. `"h264"`).
    pub codec: String,
}
