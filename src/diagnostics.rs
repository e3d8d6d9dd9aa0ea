//! Miss evidence.
//!
//! When a frame's overlay fails to decode, the stream processor hands the
//! offending region to a [`DiagnosticSink`]. The bundled [`PngMissWriter`]
//! saves it as `<prefix>_miss_<index>.png` so an operator can see what the
//! decoder saw. Sinks are a debugging aid only; the processor logs and
//! ignores their errors.

use std::path::{Path, PathBuf};

use crate::error::FramestampError;
use crate::overlay::DecodeFailure;

/// Receives the region of every frame whose overlay did not decode.
pub trait DiagnosticSink {
    /// Persist or inspect the failed region of frame `frame_index`.
    ///
    /// # Errors
    ///
    /// Any error is logged by the caller and does not stop decoding.
    fn record_miss(
        &mut self,
        frame_index: u64,
        failure: &DecodeFailure,
    ) -> Result<(), FramestampError>;
}

/// Writes each failed overlay region as a PNG next to the other outputs.
#[derive(Debug, Clone)]
pub struct PngMissWriter {
    prefix: PathBuf,
    written: u64,
}

impl PngMissWriter {
    /// Create a writer producing `<prefix>_miss_<index:04>.png` files.
    pub fn new<P: AsRef<Path>>(prefix: P) -> Self {
        Self {
            prefix: prefix.as_ref().to_path_buf(),
            written: 0,
        }
    }

    /// Path of the image for `frame_index`.
    pub fn path_for(&self, frame_index: u64) -> PathBuf {
        let mut name = self.prefix.as_os_str().to_os_string();
        name.push(format!("_miss_{frame_index:04}.png"));
        PathBuf::from(name)
    }

    /// Number of images written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl DiagnosticSink for PngMissWriter {
    fn record_miss(
        &mut self,
        frame_index: u64,
        failure: &DecodeFailure,
    ) -> Result<(), FramestampError> {
        let Some(region) = &failure.region else {
            log::debug!("Frame {frame_index:04} has no overlay pixels to save");
            return Ok(());
        };
        let path = self.path_for(frame_index);
        region.save(&path)?;
        self.written += 1;
        log::debug!(
            "Frame {frame_index:04} decode failed ({}) → saved overlay to '{}'",
            failure.kind,
            path.display()
        );
        Ok(())
    }
}
