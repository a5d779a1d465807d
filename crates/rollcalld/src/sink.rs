//! Destinations for annotated frames.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageError};
use rollcall_hw::Frame;
use std::sync::{Arc, Mutex, PoisonError};

const SNAPSHOT_JPEG_QUALITY: u8 = 80;

/// Receives every annotated frame from the capture loop.
pub trait FrameSink: Send {
    fn emit(&mut self, frame: &Frame);
}

/// Keeps only the most recent frame; readers JPEG-encode it on demand.
///
/// Clones share the same slot, so the capture loop holds one clone and the
/// service layer another.
#[derive(Clone, Default)]
pub struct SnapshotSink {
    latest: Arc<Mutex<Option<Frame>>>,
}

impl SnapshotSink {
    /// Latest frame as JPEG, or `None` before the first frame arrives.
    pub fn jpeg(&self) -> Result<Option<Vec<u8>>, ImageError> {
        let Some(frame) = self.latest() else {
            return Ok(None);
        };

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, SNAPSHOT_JPEG_QUALITY).encode(
            &frame.data,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(Some(buf))
    }

    pub fn latest(&self) -> Option<Frame> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl FrameSink for SnapshotSink {
    fn emit(&mut self, frame: &Frame) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame.clone());
    }
}
