//! In-process fakes for the recognition capabilities.

use crate::sink::FrameSink;
use chrono::NaiveDate;
use image::{Rgb, RgbImage};
use rollcall_core::catalog::CatalogEntry;
use rollcall_core::{
    BoundingBox, DetectorError, Embedding, EncoderError, FaceCatalog, FaceDetector, FaceEncoder, Identity,
};
use rollcall_hw::{CameraError, Frame, FrameSource};
use rollcall_store::{AttendanceRecord, AttendanceStore, StoreError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub fn region(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
    BoundingBox { x, y, width: w, height: h, confidence: 0.9 }
}

pub fn black_frame(width: u32, height: u32, sequence: u32) -> Frame {
    Frame::from_image(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])), sequence)
}

/// Catalog holding a single "alice" at the origin of a 2-d embedding space.
pub fn alice_catalog() -> Arc<FaceCatalog> {
    Arc::new(FaceCatalog::from_entries(vec![CatalogEntry {
        identity: Identity::new("alice"),
        embedding: Embedding::new(vec![0.0, 0.0]),
    }]))
}

/// Returns the same regions for every image, or fails every call.
pub struct ScriptedDetector {
    pub regions: Vec<BoundingBox>,
    pub fail: bool,
    pub seen_sizes: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl ScriptedDetector {
    pub fn new(regions: Vec<BoundingBox>) -> Self {
        Self {
            regions,
            fail: false,
            seen_sizes: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        self.seen_sizes.lock().unwrap().push(image.dimensions());
        if self.fail {
            return Err(DetectorError::InferenceFailed("scripted failure".into()));
        }
        Ok(self.regions.clone())
    }
}

/// Encoder driven by a closure over the region.
pub struct FnEncoder<F>(pub F);

impl<F> FaceEncoder for FnEncoder<F>
where
    F: FnMut(&BoundingBox) -> Result<Embedding, EncoderError>,
{
    fn encode(&mut self, _image: &RgbImage, face: &BoundingBox) -> Result<Embedding, EncoderError> {
        (self.0)(face)
    }
}

/// Every face encodes to `values`.
pub fn constant_encoder(values: Vec<f32>) -> FnEncoder<impl FnMut(&BoundingBox) -> Result<Embedding, EncoderError> + Send> {
    FnEncoder(move |_: &BoundingBox| Ok(Embedding::new(values.clone())))
}

/// Store whose every operation fails.
pub struct FailingStore;

impl AttendanceStore for FailingStore {
    fn record_if_absent(&self, _identity: &Identity, _date: NaiveDate) -> Result<bool, StoreError> {
        Err(StoreError::Write(rusqlite::Error::InvalidQuery))
    }

    fn report(&self, _date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        Err(StoreError::Read(rusqlite::Error::InvalidQuery))
    }
}

/// Plays back a fixed list of frames, then optionally repeats one forever.
pub struct VecSource {
    frames: VecDeque<Frame>,
    repeat: Option<Frame>,
    pub closed: Arc<AtomicBool>,
}

impl VecSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            repeat: None,
            closed: Arc::default(),
        }
    }

    pub fn endless(frame: Frame) -> Self {
        Self {
            repeat: Some(frame),
            ..Self::new(Vec::new())
        }
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }
        if let Some(frame) = &self.repeat {
            std::thread::sleep(std::time::Duration::from_millis(1));
            return Ok(Some(frame.clone()));
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Source that errors on the first read.
pub struct BrokenSource {
    pub closed: Arc<AtomicBool>,
}

impl FrameSource for BrokenSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        Err(CameraError::CaptureFailed("unplugged".into()))
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Keeps every emitted frame.
#[derive(Clone, Default)]
pub struct CollectingSink {
    pub frames: Arc<Mutex<Vec<Frame>>>,
}

impl FrameSink for CollectingSink {
    fn emit(&mut self, frame: &Frame) {
        self.frames.lock().unwrap().push(frame.clone());
    }
}
