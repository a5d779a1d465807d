//! Per-frame recognition: detect, encode, match, record attendance, annotate.

use chrono::{Local, NaiveDate};
use image::imageops::{self, FilterType};
use image::RgbImage;
use rollcall_core::{
    annotate, BoundingBox, DetectorError, EncoderError, EuclideanMatcher, FaceCatalog, FaceDetector,
    FaceEncoder, Identity, Matcher, Recognition, DEFAULT_MATCH_THRESHOLD,
};
use rollcall_hw::{Frame, FrameError};
use rollcall_store::AttendanceStore;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Detection runs on a frame shrunk by this factor in each dimension.
pub const DEFAULT_DOWNSCALE: u32 = 4;

/// Identities recognized in one frame, in detection order.
pub type RecognitionBatch = Vec<Identity>;

/// Why a frame was passed through unannotated.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("bad frame buffer: {0}")]
    Frame(#[from] FrameError),
    #[error("detection failed: {0}")]
    Detector(#[from] DetectorError),
    #[error("encoding failed: {0}")]
    Encoder(#[from] EncoderError),
    #[error("recognition panicked")]
    Panicked,
}

/// A face found in the frame, in original-frame coordinates.
#[derive(Debug, Clone)]
pub struct FaceAnnotation {
    pub region: BoundingBox,
    pub recognition: Recognition,
}

/// Output of [`FrameProcessor::process`].
#[derive(Debug)]
pub struct ProcessedFrame {
    /// Annotated frame, or the untouched input if `failure` is set.
    pub frame: Frame,
    /// Every known identity seen this frame, whether or not it was newly recorded.
    pub recognized: RecognitionBatch,
    pub faces: Vec<FaceAnnotation>,
    pub failure: Option<ProcessError>,
    /// Attendance writes that failed this frame. The recognitions still count.
    pub write_failures: usize,
}

impl ProcessedFrame {
    fn passthrough(frame: Frame, failure: ProcessError) -> Self {
        Self {
            frame,
            recognized: Vec::new(),
            faces: Vec::new(),
            failure: Some(failure),
            write_failures: 0,
        }
    }
}

/// Turns raw frames into annotated frames and attendance events.
///
/// Holds no per-frame history; the only state carried across frames lives in
/// the attendance store.
pub struct FrameProcessor {
    detector: Box<dyn FaceDetector + Send>,
    encoder: Box<dyn FaceEncoder + Send>,
    matcher: EuclideanMatcher,
    catalog: Arc<FaceCatalog>,
    store: Arc<dyn AttendanceStore>,
    threshold: f32,
    downscale: u32,
}

impl FrameProcessor {
    pub fn new(
        detector: Box<dyn FaceDetector + Send>,
        encoder: Box<dyn FaceEncoder + Send>,
        catalog: Arc<FaceCatalog>,
        store: Arc<dyn AttendanceStore>,
    ) -> Self {
        Self {
            detector,
            encoder,
            matcher: EuclideanMatcher,
            catalog,
            store,
            threshold: DEFAULT_MATCH_THRESHOLD,
            downscale: DEFAULT_DOWNSCALE,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_downscale(mut self, factor: u32) -> Self {
        self.downscale = factor.max(1);
        self
    }

    /// Process a frame, dating attendance with the local calendar day.
    pub fn process(&mut self, frame: Frame) -> ProcessedFrame {
        self.process_on(frame, Local::now().date_naive())
    }

    /// Process a frame, recording attendance under `today`.
    ///
    /// Never fails: a detection or encoding error yields the input frame
    /// unchanged, an empty batch and the error in `failure`. No attendance is
    /// written for a failed frame.
    pub fn process_on(&mut self, frame: Frame, today: NaiveDate) -> ProcessedFrame {
        let recognized = panic::catch_unwind(AssertUnwindSafe(|| self.recognize(&frame)))
            .unwrap_or(Err(ProcessError::Panicked));

        let (mut image, faces) = match recognized {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(seq = frame.sequence, error = %e, "frame dropped");
                return ProcessedFrame::passthrough(frame, e);
            }
        };

        let mut batch = RecognitionBatch::new();
        let mut write_failures = 0;
        for face in &faces {
            if let Some(identity) = &face.recognition.identity {
                match self.store.record_if_absent(identity, today) {
                    Ok(true) => {}
                    Ok(false) => tracing::trace!(%identity, "already recorded today"),
                    Err(e) => {
                        write_failures += 1;
                        tracing::warn!(%identity, error = %e, "attendance not recorded");
                    }
                }
                batch.push(identity.clone());
            }
            annotate::draw_face(&mut image, &face.region, face.recognition.label());
        }

        if !faces.is_empty() {
            tracing::debug!(
                seq = frame.sequence,
                faces = faces.len(),
                recognized = batch.len(),
                "frame processed"
            );
        }

        ProcessedFrame {
            frame: frame.with_image(image),
            recognized: batch,
            faces,
            failure: None,
            write_failures,
        }
    }

    /// Detect and match every face. Side-effect free, so a failure part-way
    /// through leaves nothing behind.
    fn recognize(&mut self, frame: &Frame) -> Result<(RgbImage, Vec<FaceAnnotation>), ProcessError> {
        let image = frame.to_image()?;
        let small = shrink(&image, self.downscale);
        let sx = image.width() as f32 / small.width() as f32;
        let sy = image.height() as f32 / small.height() as f32;

        let regions = self.detector.detect(&small)?;
        let mut faces = Vec::with_capacity(regions.len());
        for region in regions {
            let embedding = self.encoder.encode(&small, &region)?;
            let recognition = self.matcher.best_match(&self.catalog, &embedding, self.threshold);
            faces.push(FaceAnnotation {
                region: region.scaled(sx, sy),
                recognition,
            });
        }
        Ok((image, faces))
    }
}

fn shrink(image: &RgbImage, factor: u32) -> RgbImage {
    if factor <= 1 {
        return image.clone();
    }
    let width = (image.width() / factor).max(1);
    let height = (image.height() / factor).max(1);
    imageops::resize(image, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use rollcall_core::Embedding;
    use rollcall_store::SqliteAttendanceStore;

    const RED: [u8; 3] = [255, 0, 0];

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn processor(
        detector: ScriptedDetector,
        encoder: impl FaceEncoder + Send + 'static,
        store: Arc<dyn AttendanceStore>,
    ) -> FrameProcessor {
        FrameProcessor::new(Box::new(detector), Box::new(encoder), alice_catalog(), store)
    }

    #[test]
    fn test_known_face_recorded_once_but_reported_every_frame() {
        let store = Arc::new(SqliteAttendanceStore::open_in_memory().unwrap());
        let detector = ScriptedDetector::new(vec![region(5.0, 5.0, 20.0, 20.0)]);
        let mut p = processor(detector, constant_encoder(vec![0.3, 0.0]), store.clone());

        let first = p.process_on(black_frame(160, 120, 1), today());
        assert!(first.failure.is_none());
        assert_eq!(first.recognized, vec![Identity::new("alice")]);
        assert_eq!(first.faces.len(), 1);
        assert_eq!(first.faces[0].recognition.label(), "alice");
        assert!((first.faces[0].recognition.distance - 0.3).abs() < 1e-6);

        // Region is scaled back to full resolution and drawn there
        assert_eq!(first.faces[0].region, region(20.0, 20.0, 80.0, 80.0));
        let image = first.frame.to_image().unwrap();
        assert_eq!(image.get_pixel(20, 20).0, RED);
        assert_eq!(image.get_pixel(150, 110).0, [0, 0, 0]);

        let second = p.process_on(black_frame(160, 120, 2), today());
        assert_eq!(second.recognized, vec![Identity::new("alice")]);

        let report = store.report(today()).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].identity.as_str(), "alice");
    }

    #[test]
    fn test_unknown_face_labelled_not_recorded() {
        let store = Arc::new(SqliteAttendanceStore::open_in_memory().unwrap());
        let detector = ScriptedDetector::new(vec![region(5.0, 5.0, 20.0, 20.0)]);
        let mut p = processor(detector, constant_encoder(vec![0.9, 0.0]), store.clone());

        let out = p.process_on(black_frame(160, 120, 1), today());
        assert!(out.failure.is_none());
        assert!(out.recognized.is_empty());
        assert_eq!(out.faces[0].recognition.label(), "Unknown");
        assert_eq!(out.frame.to_image().unwrap().get_pixel(20, 20).0, RED);
        assert!(store.report(today()).unwrap().is_empty());
    }

    #[test]
    fn test_mixed_faces_batch_only_known() {
        let store = Arc::new(SqliteAttendanceStore::open_in_memory().unwrap());
        let detector = ScriptedDetector::new(vec![
            region(0.0, 0.0, 10.0, 10.0),
            region(20.0, 0.0, 10.0, 10.0),
            region(0.0, 15.0, 10.0, 10.0),
        ]);
        let encoder = FnEncoder(|face: &BoundingBox| -> Result<Embedding, EncoderError> {
            let values = if face.x > 10.0 { vec![5.0, 5.0] } else { vec![0.1, 0.0] };
            Ok(Embedding::new(values))
        });
        let mut p = processor(detector, encoder, store.clone());

        let out = p.process_on(black_frame(160, 120, 1), today());
        let labels: Vec<&str> = out.faces.iter().map(|f| f.recognition.label()).collect();
        assert_eq!(labels, vec!["alice", "Unknown", "alice"]);
        assert_eq!(out.recognized, vec![Identity::new("alice"), Identity::new("alice")]);
        assert_eq!(store.report(today()).unwrap().len(), 1);
    }

    #[test]
    fn test_detection_failure_passes_frame_through() {
        let store = Arc::new(SqliteAttendanceStore::open_in_memory().unwrap());
        let mut p = processor(ScriptedDetector::failing(), constant_encoder(vec![0.0, 0.0]), store.clone());

        let input = black_frame(160, 120, 1);
        let out = p.process_on(input.clone(), today());
        assert!(matches!(out.failure, Some(ProcessError::Detector(_))));
        assert!(out.recognized.is_empty());
        assert_eq!(out.frame.data, input.data);
        assert!(store.report(today()).unwrap().is_empty());
    }

    #[test]
    fn test_encoder_failure_records_nothing() {
        let store = Arc::new(SqliteAttendanceStore::open_in_memory().unwrap());
        let detector = ScriptedDetector::new(vec![region(0.0, 0.0, 10.0, 10.0), region(20.0, 0.0, 10.0, 10.0)]);
        // First face matches, second one breaks the frame
        let encoder = FnEncoder(|face: &BoundingBox| -> Result<Embedding, EncoderError> {
            if face.x > 10.0 {
                Err(EncoderError::EmptyRegion)
            } else {
                Ok(Embedding::new(vec![0.0, 0.0]))
            }
        });
        let mut p = processor(detector, encoder, store.clone());

        let input = black_frame(160, 120, 1);
        let out = p.process_on(input.clone(), today());
        assert!(matches!(out.failure, Some(ProcessError::Encoder(_))));
        assert!(out.recognized.is_empty());
        assert_eq!(out.frame.data, input.data);
        assert!(store.report(today()).unwrap().is_empty());
    }

    #[test]
    fn test_panicking_encoder_is_contained() {
        let store = Arc::new(SqliteAttendanceStore::open_in_memory().unwrap());
        let detector = ScriptedDetector::new(vec![region(0.0, 0.0, 10.0, 10.0)]);
        let encoder = FnEncoder(|_: &BoundingBox| -> Result<Embedding, EncoderError> { panic!("model blew up") });
        let mut p = processor(detector, encoder, store);

        let out = p.process_on(black_frame(40, 40, 1), today());
        assert!(matches!(out.failure, Some(ProcessError::Panicked)));
        assert!(out.recognized.is_empty());
    }

    #[test]
    fn test_malformed_frame_passes_through() {
        let store = Arc::new(SqliteAttendanceStore::open_in_memory().unwrap());
        let mut p = processor(ScriptedDetector::new(Vec::new()), constant_encoder(vec![0.0, 0.0]), store);

        let mut frame = black_frame(10, 10, 1);
        frame.data.truncate(7);
        let out = p.process_on(frame, today());
        assert!(matches!(out.failure, Some(ProcessError::Frame(_))));
        assert_eq!(out.frame.data.len(), 7);
    }

    #[test]
    fn test_store_failure_still_reports_recognition() {
        let detector = ScriptedDetector::new(vec![region(5.0, 5.0, 20.0, 20.0)]);
        let mut p = processor(detector, constant_encoder(vec![0.0, 0.0]), Arc::new(FailingStore));

        let out = p.process_on(black_frame(160, 120, 1), today());
        assert!(out.failure.is_none());
        assert_eq!(out.write_failures, 1);
        assert_eq!(out.recognized, vec![Identity::new("alice")]);
    }

    #[test]
    fn test_detection_runs_on_downscaled_frame() {
        let store = Arc::new(SqliteAttendanceStore::open_in_memory().unwrap());
        let detector = ScriptedDetector::new(Vec::new());
        let seen = Arc::clone(&detector.seen_sizes);
        let mut p = processor(detector, constant_encoder(vec![0.0, 0.0]), store.clone());

        p.process_on(black_frame(640, 480, 1), today());
        let mut p = processor(
            ScriptedDetector { seen_sizes: Arc::clone(&seen), ..ScriptedDetector::new(Vec::new()) },
            constant_encoder(vec![0.0, 0.0]),
            store,
        )
        .with_downscale(2);
        p.process_on(black_frame(640, 480, 2), today());

        assert_eq!(*seen.lock().unwrap(), vec![(160, 120), (320, 240)]);
    }

    #[test]
    fn test_no_faces_leaves_frame_untouched() {
        let store = Arc::new(SqliteAttendanceStore::open_in_memory().unwrap());
        let mut p = processor(ScriptedDetector::new(Vec::new()), constant_encoder(vec![0.0, 0.0]), store);

        let input = black_frame(64, 48, 3);
        let out = p.process_on(input.clone(), today());
        assert!(out.failure.is_none());
        assert!(out.faces.is_empty());
        assert_eq!(out.frame.data, input.data);
        assert_eq!(out.frame.sequence, 3);
    }

    #[test]
    fn test_regions_map_back_with_actual_shrink_ratio() {
        let store = Arc::new(SqliteAttendanceStore::open_in_memory().unwrap());

        // 150 / 4 truncates to 37, so the true ratio is 150 / 37
        let detector = ScriptedDetector::new(vec![region(0.0, 0.0, 37.0, 37.0)]);
        let mut p = processor(detector, constant_encoder(vec![0.0, 0.0]), store.clone());
        let out = p.process_on(black_frame(150, 150, 1), today());
        let face = &out.faces[0].region;
        assert!((face.width - 150.0).abs() < 1e-3);
        assert!((face.right() - 150.0).abs() < 1e-3);

        // Frames smaller than the factor shrink to 1x1 and map back to the whole frame
        let detector = ScriptedDetector::new(vec![region(0.0, 0.0, 1.0, 1.0)]);
        let mut p = processor(detector, constant_encoder(vec![0.0, 0.0]), store);
        let out = p.process_on(black_frame(3, 2, 2), today());
        let face = &out.faces[0].region;
        assert!((face.width - 3.0).abs() < 1e-6);
        assert!((face.height - 2.0).abs() < 1e-6);
    }
}
