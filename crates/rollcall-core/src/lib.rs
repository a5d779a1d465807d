//! rollcall-core — Face catalog, matching and the recognition capabilities.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime for CPU inference. The pipeline only depends on
//! the [`FaceDetector`] and [`FaceEncoder`] traits, so either model can be
//! swapped out (or faked in tests).

pub mod annotate;
pub mod catalog;
pub mod detector;
pub mod encoder;
pub mod matcher;
pub mod types;

use std::path::PathBuf;

pub use catalog::{CatalogEntry, CatalogError, FaceCatalog};
pub use detector::{DetectorError, FaceDetector, ScrfdDetector};
pub use encoder::{ArcFaceEncoder, EncoderError, FaceEncoder};
pub use matcher::{EuclideanMatcher, Matcher, DEFAULT_MATCH_THRESHOLD};
pub use types::{BoundingBox, Embedding, Identity, Recognition};

/// SCRFD detection model file name inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";

/// ArcFace recognition model file name inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// System-wide install path of the ONNX model files.
pub const DEFAULT_MODEL_DIR: &str = "/usr/share/rollcall/models";

/// Default location of the ONNX model files.
///
/// `ROLLCALL_MODEL_DIR` wins when set; otherwise [`DEFAULT_MODEL_DIR`].
pub fn default_model_dir() -> PathBuf {
    std::env::var("ROLLCALL_MODEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_DIR))
}
