use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a known person, taken from the reference image's file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Axis-aligned face region in pixel coordinates of the image it was detected in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Map a region found in a downscaled image back to the source resolution.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
            confidence: self.confidence,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Fixed-length face embedding (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance between two embeddings. Lower = more similar.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Outcome of matching one detected face against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    /// Matched identity, or `None` when the face is unknown.
    pub identity: Option<Identity>,
    /// Distance to the closest catalog entry (`f32::INFINITY` for an empty catalog).
    pub distance: f32,
}

impl Recognition {
    pub const UNKNOWN_LABEL: &'static str = "Unknown";

    pub fn unknown(distance: f32) -> Self {
        Self {
            identity: None,
            distance,
        }
    }

    pub fn is_known(&self) -> bool {
        self.identity.is_some()
    }

    /// Text drawn next to the face.
    pub fn label(&self) -> &str {
        self.identity
            .as_ref()
            .map(Identity::as_str)
            .unwrap_or(Self::UNKNOWN_LABEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical() {
        let a = Embedding::new(vec![0.3, 0.4, 0.5]);
        assert!(a.distance(&a).abs() < 1e-6);
    }

    #[test]
    fn test_distance_pythagorean() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = Embedding::new(vec![1.0, -2.0, 0.5]);
        let b = Embedding::new(vec![-0.5, 1.0, 2.0]);
        assert!((a.distance(&b) - b.distance(&a)).abs() < 1e-6);
    }

    #[test]
    fn test_bbox_scaled_keeps_confidence() {
        let b = BoundingBox { x: 10.0, y: 20.0, width: 30.0, height: 40.0, confidence: 0.8 };
        let s = b.scaled(4.0, 4.0);
        assert_eq!((s.x, s.y, s.width, s.height), (40.0, 80.0, 120.0, 160.0));
        assert_eq!(s.confidence, 0.8);
        assert_eq!(s.right(), 160.0);
        assert_eq!(s.bottom(), 240.0);
    }

    #[test]
    fn test_bbox_scaled_per_axis() {
        let b = BoundingBox { x: 1.0, y: 1.0, width: 10.0, height: 10.0, confidence: 0.5 };
        let s = b.scaled(2.0, 3.0);
        assert_eq!((s.x, s.y, s.width, s.height), (2.0, 3.0, 20.0, 30.0));
    }

    #[test]
    fn test_recognition_labels() {
        let known = Recognition { identity: Some("alice".into()), distance: 0.3 };
        assert!(known.is_known());
        assert_eq!(known.label(), "alice");

        let unknown = Recognition::unknown(0.9);
        assert!(!unknown.is_known());
        assert_eq!(unknown.label(), "Unknown");
    }

    #[test]
    fn test_identity_display() {
        let id = Identity::new("bob");
        assert_eq!(id.to_string(), "bob");
        assert_eq!(id.as_str(), "bob");
    }
}
