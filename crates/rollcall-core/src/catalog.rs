//! Reference catalog of known faces, built once from a directory of images.

use crate::detector::FaceDetector;
use crate::encoder::FaceEncoder;
use crate::types::{Embedding, Identity};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read catalog directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A reference image that was skipped. Never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogWarning {
    #[error("no face found in {0}")]
    NoFace(PathBuf),
    #[error("cannot decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("cannot extract a face from {path}: {reason}")]
    Extract { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub identity: Identity,
    pub embedding: Embedding,
}

/// Immutable set of known (identity, embedding) pairs, in load order.
///
/// Nothing mutates a catalog after construction, so it is shared between
/// threads behind a plain `Arc`.
#[derive(Debug, Clone, Default)]
pub struct FaceCatalog {
    entries: Vec<CatalogEntry>,
    warnings: Vec<CatalogWarning>,
}

impl FaceCatalog {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries,
            warnings: Vec::new(),
        }
    }

    /// Build the catalog from every supported image in `dir`.
    ///
    /// Each image contributes at most one entry: the most confident face,
    /// named after the file stem. Files are visited in name order. The
    /// directory is created if it does not exist yet.
    pub fn load(
        dir: &Path,
        detector: &mut dyn FaceDetector,
        encoder: &mut dyn FaceEncoder,
    ) -> Result<Self, CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(dir).map_err(io_err)?;

        let dirents = std::fs::read_dir(dir).map_err(io_err)?;
        let paths = image_paths(dir, dirents.map(|d| d.map(|d| d.path())));

        let mut catalog = Self::default();
        for path in paths {
            match load_entry(&path, detector, encoder) {
                Ok(entry) => {
                    tracing::info!(identity = %entry.identity, file = %path.display(), "loaded face");
                    catalog.entries.push(entry);
                }
                Err(warning) => {
                    tracing::warn!(%warning, "skipping catalog image");
                    catalog.warnings.push(warning);
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            entries = catalog.entries.len(),
            skipped = catalog.warnings.len(),
            "face catalog loaded"
        );
        Ok(catalog)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Images skipped while loading.
    pub fn warnings(&self) -> &[CatalogWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Supported image files among `dirents`, sorted. Unreadable entries are skipped.
fn image_paths(dir: &Path, dirents: impl IntoIterator<Item = std::io::Result<PathBuf>>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for dirent in dirents {
        match dirent {
            Ok(path) if path.is_file() && is_supported(&path) => paths.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable catalog entry"),
        }
    }
    paths.sort();
    paths
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

fn load_entry(
    path: &Path,
    detector: &mut dyn FaceDetector,
    encoder: &mut dyn FaceEncoder,
) -> Result<CatalogEntry, CatalogWarning> {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let image = image::open(path)
        .map_err(|e| CatalogWarning::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
        .into_rgb8();

    let extract_err = |reason: String| CatalogWarning::Extract {
        path: path.to_path_buf(),
        reason,
    };

    let faces = detector.detect(&image).map_err(|e| extract_err(e.to_string()))?;
    let face = faces
        .first()
        .ok_or_else(|| CatalogWarning::NoFace(path.to_path_buf()))?;
    let embedding = encoder
        .encode(&image, face)
        .map_err(|e| extract_err(e.to_string()))?;

    Ok(CatalogEntry {
        identity: Identity::new(name),
        embedding,
    })
}
