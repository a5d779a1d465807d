use crate::catalog::FaceCatalog;
use crate::types::{Embedding, Recognition};

/// Conventional cutoff for 128/512-d face embeddings compared by Euclidean distance.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Strategy for resolving a probe embedding to a catalog identity.
pub trait Matcher {
    /// Distance between two embeddings under this matcher's metric.
    fn distance(&self, a: &Embedding, b: &Embedding) -> f32;

    /// Find the closest catalog entry and accept it if strictly below `threshold`.
    ///
    /// Ties keep the entry that comes first in load order.
    fn best_match(&self, catalog: &FaceCatalog, probe: &Embedding, threshold: f32) -> Recognition {
        let mut best: Option<(usize, f32)> = None;

        for (i, entry) in catalog.entries().iter().enumerate() {
            let d = self.distance(probe, &entry.embedding);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((i, d));
            }
        }

        match best {
            Some((idx, d)) if d < threshold => Recognition {
                identity: Some(catalog.entries()[idx].identity.clone()),
                distance: d,
            },
            Some((_, d)) => Recognition::unknown(d),
            None => Recognition::unknown(f32::INFINITY),
        }
    }
}

/// Euclidean distance matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn distance(&self, a: &Embedding, b: &Embedding) -> f32 {
        a.distance(b)
    }
}
