//! # Flat L2 vector index
//!
//! [`FlatIndex`] stores `N` vectors of dimension `D` contiguously and answers
//! k-nearest-neighbor queries by exhaustive (exact) squared-Euclidean distance.
//! The catalog holds tens to low hundreds of entries, so exactness beats any
//! approximate structure.
//!
//! The internal id of a vector is its insertion position, which the metadata
//! store mirrors (see [`crate::record::MetadataStore::lookup`]).
//!
//! ## Persistence
//! The index is written as a bincode blob ([`FlatIndex::to_bytes`]) carrying
//! the dimension, the vectors and the BLAKE3 digest of the metadata file it
//! was written alongside. It is immutable once built; a catalog change means a
//! full rebuild.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::embedding::squared_l2;
use crate::error::{RecommendError, Result};

const FORMAT: &str = "flat-l2";
const FORMAT_VERSION: u32 = 1;

/// One search hit: vector id plus squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Exact nearest-neighbor index over fixed-dimension `f32` vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    format: String,
    version: u32,
    dimension: usize,
    count: usize,
    metadata_digest: String,
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from a batch of vectors; id `i` is `embeddings[i]`.
    ///
    /// # Errors
    /// [`RecommendError::DimensionMismatch`] if any vector is not `dimension` long.
    pub fn from_embeddings(dimension: usize, embeddings: &[Vec<f32>]) -> Result<Self> {
        if dimension == 0 {
            return Err(RecommendError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }
        let mut vectors = Vec::with_capacity(dimension * embeddings.len());
        for embedding in embeddings {
            if embedding.len() != dimension {
                return Err(RecommendError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            vectors.extend_from_slice(embedding);
        }
        Ok(Self { dimension, vectors })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        self.vectors.chunks_exact(self.dimension).nth(id)
    }

    /// The `k` stored vectors closest to `query`, nearest first.
    ///
    /// Returns `min(k, len)` hits. Equal distances keep insertion order, so
    /// identical inputs always produce identical rankings.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RecommendError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut hits: Vec<Neighbor> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, v)| Neighbor {
                id,
                distance: squared_l2(query, v),
            })
            .collect();
        // stable sort: ties stay in id order
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    /// Encode the index together with the digest of its paired metadata file.
    pub fn to_bytes(&self, metadata_digest: &str) -> Result<Vec<u8>> {
        let file = IndexFile {
            format: FORMAT.to_string(),
            version: FORMAT_VERSION,
            dimension: self.dimension,
            count: self.len(),
            metadata_digest: metadata_digest.to_string(),
            vectors: self.vectors.clone(),
        };
        Ok(bincode::serde::encode_to_vec(&file, bincode::config::standard())?)
    }

    /// Decode an index blob, returning it with the recorded metadata digest.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, String)> {
        let (file, _): (IndexFile, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        if file.format != FORMAT || file.version != FORMAT_VERSION {
            return Err(RecommendError::mismatch(format!(
                "unsupported index format {} v{}",
                file.format, file.version
            )));
        }
        if file.dimension == 0 || file.vectors.len() != file.dimension * file.count {
            return Err(RecommendError::mismatch(format!(
                "index header declares {} vectors of dimension {} but holds {} floats",
                file.count,
                file.dimension,
                file.vectors.len()
            )));
        }
        let index = Self {
            dimension: file.dimension,
            vectors: file.vectors,
        };
        Ok((index, file.metadata_digest))
    }

    /// Read an index file from disk.
    pub fn load(path: &Path) -> Result<(Self, String)> {
        debug!("Loading vector index from: {}", path.display());
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> FlatIndex {
        FlatIndex::from_embeddings(
            2,
            &[
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 3.0],
                vec![1.0, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_search_orders_by_distance() {
        let hits = index().search(&[0.9, 0.0], 4).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 3, 0, 2]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!((hits[2].distance - 0.81).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let hits = index().search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0], Neighbor { id: 1, distance: 0.0 });
        assert_eq!(hits[1], Neighbor { id: 3, distance: 0.0 });
    }

    #[test]
    fn test_nan_distance_does_not_break_ordering() {
        let index = FlatIndex::from_embeddings(2, &[vec![0.0, 0.0], vec![f32::NAN, 0.0], vec![1.0, 0.0]]).unwrap();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        let finite: Vec<usize> = hits.iter().filter(|h| !h.distance.is_nan()).map(|h| h.id).collect();
        assert_eq!(finite, vec![0, 2]);
    }

    #[test]
    fn test_k_larger_than_index_returns_everything() {
        assert_eq!(index().search(&[0.0, 0.0], 10).unwrap().len(), 4);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(matches!(
            index().search(&[0.0, 0.0, 0.0], 1),
            Err(RecommendError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(FlatIndex::from_embeddings(2, &[vec![1.0]]).is_err());
    }

    #[test]
    fn test_empty_index_has_no_hits() {
        let empty = FlatIndex::from_embeddings(3, &[]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
        assert!(empty.search(&[0.0; 3], 5).unwrap().is_empty());
    }

    #[test]
    fn test_bytes_round_trip_keeps_digest() {
        let original = index();
        let bytes = original.to_bytes("abc123").unwrap();
        let (decoded, digest) = FlatIndex::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(digest, "abc123");
        assert_eq!(decoded.vector(2), Some(&[0.0, 3.0][..]));
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        assert!(FlatIndex::from_bytes(b"not an index").is_err());
    }
}
