//! # Query-time retrieval
//!
//! [`Recommender`] owns the three assets loaded at service start (embedding
//! model, flat index, metadata store) and answers queries against them. It is
//! constructed once and shared behind an `Arc`; nothing in it is mutated after
//! construction except the poison flag described below.
//!
//! ## Query pipeline
//! 1. Encode the query with the same embedder used to build the index.
//! 2. Exact k-NN search under squared L2 distance.
//! 3. Join each hit to its record through [`MetadataStore::lookup`].
//!
//! An id without a record means the artifacts are not a matched pair. That is
//! fatal: the recommender marks itself poisoned and rejects every later query
//! instead of serving partial results.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error};

use crate::artifacts::{ArtifactPaths, load_artifacts};
use crate::embedding::Embedder;
use crate::error::{RecommendError, Result};
use crate::record::{AssessmentRecord, MetadataStore};
use crate::vector_store::FlatIndex;

/// Smallest result count a caller can receive.
pub const MIN_TOP_K: usize = 5;
/// Largest result count a caller can receive.
pub const MAX_TOP_K: usize = 10;

/// Clamp a requested result count to the business range `[5, 10]`.
pub fn clamp_top_k(requested: i64) -> usize {
    requested.clamp(MIN_TOP_K as i64, MAX_TOP_K as i64) as usize
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub record: AssessmentRecord,
    /// Squared L2 distance to the query; lower is closer.
    pub distance: f32,
}

impl QueryResult {
    /// Distance rounded to four decimals, for display only.
    pub fn display_score(&self) -> f64 {
        round4(self.distance as f64)
    }
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Loaded embedder + index + metadata, shared read-only across queries.
pub struct Recommender {
    embedder: Arc<dyn Embedder>,
    index: FlatIndex,
    metadata: MetadataStore,
    poisoned: AtomicBool,
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("model_id", &self.embedder.model_id())
            .field("entries", &self.index.len())
            .field("dimension", &self.index.dimension())
            .finish()
    }
}

impl Recommender {
    /// Assemble a recommender from already-loaded assets.
    ///
    /// # Errors
    /// [`RecommendError::IndexMetadataMismatch`] if the index and metadata
    /// differ in length; [`RecommendError::DimensionMismatch`] if the embedder
    /// does not produce vectors of the index dimension.
    pub fn new(embedder: Arc<dyn Embedder>, index: FlatIndex, metadata: MetadataStore) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(RecommendError::mismatch(format!(
                "index holds {} vectors but metadata holds {} records",
                index.len(),
                metadata.len()
            )));
        }
        if embedder.dimension() != index.dimension() {
            return Err(RecommendError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimension(),
            });
        }
        Ok(Self {
            embedder,
            index,
            metadata,
            poisoned: AtomicBool::new(false),
        })
    }

    /// Load both artifacts from disk and pair them with `embedder`.
    pub fn open(paths: &ArtifactPaths, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let (index, metadata) = load_artifacts(paths)?;
        Self::new(embedder, index, metadata)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// Ranked results for `query`, with the result count clamped to `[5, 10]`.
    pub fn search(&self, query: &str, top_k: i64) -> Result<Vec<QueryResult>> {
        self.nearest(query, clamp_top_k(top_k))
    }

    /// Ranked results for exactly `k` neighbors (or all entries if fewer).
    pub fn nearest(&self, query: &str, k: usize) -> Result<Vec<QueryResult>> {
        if self.is_poisoned() {
            return Err(RecommendError::mismatch(
                "artifacts failed a consistency check earlier; refusing to serve",
            ));
        }

        let started = Instant::now();
        let vector = self.embedder.embed(query)?;
        let hits = self.index.search(&vector, k)?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let record = match self.metadata.lookup(hit.id) {
                Ok(record) => record,
                Err(err) => {
                    error!("{err}");
                    self.poisoned.store(true, Ordering::SeqCst);
                    return Err(err);
                }
            };
            results.push(QueryResult {
                record: record.clone(),
                distance: hit.distance,
            });
        }

        debug!(
            "Retrieved {} results in {:.1}ms",
            results.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(results)
    }

    /// Source URLs of the `k` nearest records, nearest first.
    pub fn retrieve_urls(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .nearest(query, k)?
            .into_iter()
            .map(|r| r.record.url)
            .collect())
    }
}
