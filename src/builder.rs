//! # Offline index builder
//!
//! Turns an ordered list of [`AssessmentRecord`]s into a matched
//! [`FlatIndex`] + [`MetadataStore`] pair and persists it.
//!
//! ## Steps
//! 1. Reject an empty catalog and records without a name.
//! 2. Assign ids by position and regenerate every `text_for_embedding`.
//! 3. Encode all texts (in parallel, order preserved) with the [`Embedder`].
//! 4. Build the flat L2 index from the batch.
//! 5. Overwrite both artifacts (see [`save_artifacts`]).
//!
//! Any failure before step 5 aborts the build with
//! [`RecommendError::BuildFailure`] and leaves existing artifacts untouched.
//! The build is a full rebuild every time; nothing is incremental.

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::artifacts::{ArtifactPaths, save_artifacts};
use crate::embedding::Embedder;
use crate::error::{RecommendError, Result};
use crate::record::{AssessmentRecord, MetadataStore};
use crate::vector_store::FlatIndex;

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub records: usize,
    pub dimension: usize,
    pub model_id: String,
}

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} embedding [{bar:40}] {pos}/{len} ({eta})") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Build the index and metadata in memory without touching the filesystem.
///
/// # Errors
/// [`RecommendError::BuildFailure`] for an empty catalog, an unnamed record,
/// an embedding failure or a vector of the wrong length.
pub fn build_artifacts(
    records: Vec<AssessmentRecord>,
    embedder: &dyn Embedder,
) -> Result<(FlatIndex, MetadataStore)> {
    if records.is_empty() {
        return Err(RecommendError::build("no assessment records to index"));
    }
    if let Some(pos) = records.iter().position(|r| r.name.trim().is_empty()) {
        return Err(RecommendError::build(format!(
            "record at position {pos} has no name to embed"
        )));
    }

    let records: Vec<AssessmentRecord> = records
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.reindexed(i))
        .collect();

    let started = Instant::now();
    let texts: Vec<&str> = records.iter().map(|r| r.text_for_embedding.as_str()).collect();
    let embeddings: Vec<Vec<f32>> = texts
        .par_iter()
        .progress_with(progress_bar(texts.len()))
        .map(|text| embedder.embed(text))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| RecommendError::build(format!("embedding batch failed: {e}")))?;
    debug!(
        "Encoded {} texts in {:.2}s",
        embeddings.len(),
        started.elapsed().as_secs_f64()
    );

    let index = FlatIndex::from_embeddings(embedder.dimension(), &embeddings)
        .map_err(|e| RecommendError::build(format!("index construction failed: {e}")))?;
    let metadata = MetadataStore::new(records)?;
    Ok((index, metadata))
}

/// Build and persist a full index, overwriting any existing artifacts.
pub fn build_index(
    records: Vec<AssessmentRecord>,
    embedder: &dyn Embedder,
    paths: &ArtifactPaths,
) -> Result<BuildReport> {
    info!("Building index for {} records with {}", records.len(), embedder.model_id());
    let (index, metadata) = build_artifacts(records, embedder)?;
    save_artifacts(paths, &index, &metadata)?;

    Ok(BuildReport {
        records: index.len(),
        dimension: index.dimension(),
        model_id: embedder.model_id().to_string(),
    })
}

/// Read a structured catalog (JSON array of records) from disk.
pub fn read_records(path: &Path) -> Result<Vec<AssessmentRecord>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
