//! Persisted artifact pair: the binary vector index and the JSON metadata.
//!
//! The two files load independently but are only meaningful together. Writes
//! go through temporary files in the destination directories and are renamed
//! into place only after both payloads have been serialized. The previous
//! index is kept aside until the metadata rename succeeds and is put back if
//! it fails, so a failed build never leaves a mismatched pair behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{RecommendError, Result};
use crate::record::MetadataStore;
use crate::vector_store::FlatIndex;

/// Locations of the index and metadata files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    pub fn new(index: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
            metadata: metadata.into(),
        }
    }
}

/// BLAKE3 hex digest of serialized metadata.
pub fn metadata_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

fn staging_file(target: &Path) -> Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    Ok(NamedTempFile::new_in(dir)?)
}

fn restore_index(index: &Path, backup: Option<&Path>) {
    let restored = match backup {
        Some(previous) => fs::rename(previous, index),
        None if index.exists() => fs::remove_file(index),
        None => Ok(()),
    };
    if let Err(e) = restored {
        warn!("Could not restore {}: {e}", index.display());
    }
}

/// Overwrite both artifacts with a matched index/metadata pair.
///
/// # Errors
/// [`RecommendError::IndexMetadataMismatch`] if the counts differ; IO and
/// encoding errors otherwise. On failure the previous pair is left in place.
pub fn save_artifacts(paths: &ArtifactPaths, index: &FlatIndex, metadata: &MetadataStore) -> Result<()> {
    if index.len() != metadata.len() {
        return Err(RecommendError::mismatch(format!(
            "refusing to write {} vectors with {} metadata records",
            index.len(),
            metadata.len()
        )));
    }

    let metadata_bytes = metadata.to_json_bytes()?;
    let index_bytes = index.to_bytes(&metadata_digest(&metadata_bytes))?;

    let mut metadata_tmp = staging_file(&paths.metadata)?;
    let mut index_tmp = staging_file(&paths.index)?;
    metadata_tmp.write_all(&metadata_bytes)?;
    index_tmp.write_all(&index_bytes)?;

    // previous index, restored if either rename fails
    let backup = if paths.index.exists() {
        let backup = staging_file(&paths.index)?.into_temp_path();
        fs::rename(&paths.index, &backup)?;
        Some(backup)
    } else {
        None
    };

    let persisted = index_tmp
        .persist(&paths.index)
        .map_err(|e| RecommendError::Io(e.error))
        .and_then(|_| {
            metadata_tmp
                .persist(&paths.metadata)
                .map_err(|e| RecommendError::Io(e.error))
        });
    if let Err(err) = persisted {
        restore_index(&paths.index, backup.as_deref());
        return Err(err);
    }

    info!(
        "Wrote {} vectors to {} and metadata to {}",
        index.len(),
        paths.index.display(),
        paths.metadata.display()
    );
    Ok(())
}

/// Load and cross-check an artifact pair.
///
/// Differing cardinalities are fatal. A digest that does not match the
/// metadata bytes only warns, since the metadata may have been reformatted
/// without changing its content.
pub fn load_artifacts(paths: &ArtifactPaths) -> Result<(FlatIndex, MetadataStore)> {
    let (index, recorded_digest) = FlatIndex::load(&paths.index)?;
    let metadata_bytes = fs::read(&paths.metadata)?;
    let metadata = MetadataStore::from_json_bytes(&metadata_bytes)?;

    if index.len() != metadata.len() {
        return Err(RecommendError::mismatch(format!(
            "{} holds {} vectors but {} holds {} records",
            paths.index.display(),
            index.len(),
            paths.metadata.display(),
            metadata.len()
        )));
    }
    if recorded_digest != metadata_digest(&metadata_bytes) {
        warn!(
            "{} was not written together with {}; serving it because the counts agree",
            paths.metadata.display(),
            paths.index.display()
        );
    }

    info!("Loaded {} catalog entries ({} dimensions)", index.len(), index.dimension());
    Ok((index, metadata))
}
