//! # Assessment recommender (library root)
//!
//! Semantic search over a catalog of assessment products. Each catalog entry
//! is embedded once, offline, with a sentence-embedding model; queries (free
//! text or a job description URL) are embedded with the same model and matched
//! by exact nearest-neighbor search under L2 distance.
//!
//! - Catalog data: [`record`], [`catalog`].
//! - Offline build: [`embedding`], [`vector_store`], [`artifacts`], [`builder`].
//! - Online queries: [`retriever`], [`source`], [`service`], [`server`].
//! - Quality measurement: [`eval`].
//! - CLI plumbing: [`commands`], [`config`], [`pretty`].
//!
//! ## Artifacts
//! A build writes two files that are only valid as a pair: a binary flat index
//! (`catalog.index`) and a JSON array of records (`catalog_metadata.json`).
//! Array position `i` is vector id `i`.

use directories::ProjectDirs;
use std::error::Error;

pub mod artifacts;
pub mod builder;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod pretty;
pub mod record;
pub mod retriever;
pub mod server;
pub mod service;
pub mod source;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{RecommendError, Result};

/// Return the per-platform configuration directory for `arec`.
///
/// The directory is **not** created by this function.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be determined.
pub fn config_dir() -> std::result::Result<std::path::PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("com", "assessment-recommender", "arec")
        .ok_or("Unable to determine config directory")?;
    Ok(proj_dirs.config_dir().to_path_buf())
}
