//! Error types shared by the offline builder and the online query pipeline.

use thiserror::Error;

/// Errors raised by the recommender library.
///
/// The first four variants are the kinds callers are expected to tell apart:
/// bad input, an unreachable query page, corrupted artifacts, and a failed
/// offline build. The rest are plumbing failures that surface as internal
/// errors.
#[derive(Debug, Error)]
pub enum RecommendError {
    /// Neither query text nor query URL was supplied.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The query URL could not be fetched or parsed.
    #[error("Failed to fetch URL: {0}")]
    QueryFetchFailure(String),

    /// Index and metadata disagree (cardinality, ordering or an out-of-range id).
    #[error("Index/metadata mismatch: {0}")]
    IndexMetadataMismatch(String),

    /// The offline build aborted before any artifact was written.
    #[error("Build failed: {0}")]
    BuildFailure(String),

    /// Embedding generation error
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Model loading error
    #[error("Model error: {0}")]
    Model(String),

    /// A vector did not have the index dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Index serialization error (bincode)
    #[error("Index encode error: {0}")]
    IndexEncode(#[from] bincode::error::EncodeError),

    /// Index deserialization error (bincode)
    #[error("Index decode error: {0}")]
    IndexDecode(#[from] bincode::error::DecodeError),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),
}

impl RecommendError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::QueryFetchFailure(msg.into())
    }

    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::IndexMetadataMismatch(msg.into())
    }

    pub fn build(msg: impl Into<String>) -> Self {
        Self::BuildFailure(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::QueryFetchFailure(_))
    }
}

/// Result type for recommender operations
pub type Result<T> = std::result::Result<T, RecommendError>;
