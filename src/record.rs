//! # Assessment records and the metadata store
//!
//! An [`AssessmentRecord`] is one catalog entry. Its `id` is its position in
//! the [`MetadataStore`], which is also the internal id of its vector in the
//! [`FlatIndex`](crate::vector_store::FlatIndex). That positional coupling is
//! the join key between search hits and record fields, so it is kept behind
//! [`MetadataStore::lookup`] instead of raw slice indexing.
//!
//! `text_for_embedding` is derived from the other fields by
//! [`compose_embedding_text`] and must be regenerated whenever a record is
//! rebuilt; the builder never trusts a stored value.

use serde::{Deserialize, Serialize};

use crate::error::{RecommendError, Result};

/// One catalogued assessment product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    /// Position in the metadata sequence (0-based) and vector id in the index.
    #[serde(default)]
    pub id: usize,
    /// Display name.
    pub name: String,
    /// Canonical source URL.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub job_levels: Vec<String>,
    /// Short type code (e.g. `K`, `P`), possibly empty.
    #[serde(default)]
    pub test_type: String,
    /// Approximate completion time, absent when the page did not state one.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Sole input to the embedding model for this record.
    #[serde(default)]
    pub text_for_embedding: String,
}

impl AssessmentRecord {
    /// Build a record and derive its embedding text.
    pub fn new(
        id: usize,
        name: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
        job_levels: Vec<String>,
        test_type: impl Into<String>,
        duration_minutes: Option<u32>,
    ) -> Self {
        let mut record = Self {
            id,
            name: name.into(),
            url: url.into(),
            description: description.into(),
            job_levels,
            test_type: test_type.into(),
            duration_minutes,
            text_for_embedding: String::new(),
        };
        record.refresh_embedding_text();
        record
    }

    /// Reassign the positional id and regenerate `text_for_embedding`.
    ///
    /// Both always change together: a rebuilt record never keeps a stale text.
    pub fn reindexed(mut self, id: usize) -> Self {
        self.id = id;
        self.refresh_embedding_text();
        self
    }

    fn refresh_embedding_text(&mut self) {
        self.text_for_embedding = compose_embedding_text(
            &self.name,
            &self.description,
            &self.job_levels,
            &self.test_type,
            self.duration_minutes,
        );
    }

    /// Job levels joined for display, `"N/A"` when there are none.
    pub fn job_levels_display(&self) -> String {
        if self.job_levels.is_empty() {
            "N/A".to_string()
        } else {
            self.job_levels.join(", ")
        }
    }
}

/// Deterministically concatenate record fields into the embedding input.
///
/// A missing duration leaves the value blank; the labels are always present so
/// that identical fields always produce byte-identical text.
pub fn compose_embedding_text(
    name: &str,
    description: &str,
    job_levels: &[String],
    test_type: &str,
    duration_minutes: Option<u32>,
) -> String {
    let duration = duration_minutes.map(|d| d.to_string()).unwrap_or_default();
    format!(
        "Assessment Name: {}\nDescription: {}\nJob Levels: {}\nTest Type: {}\nDuration: {} minutes",
        name.trim(),
        description.trim(),
        job_levels.join(", "),
        test_type.trim(),
        duration,
    )
}

/// Ordered, immutable sequence of records aligned with the vector index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    records: Vec<AssessmentRecord>,
}

impl MetadataStore {
    /// Wrap an ordered record list.
    ///
    /// # Errors
    /// [`RecommendError::IndexMetadataMismatch`] if any record's `id` differs
    /// from its position.
    pub fn new(records: Vec<AssessmentRecord>) -> Result<Self> {
        if let Some((pos, record)) = records.iter().enumerate().find(|(i, r)| r.id != *i) {
            return Err(RecommendError::mismatch(format!(
                "record at position {pos} carries id {}",
                record.id
            )));
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AssessmentRecord] {
        &self.records
    }

    /// Resolve an index id to its record.
    ///
    /// An out-of-range id means the index and metadata were not built together,
    /// so it is reported as a mismatch rather than skipped.
    pub fn lookup(&self, id: usize) -> Result<&AssessmentRecord> {
        self.records.get(id).ok_or_else(|| {
            RecommendError::mismatch(format!(
                "index returned id {id} but metadata holds {} records",
                self.records.len()
            ))
        })
    }

    /// Pretty JSON array, one object per record, in id order.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.records)?)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let records: Vec<AssessmentRecord> = serde_json::from_slice(bytes)?;
        Self::new(records)
    }
}
