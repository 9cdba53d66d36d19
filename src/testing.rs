//! Test doubles shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::builder::build_artifacts;
use crate::embedding::Embedder;
use crate::error::{RecommendError, Result};
use crate::record::AssessmentRecord;
use crate::retriever::Recommender;

/// Deterministic bag-of-words embedder: each token adds ±1 to a hashed bucket.
pub struct HashEmbedder {
    dimension: usize,
    calls: AtomicUsize,
    fail_on: Option<String>,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    /// Fails whenever the input contains `needle`.
    pub fn failing_on(dimension: usize, needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::new(dimension)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        "test/hash-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = &self.fail_on {
            if text.contains(needle.as_str()) {
                return Err(RecommendError::embedding(format!("refusing to embed {needle}")));
            }
        }
        let mut v = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = blake3::hash(token.to_lowercase().as_bytes());
            let bytes = hash.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dimension;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        Ok(v)
    }
}

const NAMES: &[(&str, &str, &str)] = &[
    ("Account Manager Solution", "Sales account management and client relationships", "C"),
    ("Accounts Payable Simulation", "Invoices, vendor payments and bookkeeping accuracy", "S"),
    ("Java 8 (New)", "Core Java programming, collections and streams", "K"),
    ("Python (New)", "Python scripting, data structures and libraries", "K"),
    ("Verify Numerical Reasoning", "Interpreting numerical data in charts and tables", "A"),
    ("Verify Verbal Reasoning", "Reading comprehension and verbal logic", "A"),
    ("OPQ32r", "Occupational personality questionnaire for workplace behaviour", "P"),
    ("Customer Service Phone Simulation", "Handling calls, empathy and problem resolution", "S"),
    ("SQL Server (New)", "Relational queries, joins and indexing", "K"),
    ("Graduate Scenarios", "Situational judgement for graduate hires", "B"),
    ("Financial Accounting", "Ledgers, balance sheets and reconciliations", "K"),
    ("Leadership Report", "Leadership potential and management style", "P"),
];

/// Up to twelve distinct catalog records, ids assigned by position.
pub fn sample_records(n: usize) -> Vec<AssessmentRecord> {
    NAMES
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, (name, description, test_type))| {
            let slug = name
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("-");
            AssessmentRecord::new(
                i,
                *name,
                format!("https://catalog.example.com/products/view/{slug}/"),
                *description,
                vec!["Entry-Level".to_string(), "Graduate".to_string()],
                *test_type,
                Some(10 + i as u32 * 5),
            )
        })
        .collect()
}

/// In-memory recommender over `records`, plus a handle on its embedder.
pub fn recommender_for(records: Vec<AssessmentRecord>) -> (Arc<Recommender>, Arc<HashEmbedder>) {
    let embedder = Arc::new(HashEmbedder::new(32));
    let (index, metadata) = build_artifacts(records, embedder.as_ref()).expect("test build");
    let recommender = Recommender::new(embedder.clone(), index, metadata).expect("test recommender");
    (Arc::new(recommender), embedder)
}
