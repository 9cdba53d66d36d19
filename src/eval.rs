//! # Recall@k evaluation
//!
//! Labeled cases are read from a JSON Lines file, one object per line:
//!
//! ```text
//! {"query": "Java developer who collaborates with business teams", "relevant_urls": ["https://.../java-8-new/"]}
//! ```
//!
//! Lines repeating a query are merged into one case. Predictions come from
//! [`Recommender::retrieve_urls`] with an unclamped `k`. URLs are compared by
//! their last path segment, so host, scheme and trailing-slash differences
//! between the catalog and the labels do not count as misses.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{RecommendError, Result};
use crate::retriever::{Recommender, round4};

pub const DEFAULT_EVAL_K: usize = 10;

/// One labeled query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    pub query: String,
    #[serde(default)]
    pub relevant_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub query: String,
    pub relevant_urls: Vec<String>,
    pub predicted_urls: Vec<String>,
    pub hits: usize,
    pub recall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub generated_at: String,
    pub k: usize,
    pub mean_recall: f64,
    pub cases: Vec<CaseResult>,
}

impl EvalReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        info!("Wrote evaluation report to {}", path.display());
        Ok(())
    }
}

/// Parse JSON Lines cases. Blank lines are skipped.
pub fn parse_cases(content: &str) -> Result<Vec<EvalCase>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<EvalCase>(line)
                .map_err(|e| RecommendError::Config(format!("eval case on line {}: {e}", n + 1)))
        })
        .collect()
}

pub fn read_cases(path: &Path) -> Result<Vec<EvalCase>> {
    let content = std::fs::read_to_string(path)?;
    Ok(merge_cases(parse_cases(&content)?))
}

/// Merge cases that share a (trimmed) query, keeping first-seen order.
pub fn merge_cases(cases: Vec<EvalCase>) -> Vec<EvalCase> {
    let mut merged: Vec<EvalCase> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for case in cases {
        let query = case.query.trim().to_string();
        let urls = case.relevant_urls.into_iter().map(|u| u.trim().to_string());
        match positions.get(&query) {
            Some(&pos) => merged[pos].relevant_urls.extend(urls),
            None => {
                positions.insert(query.clone(), merged.len());
                merged.push(EvalCase {
                    query,
                    relevant_urls: urls.collect(),
                });
            }
        }
    }
    merged
}

/// Last non-empty path segment of `url`, lowercased.
pub fn url_slug(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.split('/')
        .rev()
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_lowercase()
}

/// Share of distinct relevant slugs found among the predictions.
///
/// Returns `(hits, recall)`; a case without relevant URLs has recall 0.
pub fn recall(predicted: &[String], relevant: &[String]) -> (usize, f64) {
    let predicted: HashSet<String> = predicted.iter().map(|u| url_slug(u)).collect();
    let relevant: HashSet<String> = relevant
        .iter()
        .map(|u| url_slug(u))
        .filter(|s| !s.is_empty())
        .collect();
    if relevant.is_empty() {
        return (0, 0.0);
    }
    let hits = relevant.intersection(&predicted).count();
    (hits, hits as f64 / relevant.len() as f64)
}

/// Run every case against `recommender` and average recall.
pub fn evaluate(recommender: &Recommender, cases: &[EvalCase], k: usize) -> Result<EvalReport> {
    let mut results = Vec::with_capacity(cases.len());
    for case in cases {
        if case.relevant_urls.is_empty() {
            warn!("Case {:?} has no relevant URLs and scores 0", case.query);
        }
        let predicted = recommender.retrieve_urls(&case.query, k)?;
        let (hits, case_recall) = recall(&predicted, &case.relevant_urls);
        results.push(CaseResult {
            query: case.query.clone(),
            relevant_urls: case.relevant_urls.clone(),
            predicted_urls: predicted,
            hits,
            recall: round4(case_recall),
        });
    }

    let mean = if results.is_empty() {
        0.0
    } else {
        results.iter().map(|r| r.recall).sum::<f64>() / results.len() as f64
    };
    info!("Mean Recall@{k} over {} queries: {:.4}", results.len(), mean);

    Ok(EvalReport {
        generated_at: Utc::now().to_rfc3339(),
        k,
        mean_recall: round4(mean),
        cases: results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{recommender_for, sample_records};

    #[test]
    fn test_url_slug() {
        assert_eq!(url_slug("https://www.shl.com/products/view/java-8-new/"), "java-8-new");
        assert_eq!(url_slug("https://other.host/solutions/Java-8-New?ref=x#top"), "java-8-new");
        assert_eq!(url_slug("https://host/"), "host");
        assert_eq!(url_slug(""), "");
    }

    #[test]
    fn test_recall_counts_distinct_relevant() {
        let predicted = vec!["https://a/view/x/".to_string(), "https://a/view/y/".to_string()];
        let relevant = vec![
            "https://b/view/x".to_string(),
            "https://b/view/x/".to_string(),
            "https://b/view/z/".to_string(),
        ];
        let (hits, r) = recall(&predicted, &relevant);
        assert_eq!(hits, 1);
        assert_eq!(r, 0.5);
        assert_eq!(recall(&predicted, &[]), (0, 0.0));
    }

    #[test]
    fn test_parse_and_merge_duplicates() {
        let content = r#"{"query": "java dev", "relevant_urls": ["https://x/a/"]}

{"query": "sales lead", "relevant_urls": ["https://x/b/"]}
{"query": " java dev ", "relevant_urls": ["https://x/c/"]}
"#;
        let cases = merge_cases(parse_cases(content).unwrap());
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].query, "java dev");
        assert_eq!(cases[0].relevant_urls, vec!["https://x/a/", "https://x/c/"]);
        assert_eq!(cases[1].query, "sales lead");
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let err = parse_cases("{\"query\": \"ok\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_evaluate_finds_exact_match() {
        let records = sample_records(12);
        let query = records[3].text_for_embedding.clone();
        let relevant = vec![records[3].url.replace("catalog.example.com", "labels.example.org")];
        let (rec, _) = recommender_for(records);

        let cases = vec![
            EvalCase {
                query,
                relevant_urls: relevant,
            },
            EvalCase {
                query: "anything".to_string(),
                relevant_urls: vec!["https://x/view/not-in-catalog/".to_string()],
            },
        ];
        let report = evaluate(&rec, &cases, DEFAULT_EVAL_K).unwrap();
        assert_eq!(report.cases[0].predicted_urls.len(), 10);
        assert_eq!(report.cases[0].recall, 1.0);
        assert_eq!(report.cases[1].recall, 0.0);
        assert_eq!(report.mean_recall, 0.5);
    }

    #[test]
    fn test_k_is_not_clamped() {
        let (rec, _) = recommender_for(sample_records(12));
        let cases = vec![EvalCase {
            query: "reasoning".to_string(),
            relevant_urls: vec![],
        }];
        assert_eq!(evaluate(&rec, &cases, 2).unwrap().cases[0].predicted_urls.len(), 2);
        assert_eq!(evaluate(&rec, &cases, 12).unwrap().cases[0].predicted_urls.len(), 12);
    }

    #[test]
    fn test_report_saves_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let (rec, _) = recommender_for(sample_records(5));
        let report = evaluate(&rec, &[], 10).unwrap();
        report.save(&path).unwrap();
        let loaded: EvalReport = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(loaded, report);
    }
}
