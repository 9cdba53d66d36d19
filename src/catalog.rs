//! # Catalog page parser
//!
//! Turns raw scraped catalog pages (`{name, url, content}` where `content` is
//! the page as markdown) into [`AssessmentRecord`]s.
//!
//! Extraction is **best-effort**. Each field has its own extractor returning an
//! `Option`; a miss becomes an empty string, an empty list or `null` in the
//! record and never fails the whole page. The guarantees at this boundary are:
//!
//! | Field | Source | On miss |
//! |-------|--------|---------|
//! | `description` | text between `#### Description` and the next `####` heading | `""` |
//! | `job_levels` | `#### Job levels` section, comma separated, trimmed, blanks dropped | `[]` |
//! | `duration_minutes` | `Approximate Completion Time in minutes = N` | `null` |
//! | `test_type` | uppercase code on the line after `Test Type:` | `""` |
//! | `name` | the page record's `name`, else derived from the URL slug | `""` |

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::record::AssessmentRecord;

static DESCRIPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)#### Description\s+(.*?)\n\n####").expect("valid regex"));
static JOB_LEVELS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)#### Job levels\s+(.*?)\n\n####").expect("valid regex"));
static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)Approximate Completion Time in minutes\s*=\s*(\d+)").expect("valid regex")
});
static TEST_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Test Type:\s*\n\s*([A-Z]+)").expect("valid regex"));

/// A catalog page as produced by the scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAssessment {
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

pub fn extract_description(content: &str) -> Option<String> {
    capture(&DESCRIPTION_RE, content).map(str::to_string)
}

pub fn extract_job_levels(content: &str) -> Option<Vec<String>> {
    let raw = capture(&JOB_LEVELS_RE, content)?;
    let levels: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!levels.is_empty()).then_some(levels)
}

/// Minutes are only accepted when they parse as a non-negative integer.
pub fn extract_duration(content: &str) -> Option<u32> {
    capture(&DURATION_RE, content).and_then(|d| d.parse().ok())
}

pub fn extract_test_type(content: &str) -> Option<String> {
    capture(&TEST_TYPE_RE, content).map(str::to_string)
}

/// Title-cased name from a catalog URL's final path segment.
///
/// `https://host/products/product-catalog/view/account-manager-solution/`
/// becomes `Account Manager Solution`.
pub fn name_from_url(url: &str) -> Option<String> {
    let slug = url.trim_end_matches('/').rsplit('/').next()?;
    if slug.is_empty() || slug.contains(':') {
        return None;
    }
    let words: Vec<String> = slug
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

/// Parse one page into a record at position `id`.
pub fn parse_assessment(raw: &RawAssessment, id: usize) -> AssessmentRecord {
    let content = raw.content.as_str();
    let name = if raw.name.trim().is_empty() {
        name_from_url(&raw.url).unwrap_or_default()
    } else {
        raw.name.trim().to_string()
    };

    AssessmentRecord::new(
        id,
        name,
        raw.url.clone(),
        extract_description(content).unwrap_or_default(),
        extract_job_levels(content).unwrap_or_default(),
        extract_test_type(content).unwrap_or_default(),
        extract_duration(content),
    )
}

/// Parse a whole scrape, assigning ids by position.
pub fn parse_catalog(pages: &[RawAssessment]) -> Vec<AssessmentRecord> {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| parse_assessment(page, i))
        .collect()
}

/// Structure a raw scrape file (JSON array of pages) into `output`.
pub fn structure_file(input: &Path, output: &Path) -> Result<usize> {
    let pages: Vec<RawAssessment> = serde_json::from_slice(&fs::read(input)?)?;
    let records = parse_catalog(&pages);
    let unnamed = records.iter().filter(|r| r.name.is_empty()).count();
    if unnamed > 0 {
        warn!("{unnamed} pages have no name and no usable URL slug");
    }
    fs::write(output, serde_json::to_vec_pretty(&records)?)?;
    info!("Structured {} assessments into {}", records.len(), output.display());
    Ok(records.len())
}
