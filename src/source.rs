//! # Query source resolution
//!
//! A query arrives either as free text or as the URL of a job description
//! page. Text wins when both are present. URLs are fetched with a hard
//! deadline, stripped of markup (scripts, styles and `noscript` blocks are
//! dropped) and whitespace is collapsed to single spaces.
//!
//! Fetch failures are reported as [`RecommendError::QueryFetchFailure`] and
//! happen before any embedding or search work. There is no retry.

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{Html, Node};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{RecommendError, Result};

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript"];

/// Where the query text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    Text(String),
    Url(String),
}

impl QuerySource {
    /// Pick the query source from optional request fields.
    ///
    /// Blank strings count as absent. Text takes priority over URL.
    ///
    /// # Errors
    /// [`RecommendError::InvalidRequest`] when neither is provided.
    pub fn from_parts(text: Option<&str>, url: Option<&str>) -> Result<Self> {
        let present = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        match (present(text), present(url)) {
            (Some(text), _) => Ok(QuerySource::Text(text)),
            (None, Some(url)) => Ok(QuerySource::Url(url)),
            (None, None) => Err(RecommendError::invalid_request(
                "Either query_text or query_url must be provided",
            )),
        }
    }
}

/// Collapse all whitespace runs to single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an HTML document.
pub fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| match a.value() {
            Node::Element(el) => SKIPPED_ELEMENTS.contains(&el.name()),
            _ => false,
        });
        if !hidden {
            parts.push(text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

/// HTTP client for job description pages.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    /// Build a fetcher whose requests (connect + body) are bounded by `timeout`.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(user_agent)
            .map_err(|e| RecommendError::Config(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RecommendError::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetch `url` and return its visible text.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        info!("Fetching query page: {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RecommendError::fetch(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| RecommendError::fetch(e.to_string()))?;
        let text = extract_visible_text(&body);
        debug!("Extracted {} characters from {url}", text.len());
        Ok(text)
    }

    /// Resolve a [`QuerySource`] to query text.
    pub async fn resolve(&self, source: &QuerySource) -> Result<String> {
        match source {
            QuerySource::Text(text) => Ok(text.clone()),
            QuerySource::Url(url) => self.fetch_text(url).await,
        }
    }
}
