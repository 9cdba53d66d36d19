//! # The `recommend` operation
//!
//! [`RecommendService`] is the context object every caller (HTTP handler, CLI)
//! goes through. It holds the page fetcher, the response options and a
//! one-shot cell for the loaded [`Recommender`]. The cell moves from empty to
//! loaded exactly once; a failed load leaves it empty so the next request
//! tries again.
//!
//! Request flow:
//! 1. Pick the query source; reject requests with neither field.
//! 2. Clamp `top_k` to `[5, 10]`.
//! 3. Resolve the source to text (fetching the URL if needed).
//! 4. Load assets on first use.
//! 5. Encode and search on the blocking pool, then shape the rows.
//!
//! Steps 1 and 3 run before any asset is touched, so bad input and dead URLs
//! never cost a model load or a search.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::RecommenderConfig;
use crate::embedding::SentenceEmbeddingsModel;
use crate::error::{RecommendError, Result};
use crate::retriever::{QueryResult, Recommender, clamp_top_k};
use crate::source::{PageFetcher, QuerySource};

fn default_top_k() -> i64 {
    5
}

/// Body of a recommendation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub query_url: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

impl RecommendRequest {
    pub fn text(query: impl Into<String>, top_k: i64) -> Self {
        Self {
            query_text: Some(query.into()),
            query_url: None,
            top_k,
        }
    }

    pub fn url(url: impl Into<String>, top_k: i64) -> Self {
        Self {
            query_text: None,
            query_url: Some(url.into()),
            top_k,
        }
    }
}

/// Duration column: minutes, or `"N/A"` when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationCell {
    Minutes(u32),
    Missing(String),
}

impl From<Option<u32>> for DurationCell {
    fn from(minutes: Option<u32>) -> Self {
        match minutes {
            Some(m) if m > 0 => DurationCell::Minutes(m),
            _ => DurationCell::Missing("N/A".to_string()),
        }
    }
}

/// One row of the response table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(rename = "Assessment Name")]
    pub name: String,
    #[serde(rename = "Test Type")]
    pub test_type: String,
    #[serde(rename = "Job Levels")]
    pub job_levels: String,
    #[serde(rename = "Duration (min)")]
    pub duration: DurationCell,
    /// Squared L2 distance, four decimals. Lower is a closer match.
    #[serde(rename = "Score")]
    pub score: f64,
}

impl From<&QueryResult> for TableRow {
    fn from(result: &QueryResult) -> Self {
        let record = &result.record;
        Self {
            name: record.name.clone(),
            test_type: record.test_type.clone(),
            job_levels: record.job_levels_display(),
            duration: record.duration_minutes.into(),
            score: result.display_score(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub results_count: usize,
    pub table: Vec<TableRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_used: Option<String>,
}

impl RecommendResponse {
    pub fn from_results(results: &[QueryResult], query_used: Option<String>) -> Self {
        let table: Vec<TableRow> = results.iter().map(TableRow::from).collect();
        Self {
            results_count: table.len(),
            table,
            query_used,
        }
    }
}

type Loader = Arc<dyn Fn() -> Result<Recommender> + Send + Sync>;

/// Shared state behind every `recommend` call.
pub struct RecommendService {
    fetcher: PageFetcher,
    include_query_source: bool,
    assets: OnceCell<Arc<Recommender>>,
    loader: Loader,
}

impl RecommendService {
    /// Service that loads its assets with `loader` on first use.
    pub fn new<F>(fetcher: PageFetcher, include_query_source: bool, loader: F) -> Self
    where
        F: Fn() -> Result<Recommender> + Send + Sync + 'static,
    {
        Self {
            fetcher,
            include_query_source,
            assets: OnceCell::new(),
            loader: Arc::new(loader),
        }
    }

    /// Service around an already-loaded recommender.
    pub fn preloaded(fetcher: PageFetcher, include_query_source: bool, recommender: Arc<Recommender>) -> Self {
        Self {
            fetcher,
            include_query_source,
            assets: OnceCell::new_with(Some(recommender)),
            loader: Arc::new(|| Err(RecommendError::Model("assets were supplied preloaded".to_string()))),
        }
    }

    /// Service backed by the configured model and artifact files.
    pub fn from_config(config: &RecommenderConfig) -> Result<Self> {
        let fetcher = PageFetcher::new(config.fetch_timeout(), &config.user_agent)?;
        let source = config.model_source();
        let options = config.encode_options();
        let paths = config.artifact_paths();
        Ok(Self::new(fetcher, config.include_query_source, move || {
            let model = SentenceEmbeddingsModel::load(&source, options)?;
            Recommender::open(&paths, Arc::new(model))
        }))
    }

    pub fn is_loaded(&self) -> bool {
        self.assets.initialized()
    }

    /// Loaded assets, loading them on the blocking pool the first time.
    pub async fn assets(&self) -> Result<Arc<Recommender>> {
        let recommender = self
            .assets
            .get_or_try_init(|| async {
                info!("Loading recommender assets");
                let loader = self.loader.clone();
                let recommender = tokio::task::spawn_blocking(move || loader())
                    .await
                    .map_err(|e| RecommendError::Model(format!("asset loading task failed: {e}")))??;
                Ok::<_, RecommendError>(Arc::new(recommender))
            })
            .await?;
        Ok(recommender.clone())
    }

    /// Answer one request.
    ///
    /// # Errors
    /// [`RecommendError::InvalidRequest`] and [`RecommendError::QueryFetchFailure`]
    /// before any search; asset, embedding and consistency errors after.
    pub async fn recommend(&self, request: &RecommendRequest) -> Result<RecommendResponse> {
        let source = QuerySource::from_parts(request.query_text.as_deref(), request.query_url.as_deref())?;
        let top_k = clamp_top_k(request.top_k);
        debug!("top_k {} clamped to {top_k}", request.top_k);

        let query = self.fetcher.resolve(&source).await?;
        let recommender = self.assets().await?;

        let search_query = query.clone();
        let results = tokio::task::spawn_blocking(move || recommender.nearest(&search_query, top_k))
            .await
            .map_err(|e| RecommendError::Embedding(format!("search task failed: {e}")))??;

        let query_used = self.include_query_source.then_some(query);
        Ok(RecommendResponse::from_results(&results, query_used))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AssessmentRecord;
    use crate::testing::{recommender_for, sample_records};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fetcher() -> PageFetcher {
        PageFetcher::new(Duration::from_secs(2), "Mozilla/5.0").unwrap()
    }

    fn service(records: Vec<AssessmentRecord>) -> (RecommendService, Arc<crate::testing::HashEmbedder>) {
        let (recommender, embedder) = recommender_for(records);
        (RecommendService::preloaded(fetcher(), false, recommender), embedder)
    }

    #[tokio::test]
    async fn test_result_counts_are_clamped() {
        let (service, _) = service(sample_records(12));
        for (requested, expected) in [(1, 5), (4, 5), (7, 7), (11, 10), (1000, 10)] {
            let response = service
                .recommend(&RecommendRequest::text("reasoning with numbers", requested))
                .await
                .unwrap();
            assert_eq!(response.table.len(), expected);
            assert_eq!(response.results_count, response.table.len());
        }
    }

    #[tokio::test]
    async fn test_scores_ascend() {
        let (service, _) = service(sample_records(12));
        let response = service
            .recommend(&RecommendRequest::text("personality questionnaire", 10))
            .await
            .unwrap();
        assert!(response.table.windows(2).all(|w| w[0].score <= w[1].score));
    }

    #[tokio::test]
    async fn test_missing_duration_and_levels_render_as_na() {
        let records = vec![
            AssessmentRecord::new(0, "Claims Processing", "", "Insurance claims", vec!["Mid-Professional".into()], "S", Some(30)),
            AssessmentRecord::new(1, "Warehouse Safety", "", "Forklift and storage rules", vec![], "K", None),
            AssessmentRecord::new(2, "Retail Cashier", "", "Till handling", vec!["Entry-Level".into()], "", Some(45)),
        ];
        let query = records[1].text_for_embedding.clone();
        let (service, _) = service(records);

        let response = service.recommend(&RecommendRequest::text(query, 5)).await.unwrap();
        assert_eq!(response.results_count, 3);
        let json = serde_json::to_value(&response).unwrap();
        let first = &json["table"][0];
        assert_eq!(first["Assessment Name"], "Warehouse Safety");
        assert_eq!(first["Duration (min)"], "N/A");
        assert_eq!(first["Job Levels"], "N/A");
        assert_eq!(first["Score"], 0.0);
        assert!(json.get("query_used").is_none());

        let cashier = response.table.iter().find(|r| r.name == "Retail Cashier").unwrap();
        assert_eq!(cashier.test_type, "");
        assert_eq!(serde_json::to_value(cashier).unwrap()["Test Type"], "");
        assert_eq!(cashier.duration, DurationCell::Minutes(45));
    }

    #[tokio::test]
    async fn test_neither_field_is_invalid() {
        let (service, embedder) = service(sample_records(5));
        let before = embedder.calls();
        let request = RecommendRequest {
            query_text: Some("  ".to_string()),
            query_url: None,
            top_k: 5,
        };
        let err = service.recommend(&request).await.unwrap_err();
        assert!(matches!(err, RecommendError::InvalidRequest(_)));
        assert_eq!(embedder.calls(), before);
    }

    #[tokio::test]
    async fn test_unreachable_url_skips_search() {
        let (service, embedder) = service(sample_records(5));
        let before = embedder.calls();
        let err = service
            .recommend(&RecommendRequest::url("http://127.0.0.1:1/job", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, RecommendError::QueryFetchFailure(_)));
        assert_eq!(embedder.calls(), before);
    }

    #[tokio::test]
    async fn test_url_query_is_echoed_when_enabled() {
        use httpmock::prelude::*;
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/job");
                then.status(200).body("<html><body><h1>Java   developer</h1></body></html>");
            })
            .await;

        let (recommender, _) = recommender_for(sample_records(6));
        let service = RecommendService::preloaded(fetcher(), true, recommender);
        let response = service
            .recommend(&RecommendRequest::url(server.url("/job"), 5))
            .await
            .unwrap();
        assert_eq!(response.query_used.as_deref(), Some("Java developer"));
        assert_eq!(response.results_count, 5);
    }

    #[tokio::test]
    async fn test_assets_load_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let service = RecommendService::new(fetcher(), false, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let (recommender, _) = recommender_for(sample_records(6));
            Arc::try_unwrap(recommender).map_err(|_| RecommendError::Model("shared".to_string()))
        });
        assert!(!service.is_loaded());

        for _ in 0..3 {
            service.recommend(&RecommendRequest::text("sql joins", 5)).await.unwrap();
        }
        assert!(service.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_does_not_load_assets() {
        let service = RecommendService::new(fetcher(), false, || {
            Err(RecommendError::Model("should not load".to_string()))
        });
        let request = RecommendRequest {
            query_text: None,
            query_url: None,
            top_k: 5,
        };
        let err = service.recommend(&request).await.unwrap_err();
        assert!(matches!(err, RecommendError::InvalidRequest(_)));
        assert!(!service.is_loaded());
    }

    #[test]
    fn test_request_defaults_top_k() {
        let request: RecommendRequest = serde_json::from_str(r#"{"query_text": "sales"}"#).unwrap();
        assert_eq!(request.top_k, 5);
        assert_eq!(request.query_url, None);
    }
}
