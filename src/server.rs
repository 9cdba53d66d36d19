//! HTTP surface: `GET /` health check and `POST /recommend`.
//!
//! Caller mistakes (no query, unreachable query page) come back as 400 with a
//! `detail` message; everything else is a 500.

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::RecommenderConfig;
use crate::error::{RecommendError, Result};
use crate::service::{RecommendRequest, RecommendResponse, RecommendService};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// CORS policy for the configured origins.
///
/// `"*"` allows any origin without credentials; an explicit list allows
/// credentials from exactly those origins.
pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origins = allowed_origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o.trim_end_matches('/'))
                .map_err(|e| RecommendError::Config(format!("invalid CORS origin {o:?}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION]))
}

pub fn router(service: Arc<RecommendService>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/recommend", post(recommend))
        .layer(cors)
        .with_state(service)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

async fn recommend(
    State(service): State<Arc<RecommendService>>,
    Json(request): Json<RecommendRequest>,
) -> std::result::Result<Json<RecommendResponse>, ApiError> {
    service.recommend(&request).await.map(Json).map_err(error_response)
}

fn bad_request(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

fn internal_error(err: RecommendError) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            detail: err.to_string(),
        }),
    )
}

fn error_response(err: RecommendError) -> ApiError {
    match err {
        RecommendError::InvalidRequest(detail) => bad_request(detail),
        err if err.is_client_error() => {
            warn!("{err}");
            bad_request(err.to_string())
        }
        err => {
            error!("recommend failed: {err}");
            internal_error(err)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Bind `bind` and serve until Ctrl-C.
pub async fn serve(config: &RecommenderConfig, bind: &str) -> Result<()> {
    let service = Arc::new(RecommendService::from_config(config)?);
    if config.preload {
        service.assets().await?;
    }
    let app = router(service, cors_layer(&config.allowed_origins)?);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
