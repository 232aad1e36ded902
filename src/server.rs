//! HTTP API
//!
//! Routes:
//! - `GET /`: liveness
//! - `GET /streams?url=` (alias `/episode-streams`): episode stream aggregation
//! - `GET /api/app_version`, `POST /api/update`: mobile client version record

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::stream::EpisodeAggregator;
use crate::version::{AppVersion, VersionError, VersionStore};

/// Failures surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing '{0}' parameter")]
    MissingParam(&'static str),

    #[error("Request must be JSON")]
    InvalidBody,

    #[error("version, download_url, and changelog are required")]
    MissingFields,

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    VersionRead(#[source] VersionError),

    #[error("Could not write to version file")]
    VersionWrite(#[source] VersionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::MissingParam(_) => (
                StatusCode::BAD_REQUEST,
                json!({"success": false, "error": self.to_string()}),
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"success": false, "error": self.to_string()}),
            ),
            Self::InvalidBody => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Invalid request format", "message": self.to_string()}),
            ),
            Self::MissingFields => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Missing required fields", "message": self.to_string()}),
            ),
            Self::VersionRead(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Failed to get app version", "message": self.to_string()}),
            ),
            Self::VersionWrite(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Failed to save version data", "message": self.to_string()}),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<EpisodeAggregator>,
    pub versions: Arc<VersionStore>,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let aggregator =
            EpisodeAggregator::from_config(config).context("failed to build HTTP client")?;
        Ok(Self {
            aggregator: Arc::new(aggregator),
            versions: Arc::new(VersionStore::new(&config.version_file)),
        })
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/streams", get(episode_streams))
        .route("/episode-streams", get(episode_streams))
        .route("/api/app_version", get(app_version))
        .route("/api/update", post(update_app_version))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    info!("Server running on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .await
        .context("server error")
}

async fn index() -> &'static str {
    "I am alive!"
}

#[derive(Debug, Deserialize)]
struct UrlQuery {
    url: Option<String>,
}

async fn episode_streams(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<Value>, ApiError> {
    let url = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(ApiError::MissingParam("url"))?;

    let data = match state.aggregator.get_episode_streams(url).await {
        Some(result) => serde_json::to_value(result).map_err(|e| {
            error!(error = %e, "Error in episode-streams endpoint");
            ApiError::Internal(e.to_string())
        })?,
        None => json!({}),
    };

    Ok(Json(json!({"success": true, "data": data})))
}

async fn app_version(State(state): State<AppState>) -> Result<Json<AppVersion>, ApiError> {
    state.versions.load().await.map(Json).map_err(|e| {
        error!(error = %e, "Error in app_version endpoint");
        ApiError::VersionRead(e)
    })
}

async fn update_app_version(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_lowercase().contains("json"));
    if !is_json {
        return Err(ApiError::InvalidBody);
    }

    let body: Value = serde_json::from_slice(&body).map_err(|_| ApiError::InvalidBody)?;
    let record = AppVersion::from_update(&body).ok_or(ApiError::MissingFields)?;

    state
        .versions
        .save(&record)
        .await
        .map_err(ApiError::VersionWrite)?;
    info!(version = %record.version, "App version updated");

    Ok(Json(json!({
        "success": true,
        "message": "App version updated successfully",
        "data": record,
    })))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": "The requested URL was not found on the server."
        })),
    )
}
