//! Route handler functions for all API endpoints.
//!
//! Each handler extracts parameters via axum extractors, calls the
//! query service, and returns JSON. Result payloads carry page metadata
//! and the matched snippet, not the full stored content.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use retrace_core::cancel::CancelFlag;
use retrace_core::types::{
    Confidence, IndexOutcome, IndexRequest, SearchMode, SearchOptions, SearchResult, StoreStats,
};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Query parameter and response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub k: Option<usize>,
    pub mode: Option<String>,
    pub alpha: Option<f64>,
    pub min_similarity: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResultResponse {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub similarity: f64,
    pub relevance: f64,
    pub mode: SearchMode,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_terms: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_snippet: Option<String>,
    pub timestamp: i64,
    pub visit_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultResponse>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessResponse {
    pub recorded: bool,
    pub id: Uuid,
}

impl From<SearchResult> for SearchResultResponse {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.page.id,
            url: result.page.url,
            title: result.page.title,
            similarity: result.similarity,
            relevance: result.relevance,
            mode: result.mode,
            confidence: result.confidence,
            keyword_score: result.keyword_score,
            matched_terms: result.matched_terms,
            top_snippet: result.top_snippet,
            timestamp: result.page.timestamp,
            visit_count: result.page.visit_count,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - liveness probe with uptime and page count.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let stats = state.service.stats()?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        total_pages: stats.total_pages,
    }))
}

/// GET /search - run a query against the index.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params
        .q
        .ok_or_else(|| ApiError::bad_request("Missing required parameter: q"))?;

    let mut opts = SearchOptions::default();
    if let Some(k) = params.k {
        if k == 0 {
            return Err(ApiError::bad_request("k must be at least 1"));
        }
        opts.k = k;
    }
    if let Some(mode) = params.mode.as_deref() {
        opts.mode = SearchMode::parse(mode)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown mode: {}", mode)))?;
    }
    if let Some(alpha) = params.alpha {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ApiError::bad_request("alpha must be within [0, 1]"));
        }
        opts.alpha = alpha;
    }
    if let Some(min_similarity) = params.min_similarity {
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(ApiError::bad_request("min_similarity must be within [0, 1]"));
        }
        opts.min_similarity = min_similarity;
    }

    let results = state
        .service
        .search(&query, opts, &CancelFlag::new())
        .await?;

    let results: Vec<SearchResultResponse> =
        results.into_iter().map(SearchResultResponse::from).collect();
    Ok(Json(SearchResponse {
        count: results.len(),
        results,
    }))
}

/// POST /index - index one extracted page.
pub async fn index(
    State(state): State<AppState>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexOutcome>, ApiError> {
    let outcome = state.service.index(request, &CancelFlag::new()).await?;
    Ok(Json(outcome))
}

/// GET /stats - store statistics.
pub async fn stats(State(state): State<AppState>) -> Result<Json<StoreStats>, ApiError> {
    Ok(Json(state.service.stats()?))
}

/// DELETE /pages/{id} - remove one page and its passages.
pub async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::bad_request(format!("Invalid page id: {}", id)))?;
    state.service.delete(id)?;
    Ok(Json(DeleteResponse { deleted: true, id }))
}

/// POST /pages/{id}/accessed - record a result click.
pub async fn record_access(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccessResponse>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::bad_request(format!("Invalid page id: {}", id)))?;
    state.service.record_search_access(id)?;
    Ok(Json(AccessResponse { recorded: true, id }))
}

/// POST /clear - wipe the store.
pub async fn clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    state.service.clear()?;
    Ok(Json(ClearResponse { cleared: true }))
}
