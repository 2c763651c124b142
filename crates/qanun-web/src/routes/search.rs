//! Retrieval endpoints.
//!
//! Request bodies are decoded strictly: unknown keys (including unknown
//! filter keys) are `invalid_input`, not silently ignored.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use qanun_core::Error;
use qanun_core::types::{ChunkId, DocumentFilter};
use qanun_search::SearchResponse;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Decode a JSON body rejecting unknown keys, surfacing `invalid_input`.
fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> ApiResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError(Error::invalid_input(format!("malformed request: {e}"))))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SemanticRequest {
    query: String,
    top_k: Option<usize>,
    threshold: Option<f32>,
    filters: Option<DocumentFilter>,
}

pub async fn semantic(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<SearchResponse>> {
    let request: SemanticRequest = decode(body)?;
    let filter = request.filters.unwrap_or_default();
    let response = state
        .search
        .semantic_search(&request.query, request.top_k, request.threshold, &filter)
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SimilarRequest {
    top_k: Option<usize>,
    threshold: Option<f32>,
}

pub async fn similar_to(
    State(state): State<AppState>,
    Path(chunk_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<SearchResponse>> {
    let chunk_id: ChunkId = chunk_id
        .parse()
        .map_err(|_| ApiError(Error::invalid_input("malformed chunk id")))?;
    let request: SimilarRequest = if body.is_null() {
        SimilarRequest::default()
    } else {
        decode(body)?
    };
    let response = state
        .search
        .similar_chunks(chunk_id, request.top_k, request.threshold)
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HybridRequest {
    query: String,
    top_k: Option<usize>,
    semantic_weight: Option<f32>,
    filters: Option<DocumentFilter>,
}

pub async fn hybrid(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<SearchResponse>> {
    let request: HybridRequest = decode(body)?;
    let filter = request.filters.unwrap_or_default();
    let response = state
        .search
        .hybrid_search(
            &request.query,
            request.top_k,
            request.semantic_weight,
            &filter,
        )
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    prefix: String,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<String>,
    pub total_results: usize,
}

const DEFAULT_SUGGEST_LIMIT: usize = 10;

pub async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> ApiResult<Json<SuggestResponse>> {
    let suggestions = state
        .search
        .suggest(&params.prefix, params.limit.unwrap_or(DEFAULT_SUGGEST_LIMIT))
        .await?;
    Ok(Json(SuggestResponse {
        total_results: suggestions.len(),
        suggestions,
    }))
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.search.clear_cache();
    Json(serde_json::json!({ "cleared": true }))
}
