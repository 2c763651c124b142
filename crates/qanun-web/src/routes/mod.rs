//! REST API routes.

use axum::Router;
use axum::routing::{delete, get, post};

use crate::state::AppState;

pub mod documents;
pub mod health;
pub mod ingest;
pub mod search;

/// Build the API router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ingest", post(ingest::ingest_document))
        .route("/search/semantic", post(search::semantic))
        .route("/search/similar-to/{chunk_id}", post(search::similar_to))
        .route("/search/hybrid", post(search::hybrid))
        .route("/search/suggest", get(search::suggest))
        .route("/search/cache", delete(search::clear_cache))
        .route("/documents", get(documents::list))
        .route("/documents/{id}", get(documents::detail))
        .route("/documents/{id}", delete(documents::remove))
        .route("/documents/{id}/reconcile", post(documents::reconcile))
        .route("/store/status", get(documents::store_status))
}
