//! HTTP server assembly.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use qanun_core::{Error, Result};

use crate::routes;
use crate::state::AppState;

/// Build the application router with middleware.
pub fn build_app(state: AppState) -> Router {
    routes::create_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| Error::config(format!("failed to bind {bind_addr}: {e}")))?;
    info!(%bind_addr, "qanun api listening");

    axum::serve(listener, build_app(state))
        .await
        .map_err(|e| Error::store(format!("server error: {e}")))
}
