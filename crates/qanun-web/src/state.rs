//! Shared application state for request handlers.

use std::sync::Arc;

use qanun_ingest::IngestCoordinator;
use qanun_search::SearchService;
use qanun_store::DualStore;

/// Cloneable handle to the engine's services.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<IngestCoordinator>,
    pub search: Arc<SearchService>,
    pub store: Arc<DualStore>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<IngestCoordinator>,
        search: Arc<SearchService>,
        store: Arc<DualStore>,
    ) -> Self {
        Self {
            coordinator,
            search,
            store,
        }
    }
}
