//! HTTP surface for the retrieval engine: ingest, search, document
//! administration, and store status.

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::{build_app, serve};
pub use state::AppState;
