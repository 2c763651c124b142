//! Dual-store persistence for the retrieval engine.
//!
//! The relational side ([`RelationalStore`]) owns documents and their tree;
//! the vector side ([`VectorStore`]) owns `{chunk_id -> vector}`.
//! [`DualStore`] keeps the two in agreement: ordered writes with rollback,
//! a repair log for partial update failures, and reconciliation.

pub mod dual;
pub mod relational;
pub mod surreal;
pub mod vector;

pub use dual::{DualStore, DualStoreStatus, ReconcileReport};
pub use relational::{MemoryStore, RelationalStore};
pub use surreal::SurrealStore;
pub use vector::{FailingVectorStore, MemoryVectorStore, ScoredChunk, VectorRecord, VectorStore};

use std::sync::Arc;

use qanun_core::Result;
use qanun_core::config::StorageConfig;

/// Build the configured relational store.
pub async fn relational_from_config(config: &StorageConfig) -> Result<Arc<dyn RelationalStore>> {
    Ok(Arc::new(SurrealStore::connect(config).await?))
}
