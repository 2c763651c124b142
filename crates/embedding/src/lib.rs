//! Embedding service for the retrieval pipeline.
//!
//! [`EmbeddingService`] fronts a pluggable [`Embedder`] backend with
//! normalization, caching, micro-batching, retries, and timeouts. Vectors
//! come back L2-normalized so cosine similarity is a dot product.

pub mod embedder;
pub mod service;
pub mod vector;

pub use embedder::{Embedder, HashEmbedder, HttpEmbedder};
pub use service::{CacheStats, EmbeddingService};
pub use vector::Vector;

use std::sync::Arc;
use std::time::Duration;

use qanun_core::Result;
use qanun_core::config::{EmbedderBackend, EmbeddingConfig};

/// Build the configured embedding backend.
pub fn embedder_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match &config.backend {
        EmbedderBackend::Hash => Ok(Arc::new(HashEmbedder::new(
            config.vector_dim,
            config.vector_model_id.clone(),
        ))),
        EmbedderBackend::Http { endpoint } => Ok(Arc::new(HttpEmbedder::new(
            endpoint,
            config.vector_dim,
            config.vector_model_id.clone(),
            Duration::from_millis(config.embed_timeout_ms),
        )?)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_backend_selection() {
        let config = EmbeddingConfig::default();
        let embedder = embedder_from_config(&config).unwrap();
        assert_eq!(embedder.dim(), config.vector_dim);
        assert_eq!(embedder.model_id(), config.vector_model_id);
    }
}
