//! Engine configuration.
//!
//! One `EngineConfig` drives every component. Each section has compiled-in
//! defaults, can be loaded from a TOML file, and is validated before the
//! engine starts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_CONTENT_THRESHOLD: usize = 40;
const DEFAULT_TOC_SUBSTANTIAL_RUN: usize = 3;
const DEFAULT_MIN_CONTENT_LEN: usize = 3;

const DEFAULT_CHUNK_TARGET_TOKENS: usize = 500;
const DEFAULT_CHUNK_MAX_TOKENS: usize = 800;
const DEFAULT_CHUNK_OVERLAP_TOKENS: usize = 20;

const DEFAULT_EMBED_BATCH_SIZE: usize = 32;
const DEFAULT_EMBED_BATCH_LATENCY_MS: u64 = 50;
const DEFAULT_EMBED_CACHE_SIZE: u64 = 10_000;
const DEFAULT_EMBED_RETRIES: u32 = 2;
const DEFAULT_EMBED_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_VECTOR_DIM: usize = 256;

const DEFAULT_SEARCH_CACHE_TTL_S: u64 = 300;
const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_TOP_K: usize = 10;
const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.7;
const DEFAULT_BM25_K1: f32 = 1.5;
const DEFAULT_BM25_B: f32 = 0.75;

/// Parser and TOC-detector tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Minimum length for a non-marker line to count as "substantial
    /// content" in TOC detection.
    pub content_threshold: usize,
    /// Consecutive substantial content lines that close a TOC region.
    pub toc_substantial_run: usize,
    /// Minimum length for a line to be classified as content at all.
    pub min_content_len: usize,
    /// Fold taa marbuta (ة -> ه) in the search-side normalizer.
    pub normalize_taa_marbuta: bool,
    /// Fold final yaa (ى -> ي).
    pub normalize_yaa_final: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            content_threshold: DEFAULT_CONTENT_THRESHOLD,
            toc_substantial_run: DEFAULT_TOC_SUBSTANTIAL_RUN,
            min_content_len: DEFAULT_MIN_CONTENT_LEN,
            normalize_taa_marbuta: true,
            normalize_yaa_final: true,
        }
    }
}

/// Chunking budgets, in whitespace tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_target_tokens: usize,
    pub chunk_max_tokens: usize,
    pub chunk_overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_target_tokens: DEFAULT_CHUNK_TARGET_TOKENS,
            chunk_max_tokens: DEFAULT_CHUNK_MAX_TOKENS,
            chunk_overlap_tokens: DEFAULT_CHUNK_OVERLAP_TOKENS,
        }
    }
}

/// Which embedding backend to run against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EmbedderBackend {
    /// Deterministic feature-hash embedder; no external service required.
    Hash,
    /// Remote sentence-transformer serving endpoint.
    Http { endpoint: String },
}

/// Embedding service tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Opaque model identifier recorded alongside every vector. Changing it
    /// invalidates all cached and stored vectors.
    pub vector_model_id: String,
    /// Output dimension of the model; constant per model identifier.
    pub vector_dim: usize,
    pub embed_batch_size: usize,
    pub embed_batch_latency_ms: u64,
    pub embed_cache_size: u64,
    pub embed_retries: u32,
    pub embed_timeout_ms: u64,
    pub backend: EmbedderBackend,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            vector_model_id: "qanun-hash-v1".to_string(),
            vector_dim: DEFAULT_VECTOR_DIM,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            embed_batch_latency_ms: DEFAULT_EMBED_BATCH_LATENCY_MS,
            embed_cache_size: DEFAULT_EMBED_CACHE_SIZE,
            embed_retries: DEFAULT_EMBED_RETRIES,
            embed_timeout_ms: DEFAULT_EMBED_TIMEOUT_MS,
            backend: EmbedderBackend::Hash,
        }
    }
}

/// Search service tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub search_cache_ttl_s: u64,
    pub search_timeout_ms: u64,
    pub default_top_k: usize,
    /// Similarity floor applied when a request does not carry one.
    pub default_threshold: f32,
    /// Default weight of the semantic score in hybrid search.
    pub semantic_weight: f32,
    pub bm25_k1: f32,
    pub bm25_b: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_cache_ttl_s: DEFAULT_SEARCH_CACHE_TTL_S,
            search_timeout_ms: DEFAULT_SEARCH_TIMEOUT_MS,
            default_top_k: DEFAULT_TOP_K,
            default_threshold: 0.0,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            bm25_k1: DEFAULT_BM25_K1,
            bm25_b: DEFAULT_BM25_B,
        }
    }
}

/// Relational storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum StorageEngine {
    /// In-process, non-durable; the default for tests and local runs.
    Memory,
    /// RocksDB-backed durable storage.
    Rocksdb { path: String },
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageEngine,
    pub namespace: String,
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageEngine::Memory,
            namespace: "qanun".to_string(),
            database: "legal".to_string(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub parser: ParserConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

impl EngineConfig {
    /// Parse a TOML document into a validated configuration.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| Error::config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_target_tokens == 0 {
            return Err(Error::config("chunk_target_tokens must be positive"));
        }
        if chunking.chunk_max_tokens < chunking.chunk_target_tokens {
            return Err(Error::config(
                "chunk_max_tokens must be >= chunk_target_tokens",
            ));
        }
        if chunking.chunk_overlap_tokens >= chunking.chunk_target_tokens {
            return Err(Error::config(
                "chunk_overlap_tokens must be < chunk_target_tokens",
            ));
        }

        let embedding = &self.embedding;
        if embedding.vector_dim == 0 {
            return Err(Error::config("vector_dim must be positive"));
        }
        if embedding.embed_batch_size == 0 {
            return Err(Error::config("embed_batch_size must be positive"));
        }
        if embedding.vector_model_id.is_empty() {
            return Err(Error::config("vector_model_id cannot be empty"));
        }
        if let EmbedderBackend::Http { endpoint } = &embedding.backend
            && endpoint.is_empty()
        {
            return Err(Error::config("http embedder endpoint cannot be empty"));
        }

        let search = &self.search;
        if !(0.0..=1.0).contains(&search.semantic_weight) {
            return Err(Error::config("semantic_weight must be within [0, 1]"));
        }
        if search.default_top_k == 0 {
            return Err(Error::config("default_top_k must be positive"));
        }
        if search.search_cache_ttl_s == 0 {
            return Err(Error::config("search_cache_ttl_s must be positive"));
        }

        if self.parser.toc_substantial_run == 0 {
            return Err(Error::config("toc_substantial_run must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_target_tokens, 500);
        assert_eq!(config.chunking.chunk_max_tokens, 800);
        assert_eq!(config.chunking.chunk_overlap_tokens, 20);
        assert_eq!(config.embedding.embed_batch_size, 32);
        assert_eq!(config.embedding.embed_batch_latency_ms, 50);
        assert_eq!(config.embedding.embed_cache_size, 10_000);
        assert_eq!(config.search.search_cache_ttl_s, 300);
        assert_eq!(config.parser.content_threshold, 40);
        assert_eq!(config.parser.toc_substantial_run, 3);
    }

    #[test]
    fn test_partial_toml_overlays_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [chunking]
            chunk_target_tokens = 300

            [embedding]
            vector_dim = 768
            vector_model_id = "arabic-st-v2"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_target_tokens, 300);
        assert_eq!(config.chunking.chunk_max_tokens, 800);
        assert_eq!(config.embedding.vector_dim, 768);
        assert_eq!(config.embedding.vector_model_id, "arabic-st-v2");
    }

    #[test]
    fn test_overlap_must_stay_below_target() {
        let mut config = EngineConfig::default();
        config.chunking.chunk_overlap_tokens = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_semantic_weight_range() {
        let mut config = EngineConfig::default();
        config.search.semantic_weight = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_backend_requires_endpoint() {
        let mut config = EngineConfig::default();
        config.embedding.backend = EmbedderBackend::Http {
            endpoint: String::new(),
        };
        assert!(config.validate().is_err());
    }
}
