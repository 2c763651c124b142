//! The embedding service.
//!
//! Wraps a backend [`Embedder`] with the behaviors every caller relies on:
//! search-profile normalization, an LRU vector cache keyed by
//! `(model_id, sha256(normalized_text))`, micro-batching with a latency
//! flush for query traffic, retries with exponential backoff, per-batch
//! timeouts, and per-item failure isolation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use qanun_core::config::EmbeddingConfig;
use qanun_core::hash::sha256_hex;
use qanun_core::{Error, Result};
use qanun_parser::normalize::{NormalizerOptions, normalize_str};

use crate::embedder::Embedder;
use crate::vector::Vector;

/// Inputs longer than this are truncated before embedding; chunking keeps
/// real inputs far below it.
const MAX_EMBED_CHARS: usize = 8192;
const RETRY_BASE_DELAY_MS: u64 = 100;

struct QueueItem {
    normalized: String,
    cache_key: String,
    reply: oneshot::Sender<Result<Vector>>,
}

/// Cache hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 { 0.0 } else { hits / total }
    }
}

/// Process-wide embedding front end. Construct once and share via `Arc`.
pub struct EmbeddingService {
    embedder: Arc<dyn Embedder>,
    config: EmbeddingConfig,
    cache: Cache<String, Vector>,
    stats: Arc<CacheStats>,
    queue: mpsc::Sender<QueueItem>,
}

impl EmbeddingService {
    /// Build the service and spawn its batch worker.
    pub fn new(embedder: Arc<dyn Embedder>, config: EmbeddingConfig) -> Arc<Self> {
        let cache = Cache::new(config.embed_cache_size);
        let (queue, rx) = mpsc::channel(config.embed_batch_size.max(32) * 4);

        let service = Arc::new(Self {
            embedder: embedder.clone(),
            config: config.clone(),
            cache: cache.clone(),
            stats: Arc::new(CacheStats::default()),
            queue,
        });

        tokio::spawn(run_batch_worker(rx, embedder, cache, config));
        service
    }

    /// One flat pass over the input: normalize, truncate, and derive the
    /// cache key from the same buffer.
    fn preprocess(&self, text: &str) -> (String, String) {
        let mut normalized = normalize_str(text, &NormalizerOptions::search());
        if normalized.chars().count() > MAX_EMBED_CHARS {
            let cut = normalized
                .char_indices()
                .nth(MAX_EMBED_CHARS)
                .map_or(normalized.len(), |(offset, _)| offset);
            normalized.truncate(cut);
        }
        let cache_key = format!(
            "{}:{}",
            self.embedder.model_id(),
            sha256_hex(&normalized)
        );
        (normalized, cache_key)
    }

    /// Embed one query text.
    ///
    /// With `immediate` the batching queue is bypassed and the backend is
    /// called directly; otherwise the request rides the next micro-batch.
    pub async fn embed_query(&self, text: &str, immediate: bool) -> Result<Vector> {
        let (normalized, cache_key) = self.preprocess(text);
        if let Some(hit) = self.cache.get(&cache_key) {
            self.stats.hit();
            return Ok(hit);
        }
        self.stats.miss();

        if immediate {
            let texts = [normalized];
            let mut results =
                embed_resilient(self.embedder.as_ref(), &texts, &self.config).await;
            let result = results
                .pop()
                .unwrap_or_else(|| Err(Error::embedding_failed("backend returned no result")));
            if let Ok(vector) = &result {
                self.cache.insert(cache_key, vector.clone());
            }
            return result;
        }

        let (reply, receiver) = oneshot::channel();
        let item = QueueItem {
            normalized,
            cache_key,
            reply,
        };
        self.queue
            .send(item)
            .await
            .map_err(|_| Error::embedding_failed("embedding worker is gone"))?;
        receiver
            .await
            .map_err(|_| Error::embedding_failed("embedding worker dropped the request"))?
    }

    /// Embed a batch of storage texts with per-item outcomes.
    ///
    /// Cache hits are served without touching the backend; misses go out in
    /// `embed_batch_size` groups. A failing batch degrades to per-item
    /// requests so one bad input only fails itself.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vector>> {
        let mut slots: Vec<Option<Result<Vector>>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<(usize, String, String)> = Vec::new();

        for (index, text) in texts.iter().enumerate() {
            let (normalized, cache_key) = self.preprocess(text);
            if let Some(hit) = self.cache.get(&cache_key) {
                self.stats.hit();
                slots.push(Some(Ok(hit)));
            } else {
                self.stats.miss();
                slots.push(None);
                misses.push((index, normalized, cache_key));
            }
        }

        for group in misses.chunks(self.config.embed_batch_size.max(1)) {
            let group_texts: Vec<String> =
                group.iter().map(|(_, normalized, _)| normalized.clone()).collect();
            let results =
                embed_resilient(self.embedder.as_ref(), &group_texts, &self.config).await;
            for ((index, _, cache_key), result) in group.iter().zip(results) {
                if let Ok(vector) = &result {
                    self.cache.insert(cache_key.clone(), vector.clone());
                }
                if let Some(slot) = slots.get_mut(*index) {
                    *slot = Some(result);
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(Error::embedding_failed("item was never embedded")))
            })
            .collect()
    }

    /// Cosine similarity between two vectors.
    pub fn similarity(a: &Vector, b: &Vector) -> f32 {
        a.cosine(b)
    }

    pub fn dim(&self) -> usize {
        self.embedder.dim()
    }

    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Drop every cached vector. Required when the model identifier
    /// rotates: old vectors are unusable under the new model.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }
}

async fn run_batch_worker(
    mut rx: mpsc::Receiver<QueueItem>,
    embedder: Arc<dyn Embedder>,
    cache: Cache<String, Vector>,
    config: EmbeddingConfig,
) {
    let latency = Duration::from_millis(config.embed_batch_latency_ms);

    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        let deadline = Instant::now() + latency;

        // Fill until the batch is full or the latency budget runs out.
        while batch.len() < config.embed_batch_size {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                item = rx.recv() => match item {
                    Some(item) => batch.push(item),
                    None => break,
                },
            }
        }

        debug!(batch_len = batch.len(), "flushing embedding batch");
        let texts: Vec<String> = batch.iter().map(|item| item.normalized.clone()).collect();
        let results = embed_resilient(embedder.as_ref(), &texts, &config).await;

        for (item, result) in batch.into_iter().zip(results) {
            if let Ok(vector) = &result {
                cache.insert(item.cache_key, vector.clone());
            }
            let _ = item.reply.send(result);
        }
    }
}

/// Embed a batch with retries; on persistent batch failure fall back to
/// per-item requests so only the offending items fail.
async fn embed_resilient(
    embedder: &dyn Embedder,
    texts: &[String],
    config: &EmbeddingConfig,
) -> Vec<Result<Vector>> {
    if texts.is_empty() {
        return Vec::new();
    }

    match embed_with_retry(embedder, texts, config).await {
        Ok(vectors) => vectors
            .into_iter()
            .map(|vector| check_dim(vector, embedder.dim()))
            .collect(),
        Err(error) if texts.len() == 1 => vec![Err(error)],
        Err(error) => {
            warn!(%error, batch_len = texts.len(), "batch embedding failed; degrading to per-item");
            let mut results = Vec::with_capacity(texts.len());
            for text in texts {
                let single = std::slice::from_ref(text);
                let result = match embed_with_retry(embedder, single, config).await {
                    Ok(mut vectors) => vectors
                        .pop()
                        .ok_or_else(|| Error::embedding_failed("backend returned no result"))
                        .and_then(|vector| check_dim(vector, embedder.dim())),
                    Err(item_error) => Err(item_error),
                };
                results.push(result);
            }
            results
        }
    }
}

async fn embed_with_retry(
    embedder: &dyn Embedder,
    texts: &[String],
    config: &EmbeddingConfig,
) -> Result<Vec<Vector>> {
    let timeout = Duration::from_millis(config.embed_timeout_ms);
    let mut attempt = 0u32;

    loop {
        let outcome = match tokio::time::timeout(timeout, embedder.embed(texts)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("embedding", config.embed_timeout_ms)),
        };

        match outcome {
            Ok(vectors) if vectors.len() == texts.len() => return Ok(vectors),
            Ok(vectors) => {
                return Err(Error::embedding_failed(format!(
                    "expected {} vectors, got {}",
                    texts.len(),
                    vectors.len()
                )));
            }
            Err(error) => {
                if attempt >= config.embed_retries || !error.is_transient() {
                    return Err(error);
                }
                let delay = RETRY_BASE_DELAY_MS.saturating_mul(1 << attempt.min(8));
                debug!(%error, attempt, delay_ms = delay, "retrying embedding call");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
        }
    }
}

fn check_dim(vector: Vector, expected: usize) -> Result<Vector> {
    if vector.dim() != expected {
        return Err(Error::dimension_mismatch(expected, vector.dim()));
    }
    Ok(vector.l2_normalized())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use async_trait::async_trait;

    use super::*;
    use crate::embedder::HashEmbedder;

    fn test_config() -> EmbeddingConfig {
        EmbeddingConfig {
            vector_model_id: "test-hash".to_string(),
            vector_dim: 64,
            embed_batch_size: 4,
            embed_batch_latency_ms: 5,
            embed_cache_size: 128,
            embed_retries: 1,
            embed_timeout_ms: 2_000,
            ..EmbeddingConfig::default()
        }
    }

    fn service() -> Arc<EmbeddingService> {
        EmbeddingService::new(Arc::new(HashEmbedder::new(64, "test-hash")), test_config())
    }

    #[tokio::test]
    async fn test_immediate_query_and_cache_hit() {
        let service = service();
        let first = service.embed_query("فسخ عقد العمل", true).await.unwrap();
        let second = service.embed_query("فسخ عقد العمل", true).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(service.stats().hits(), 1);
        assert_eq!(service.stats().misses(), 1);
        assert!((service.stats().hit_rate() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_normalization_unifies_cache_keys() {
        let service = service();
        // Same text with and without diacritics and hamza spelling.
        service.embed_query("المَادَّةُ الأُولَى", true).await.unwrap();
        service.embed_query("الماده الاولي", true).await.unwrap();
        assert_eq!(service.stats().hits(), 1);
    }

    #[tokio::test]
    async fn test_batched_query_path() {
        let service = service();
        let vector = service.embed_query("انهاء العقد", false).await.unwrap();
        assert_eq!(vector.dim(), 64);
    }

    #[tokio::test]
    async fn test_embed_batch_mixes_hits_and_misses() {
        let service = service();
        service.embed_query("نص اول", true).await.unwrap();
        let results = service
            .embed_batch(&["نص اول".to_string(), "نص ثان".to_string()])
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(service.stats().hits(), 1);
    }

    struct FlakyEmbedder {
        inner: HashEmbedder,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>> {
            if texts.iter().any(|t| t.contains("سيئ")) {
                return Err(Error::embedding_failed("poisoned input"));
            }
            self.inner.embed(texts).await
        }

        fn dim(&self) -> usize {
            self.inner.dim()
        }

        fn model_id(&self) -> &str {
            self.inner.model_id()
        }
    }

    #[tokio::test]
    async fn test_single_bad_item_fails_alone() {
        let mut config = test_config();
        config.embed_retries = 0;
        let service = EmbeddingService::new(
            Arc::new(FlakyEmbedder {
                inner: HashEmbedder::new(64, "test-hash"),
            }),
            config,
        );

        let results = service
            .embed_batch(&[
                "نص سليم".to_string(),
                "نص سيئ".to_string(),
                "نص اخر".to_string(),
            ])
            .await;
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    struct WrongDimEmbedder;

    #[async_trait]
    impl Embedder for WrongDimEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>> {
            Ok(texts.iter().map(|_| Vector::new(vec![1.0, 2.0])).collect())
        }

        fn dim(&self) -> usize {
            64
        }

        fn model_id(&self) -> &str {
            "wrong-dim"
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_detected() {
        let service = EmbeddingService::new(Arc::new(WrongDimEmbedder), test_config());
        let error = service.embed_query("نص", true).await.unwrap_err();
        assert_eq!(error.wire_kind(), "dimension_mismatch");
    }

    #[tokio::test]
    async fn test_invalidate_cache_forces_recompute() {
        let service = service();
        service.embed_query("نص", true).await.unwrap();
        service.invalidate_cache();
        service.embed_query("نص", true).await.unwrap();
        assert_eq!(service.stats().hits(), 0);
        assert_eq!(service.stats().misses(), 2);
    }
}
