//! The search service: semantic, similar-to-chunk, and hybrid queries with
//! result caching and enrichment.
//!
//! Reads committed state only: candidates always come from processed
//! documents, so a search started before an ingest finishes never sees a
//! partial document. Search never mutates state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::{debug, warn};

use qanun_core::config::SearchConfig;
use qanun_core::hash::sha256_hex;
use qanun_core::types::{ArticleParent, ChunkId, DocumentFilter, DocumentId};
use qanun_core::{Error, Result};
use qanun_embedding::{EmbeddingService, Vector};
use qanun_store::DualStore;

use crate::lexical::{Bm25Index, Bm25Params};
use crate::types::{
    ArticleContext, ChapterContext, DocumentContext, SearchHit, SearchResponse, SectionContext,
};

const RESULT_CACHE_CAPACITY: u64 = 1_000;
// Hybrid search blends two rankings; consider more vector candidates than
// the final page so lexical-strong chunks can surface.
const HYBRID_CANDIDATE_FACTOR: usize = 4;

/// Query surface over the dual store.
pub struct SearchService {
    store: Arc<DualStore>,
    embedding: Arc<EmbeddingService>,
    config: SearchConfig,
    cache: Cache<String, SearchResponse>,
}

impl SearchService {
    pub fn new(
        store: Arc<DualStore>,
        embedding: Arc<EmbeddingService>,
        config: SearchConfig,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(RESULT_CACHE_CAPACITY)
            .time_to_live(Duration::from_secs(config.search_cache_ttl_s))
            .build();
        Self {
            store,
            embedding,
            config,
            cache,
        }
    }

    /// Top-k chunks by cosine similarity, enriched and threshold-filtered.
    pub async fn semantic_search(
        &self,
        query: &str,
        top_k: Option<usize>,
        threshold: Option<f32>,
        filter: &DocumentFilter,
    ) -> Result<SearchResponse> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        let threshold = threshold.unwrap_or(self.config.default_threshold);
        let normalized_query = validated_query(query)?;

        let key = self.cache_key("semantic", &normalized_query, filter, top_k, threshold, "");
        if let Some(cached) = self.cache.get(&key) {
            debug!(query = %normalized_query, "search cache hit");
            return Ok(cached);
        }

        let response = self
            .with_timeout(self.semantic_inner(&normalized_query, top_k, threshold, filter))
            .await?;
        self.cache.insert(key, response.clone());
        Ok(response)
    }

    /// Chunks most similar to a stored chunk, excluding the chunk itself.
    pub async fn similar_chunks(
        &self,
        chunk_id: ChunkId,
        top_k: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<SearchResponse> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        let threshold = threshold.unwrap_or(self.config.default_threshold);

        let key = self.cache_key(
            "similar",
            &chunk_id.to_string(),
            &DocumentFilter::default(),
            top_k,
            threshold,
            "",
        );
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let response = self
            .with_timeout(self.similar_inner(chunk_id, top_k, threshold))
            .await?;
        self.cache.insert(key, response.clone());
        Ok(response)
    }

    /// Weighted blend of semantic similarity and BM25 lexical score:
    /// `score = w * semantic + (1 - w) * lexical`.
    pub async fn hybrid_search(
        &self,
        query: &str,
        top_k: Option<usize>,
        semantic_weight: Option<f32>,
        filter: &DocumentFilter,
    ) -> Result<SearchResponse> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        let weight = semantic_weight.unwrap_or(self.config.semantic_weight);
        if !(0.0..=1.0).contains(&weight) {
            return Err(Error::invalid_input("semantic_weight must be within [0, 1]"));
        }
        let normalized_query = validated_query(query)?;
        let threshold = self.config.default_threshold;

        let key = self.cache_key(
            "hybrid",
            &normalized_query,
            filter,
            top_k,
            threshold,
            &format!("w={}", weight.to_bits()),
        );
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let response = self
            .with_timeout(self.hybrid_inner(&normalized_query, top_k, weight, threshold, filter))
            .await?;
        self.cache.insert(key, response.clone());
        Ok(response)
    }

    /// Short continuations drawn from article titles matching the prefix.
    pub async fn suggest(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let normalized_prefix = validated_query(prefix)?;
        let titles = self.store.relational().article_titles().await?;
        Ok(titles
            .into_iter()
            .filter(|title| {
                qanun_parser::normalize_str(
                    title,
                    &qanun_parser::NormalizerOptions::search(),
                )
                .starts_with(&normalized_prefix)
            })
            .take(limit)
            .collect())
    }

    /// Drop all cached search responses.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    async fn with_timeout<F>(&self, inner: F) -> Result<SearchResponse>
    where
        F: Future<Output = Result<SearchResponse>>,
    {
        let budget = Duration::from_millis(self.config.search_timeout_ms);
        match tokio::time::timeout(budget, inner).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("search", self.config.search_timeout_ms)),
        }
    }

    async fn semantic_inner(
        &self,
        normalized_query: &str,
        top_k: usize,
        threshold: f32,
        filter: &DocumentFilter,
    ) -> Result<SearchResponse> {
        // Embedding failure surfaces here, before the vector store is
        // touched.
        let query_vector = self.embedding.embed_query(normalized_query, true).await?;
        let allowed = self.admitted_documents(filter).await?;

        let scored = self
            .store
            .vector()
            .search(&query_vector, top_k, Some(&allowed), None)
            .await?;

        let hits = self.enrich_all(scored.into_iter().map(|s| (s.chunk_id, s.score))).await?;
        Ok(self.finish(normalized_query, threshold, top_k, hits))
    }

    async fn similar_inner(
        &self,
        chunk_id: ChunkId,
        top_k: usize,
        threshold: f32,
    ) -> Result<SearchResponse> {
        let record = self
            .store
            .vector()
            .get(chunk_id)
            .await?
            .ok_or_else(|| Error::not_found("chunk", chunk_id.to_string()))?;

        let allowed = self.admitted_documents(&DocumentFilter::default()).await?;
        let scored = self
            .store
            .vector()
            .search(&record.vector, top_k, Some(&allowed), Some(chunk_id))
            .await?;

        let hits = self.enrich_all(scored.into_iter().map(|s| (s.chunk_id, s.score))).await?;
        Ok(self.finish(&chunk_id.to_string(), threshold, top_k, hits))
    }

    async fn hybrid_inner(
        &self,
        normalized_query: &str,
        top_k: usize,
        weight: f32,
        threshold: f32,
        filter: &DocumentFilter,
    ) -> Result<SearchResponse> {
        let query_vector = self.embedding.embed_query(normalized_query, true).await?;
        let allowed = self.admitted_documents(filter).await?;
        let candidates_k = top_k.saturating_mul(HYBRID_CANDIDATE_FACTOR).max(top_k);

        let vector_hits = self
            .store
            .vector()
            .search(&query_vector, candidates_k, Some(&allowed), None)
            .await?;
        let semantic: HashMap<ChunkId, f32> = vector_hits
            .iter()
            .map(|s| (s.chunk_id, s.score))
            .collect();

        let admitted_chunks = self.store.relational().chunks_matching(filter).await?;
        let index = Bm25Index::build(
            &admitted_chunks,
            Bm25Params {
                k1: self.config.bm25_k1,
                b: self.config.bm25_b,
            },
        );
        let lexical = index.normalized_scores(normalized_query);

        // Candidates: vector hits plus every lexically matching chunk.
        let mut candidates: HashSet<ChunkId> = semantic.keys().copied().collect();
        candidates.extend(lexical.keys().copied());

        let mut combined: Vec<(ChunkId, f32)> = Vec::with_capacity(candidates.len());
        for chunk_id in candidates {
            let semantic_score = match semantic.get(&chunk_id) {
                Some(score) => *score,
                // A lexical-only candidate still has a stored vector;
                // score it directly.
                None => match self.store.vector().get(chunk_id).await? {
                    Some(record) => query_vector.dot(&record.vector),
                    None => 0.0,
                },
            };
            let lexical_score = lexical.get(&chunk_id).copied().unwrap_or(0.0);
            let score = weight * semantic_score + (1.0 - weight) * lexical_score;
            combined.push((chunk_id, score));
        }

        let hits = self.enrich_all(combined.into_iter()).await?;
        Ok(self.finish(normalized_query, threshold, top_k, hits))
    }

    async fn admitted_documents(&self, filter: &DocumentFilter) -> Result<HashSet<DocumentId>> {
        Ok(self
            .store
            .relational()
            .documents_matching(filter)
            .await?
            .into_iter()
            .collect())
    }

    async fn enrich_all(
        &self,
        scored: impl Iterator<Item = (ChunkId, f32)>,
    ) -> Result<Vec<SearchHit>> {
        let mut hits = Vec::new();
        for (chunk_id, score) in scored {
            if let Some(hit) = self.enrich(chunk_id, score).await? {
                hits.push(hit);
            }
        }
        Ok(hits)
    }

    /// Join chunk -> article -> (section?) -> (chapter?) -> document.
    /// Dangling chunks (no article or document behind them) are dropped.
    async fn enrich(&self, chunk_id: ChunkId, score: f32) -> Result<Option<SearchHit>> {
        let relational = self.store.relational();

        let Some(chunk) = relational.chunk(chunk_id).await? else {
            warn!(%chunk_id, "dangling_chunk: vector without relational row");
            return Ok(None);
        };
        let Some(article) = relational.article(chunk.article_id).await? else {
            warn!(%chunk_id, "dangling_chunk: chunk without article");
            return Ok(None);
        };
        let Some(document) = relational.document(chunk.document_id).await? else {
            warn!(%chunk_id, "dangling_chunk: chunk without document");
            return Ok(None);
        };

        let (section, chapter) = match article.parent {
            ArticleParent::Document => (None, None),
            ArticleParent::Chapter(chapter_id) => {
                (None, relational.chapter(chapter_id).await?)
            }
            ArticleParent::Section(section_id) => match relational.section(section_id).await? {
                Some(section) => {
                    let chapter = relational.chapter(section.chapter_id).await?;
                    (Some(section), chapter)
                }
                None => (None, None),
            },
        };

        Ok(Some(SearchHit {
            chunk_id,
            content: chunk.text.clone(),
            similarity: score,
            document: DocumentContext::from(&document),
            chapter: chapter.as_ref().map(ChapterContext::from),
            section: section.as_ref().map(SectionContext::from),
            article: ArticleContext::from(&article),
            chunk_index: chunk.chunk_index,
        }))
    }

    fn finish(
        &self,
        normalized_query: &str,
        threshold: f32,
        top_k: usize,
        mut hits: Vec<SearchHit>,
    ) -> SearchResponse {
        hits.retain(|hit| hit.similarity >= threshold);
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.document_id.cmp(&b.document.document_id))
                .then_with(|| a.article.order_index.cmp(&b.article.order_index))
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        });
        hits.truncate(top_k);

        SearchResponse {
            total_results: hits.len(),
            threshold,
            normalized_query: normalized_query.to_string(),
            hits,
        }
    }

    fn cache_key(
        &self,
        kind: &str,
        normalized_query: &str,
        filter: &DocumentFilter,
        top_k: usize,
        threshold: f32,
        extra: &str,
    ) -> String {
        let filter_json = serde_json::to_string(filter).unwrap_or_default();
        sha256_hex(&format!(
            "{kind}|{normalized_query}|{filter_json}|{top_k}|{}|{extra}",
            threshold.to_bits()
        ))
    }
}

fn validated_query(query: &str) -> Result<String> {
    let normalized = qanun_parser::normalize_str(
        query,
        &qanun_parser::NormalizerOptions::search(),
    );
    if normalized.is_empty() {
        return Err(Error::invalid_input("query must not be empty"));
    }
    Ok(normalized)
}
