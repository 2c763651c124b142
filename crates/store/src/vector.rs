//! Vector store trait and the in-process implementation.
//!
//! The vector side keeps `{chunk_id -> (vector, metadata)}`. The engine is
//! single-node, so the production index is an in-process brute-force scan
//! over unit vectors; the trait is the seam where a remote index would
//! plug in.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use qanun_core::types::{ChunkId, ChunkMetadata, DocumentId};
use qanun_core::{Error, Result};
use qanun_embedding::Vector;

/// A stored vector record.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk_id: ChunkId,
    pub vector: Vector,
    pub metadata: ChunkMetadata,
}

/// A similarity match from the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_id: ChunkId,
    pub score: f32,
}

/// Storage contract for the vector side of the dual store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, record: VectorRecord) -> Result<()>;

    async fn delete(&self, chunk_id: ChunkId) -> Result<()>;

    async fn delete_batch(&self, chunk_ids: &[ChunkId]) -> Result<()>;

    async fn get(&self, chunk_id: ChunkId) -> Result<Option<VectorRecord>>;

    /// Nearest chunks by cosine similarity (dot product over unit vectors).
    ///
    /// `allowed_documents` restricts candidates when present; `exclude`
    /// drops one chunk (the similar-to source).
    async fn search(
        &self,
        query: &Vector,
        top_k: usize,
        allowed_documents: Option<&HashSet<DocumentId>>,
        exclude: Option<ChunkId>,
    ) -> Result<Vec<ScoredChunk>>;

    async fn ids_for_document(&self, document_id: DocumentId) -> Result<Vec<ChunkId>>;

    async fn all_ids(&self) -> Result<Vec<ChunkId>>;

    async fn count(&self) -> Result<usize>;
}

/// In-process vector store with a brute-force scan.
#[derive(Default)]
pub struct MemoryVectorStore {
    records: RwLock<std::collections::HashMap<ChunkId, VectorRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        let record = VectorRecord {
            vector: record.vector.l2_normalized(),
            ..record
        };
        self.records.write().await.insert(record.chunk_id, record);
        Ok(())
    }

    async fn delete(&self, chunk_id: ChunkId) -> Result<()> {
        self.records.write().await.remove(&chunk_id);
        Ok(())
    }

    async fn delete_batch(&self, chunk_ids: &[ChunkId]) -> Result<()> {
        let mut records = self.records.write().await;
        for chunk_id in chunk_ids {
            records.remove(chunk_id);
        }
        Ok(())
    }

    async fn get(&self, chunk_id: ChunkId) -> Result<Option<VectorRecord>> {
        Ok(self.records.read().await.get(&chunk_id).cloned())
    }

    async fn search(
        &self,
        query: &Vector,
        top_k: usize,
        allowed_documents: Option<&HashSet<DocumentId>>,
        exclude: Option<ChunkId>,
    ) -> Result<Vec<ScoredChunk>> {
        let records = self.records.read().await;
        let mut scored: Vec<ScoredChunk> = records
            .values()
            .filter(|r| Some(r.chunk_id) != exclude)
            .filter(|r| {
                allowed_documents.is_none_or(|allowed| allowed.contains(&r.metadata.document_id))
            })
            .map(|r| ScoredChunk {
                chunk_id: r.chunk_id,
                score: query.dot(&r.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn ids_for_document(&self, document_id: DocumentId) -> Result<Vec<ChunkId>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.metadata.document_id == document_id)
            .map(|r| r.chunk_id)
            .collect())
    }

    async fn all_ids(&self) -> Result<Vec<ChunkId>> {
        Ok(self.records.read().await.keys().copied().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

/// Test double: behaves like [`MemoryVectorStore`] until the configured
/// number of upserts, then fails every upsert. Exercises the dual-write
/// rollback paths.
pub struct FailingVectorStore {
    inner: MemoryVectorStore,
    upserts_before_failure: usize,
    upserts_seen: AtomicUsize,
}

impl FailingVectorStore {
    pub fn failing_after(upserts_before_failure: usize) -> Self {
        Self {
            inner: MemoryVectorStore::new(),
            upserts_before_failure,
            upserts_seen: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorStore for FailingVectorStore {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        let seen = self.upserts_seen.fetch_add(1, Ordering::SeqCst);
        if seen >= self.upserts_before_failure {
            return Err(Error::vector_write_failed("injected vector store failure"));
        }
        self.inner.upsert(record).await
    }

    async fn delete(&self, chunk_id: ChunkId) -> Result<()> {
        self.inner.delete(chunk_id).await
    }

    async fn delete_batch(&self, chunk_ids: &[ChunkId]) -> Result<()> {
        self.inner.delete_batch(chunk_ids).await
    }

    async fn get(&self, chunk_id: ChunkId) -> Result<Option<VectorRecord>> {
        self.inner.get(chunk_id).await
    }

    async fn search(
        &self,
        query: &Vector,
        top_k: usize,
        allowed_documents: Option<&HashSet<DocumentId>>,
        exclude: Option<ChunkId>,
    ) -> Result<Vec<ScoredChunk>> {
        self.inner.search(query, top_k, allowed_documents, exclude).await
    }

    async fn ids_for_document(&self, document_id: DocumentId) -> Result<Vec<ChunkId>> {
        self.inner.ids_for_document(document_id).await
    }

    async fn all_ids(&self) -> Result<Vec<ChunkId>> {
        self.inner.all_ids().await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}
