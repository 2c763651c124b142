//! The dual store: atomic cross-store writes over the relational and
//! vector backends.
//!
//! Write ordering per operation:
//! - `add_chunk`: relational first, then vector; a vector failure rolls the
//!   relational row back.
//! - `update_chunk`: relational rewrite, then vector delete-and-insert; a
//!   partial vector failure lands the desired final state in the repair log
//!   for `reconcile` to replay.
//! - `delete_chunk`: vector first, then relational; a vector failure leaves
//!   the relational row in place.
//! - `delete_document`: vector batch delete, then relational rows in
//!   dependency order.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use qanun_core::types::{ChunkId, ChunkRow, DocumentId};
use qanun_core::{Error, Result};
use qanun_embedding::{EmbeddingService, Vector};

use crate::relational::RelationalStore;
use crate::vector::{VectorRecord, VectorStore};

const DIVERGENCE_SAMPLE_LIMIT: usize = 10;

/// Desired final vector state recorded after a partial update failure.
#[derive(Debug, Clone)]
struct RepairEntry {
    document_id: DocumentId,
    desired: VectorRecord,
}

/// Agreement summary between the two stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualStoreStatus {
    pub sql_chunks: usize,
    pub vector_chunks: usize,
    pub divergent_ids_sample: Vec<ChunkId>,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Repair-log entries replayed into the vector store.
    pub replayed: usize,
    /// Relational chunks re-embedded and inserted into the vector store.
    pub reinserted: usize,
    /// Stray vectors deleted from the vector store.
    pub deleted: usize,
}

/// Coordinated writes across the relational and vector stores.
pub struct DualStore {
    relational: Arc<dyn RelationalStore>,
    vector: Arc<dyn VectorStore>,
    repair_log: Mutex<Vec<RepairEntry>>,
}

impl DualStore {
    pub fn new(relational: Arc<dyn RelationalStore>, vector: Arc<dyn VectorStore>) -> Self {
        Self {
            relational,
            vector,
            repair_log: Mutex::new(Vec::new()),
        }
    }

    pub fn relational(&self) -> &Arc<dyn RelationalStore> {
        &self.relational
    }

    pub fn vector(&self) -> &Arc<dyn VectorStore> {
        &self.vector
    }

    /// Write a chunk row and its vector as one logical transaction.
    pub async fn add_chunk(&self, chunk: ChunkRow, vector: Vector) -> Result<()> {
        let document = self
            .relational
            .document(chunk.document_id)
            .await?
            .ok_or_else(|| Error::not_found("document", chunk.document_id.to_string()))?;
        if vector.dim() != document.vector_dim {
            return Err(Error::dimension_mismatch(document.vector_dim, vector.dim()));
        }

        let record = VectorRecord {
            chunk_id: chunk.chunk_id,
            vector,
            metadata: chunk.metadata.clone(),
        };
        let chunk_id = chunk.chunk_id;

        self.relational
            .insert_chunk(chunk)
            .await
            .map_err(|e| Error::relational_write_failed(e.to_string()))?;

        if let Err(error) = self.vector.upsert(record).await {
            // Undo the relational half so the stores stay in agreement.
            if let Err(rollback_error) = self.relational.delete_chunk(chunk_id).await {
                warn!(%chunk_id, %rollback_error, "rollback of relational chunk failed");
            }
            return Err(Error::vector_write_failed(error.to_string()));
        }

        Ok(())
    }

    /// Rewrite a chunk's text and vector.
    pub async fn update_chunk(
        &self,
        chunk_id: ChunkId,
        new_text: String,
        new_vector: Vector,
    ) -> Result<()> {
        let chunk = self
            .relational
            .chunk(chunk_id)
            .await?
            .ok_or_else(|| Error::not_found("chunk", chunk_id.to_string()))?;

        let token_count = new_text.split_whitespace().count();
        self.relational
            .update_chunk_text(chunk_id, new_text, token_count)
            .await
            .map_err(|e| Error::relational_write_failed(e.to_string()))?;

        let desired = VectorRecord {
            chunk_id,
            vector: new_vector,
            metadata: chunk.metadata.clone(),
        };

        let replaced = match self.vector.delete(chunk_id).await {
            Ok(()) => self.vector.upsert(desired.clone()).await,
            Err(error) => Err(error),
        };

        if let Err(error) = replaced {
            self.repair_log.lock().await.push(RepairEntry {
                document_id: chunk.document_id,
                desired,
            });
            return Err(Error::vector_write_failed(format!(
                "vector replace failed, repair logged: {error}"
            )));
        }

        Ok(())
    }

    /// Delete a single chunk from both stores.
    pub async fn delete_chunk(&self, chunk_id: ChunkId) -> Result<()> {
        self.vector
            .delete(chunk_id)
            .await
            .map_err(|e| Error::vector_write_failed(e.to_string()))?;
        self.relational
            .delete_chunk(chunk_id)
            .await
            .map_err(|e| Error::relational_write_failed(e.to_string()))
    }

    /// Delete a document and everything it owns from both stores.
    pub async fn delete_document(&self, document_id: DocumentId) -> Result<()> {
        let mut chunk_ids: HashSet<ChunkId> = self
            .relational
            .chunk_ids_for_document(document_id)
            .await?
            .into_iter()
            .collect();
        chunk_ids.extend(self.vector.ids_for_document(document_id).await?);

        let chunk_ids: Vec<ChunkId> = chunk_ids.into_iter().collect();
        self.vector
            .delete_batch(&chunk_ids)
            .await
            .map_err(|e| Error::vector_write_failed(e.to_string()))?;

        self.repair_log
            .lock()
            .await
            .retain(|entry| entry.document_id != document_id);

        self.relational
            .delete_document_rows(document_id)
            .await
            .map_err(|e| Error::relational_write_failed(e.to_string()))?;

        info!(%document_id, chunks = chunk_ids.len(), "document deleted from both stores");
        Ok(())
    }

    /// Bring the vector store back into agreement with the relational store
    /// for one document: replay repairs, re-embed missing vectors, delete
    /// strays.
    pub async fn reconcile(
        &self,
        document_id: DocumentId,
        embedding: &EmbeddingService,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        // Replay repair-log entries recorded for this document.
        let pending: Vec<RepairEntry> = {
            let mut log = self.repair_log.lock().await;
            let (mine, rest): (Vec<_>, Vec<_>) = log
                .drain(..)
                .partition(|entry| entry.document_id == document_id);
            *log = rest;
            mine
        };
        for entry in pending {
            match self.vector.upsert(entry.desired.clone()).await {
                Ok(()) => report.replayed += 1,
                Err(error) => {
                    self.repair_log.lock().await.push(entry);
                    return Err(Error::vector_write_failed(format!(
                        "repair replay failed: {error}"
                    )));
                }
            }
        }

        let chunks = self.relational.chunks_for_document(document_id).await?;
        let relational_ids: HashSet<ChunkId> = chunks.iter().map(|c| c.chunk_id).collect();
        let vector_ids: HashSet<ChunkId> = self
            .vector
            .ids_for_document(document_id)
            .await?
            .into_iter()
            .collect();

        // Relational chunks missing a vector: re-embed and insert.
        let missing: Vec<&ChunkRow> = chunks
            .iter()
            .filter(|c| !vector_ids.contains(&c.chunk_id))
            .collect();
        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|c| c.text.clone()).collect();
            let vectors = embedding.embed_batch(&texts).await;
            for (chunk, vector) in missing.iter().zip(vectors) {
                let vector = vector?;
                self.vector
                    .upsert(VectorRecord {
                        chunk_id: chunk.chunk_id,
                        vector,
                        metadata: chunk.metadata.clone(),
                    })
                    .await
                    .map_err(|e| Error::vector_write_failed(e.to_string()))?;
                report.reinserted += 1;
            }
        }

        // Vectors with no relational chunk: delete.
        for stray in vector_ids.difference(&relational_ids) {
            self.vector
                .delete(*stray)
                .await
                .map_err(|e| Error::vector_write_failed(e.to_string()))?;
            report.deleted += 1;
        }

        info!(
            %document_id,
            replayed = report.replayed,
            reinserted = report.reinserted,
            deleted = report.deleted,
            "reconciliation complete"
        );
        Ok(report)
    }

    /// Global agreement summary with a bounded sample of divergent ids.
    pub async fn status(&self) -> Result<DualStoreStatus> {
        let relational_ids: HashSet<ChunkId> =
            self.relational.all_chunk_ids().await?.into_iter().collect();
        let vector_ids: HashSet<ChunkId> = self.vector.all_ids().await?.into_iter().collect();

        let mut divergent: Vec<ChunkId> = relational_ids
            .symmetric_difference(&vector_ids)
            .copied()
            .collect();
        divergent.sort();
        divergent.truncate(DIVERGENCE_SAMPLE_LIMIT);

        Ok(DualStoreStatus {
            sql_chunks: relational_ids.len(),
            vector_chunks: vector_ids.len(),
            divergent_ids_sample: divergent,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::relational::MemoryStore;
    use crate::vector::{FailingVectorStore, MemoryVectorStore};
    use qanun_core::config::EmbeddingConfig;
    use qanun_core::types::{
        ArticleId, ChunkMetadata, DocumentRow, DocumentStatus, DocumentType,
    };
    use qanun_embedding::HashEmbedder;

    const DIM: usize = 32;

    fn embedding_service() -> Arc<EmbeddingService> {
        let config = EmbeddingConfig {
            vector_dim: DIM,
            vector_model_id: "test-hash".to_string(),
            ..EmbeddingConfig::default()
        };
        EmbeddingService::new(Arc::new(HashEmbedder::new(DIM, "test-hash")), config)
    }

    async fn seeded_stores() -> (Arc<MemoryStore>, DocumentId) {
        let relational = Arc::new(MemoryStore::new());
        let document_id = DocumentId::new();
        relational
            .insert_document(DocumentRow {
                document_id,
                content_hash: "hash".to_string(),
                name: "نظام".to_string(),
                doc_type: DocumentType::Law,
                jurisdiction: "SA".to_string(),
                issued_at: None,
                uploaded_at: chrono::Utc::now(),
                status: DocumentStatus::Processing,
                error: None,
                processed_at: None,
                vector_model_id: "test-hash".to_string(),
                vector_dim: DIM,
                chunk_count: 0,
            })
            .await
            .unwrap();
        (relational, document_id)
    }

    fn chunk(document_id: DocumentId, index: u32, text: &str) -> ChunkRow {
        ChunkRow {
            chunk_id: ChunkId::new(),
            document_id,
            article_id: ArticleId::new(),
            chunk_index: index,
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            metadata: ChunkMetadata {
                document_id,
                article_order_index: 1,
                chunk_index: index,
                article_number: Some("1".to_string()),
                chapter_index: None,
                section_index: None,
            },
        }
    }

    fn unit_vector() -> Vector {
        let mut values = vec![0.0; DIM];
        values[0] = 1.0;
        Vector::new(values)
    }

    #[tokio::test]
    async fn test_add_chunk_writes_both_stores() {
        let (relational, document_id) = seeded_stores().await;
        let vector_store = Arc::new(MemoryVectorStore::new());
        let dual = DualStore::new(relational.clone(), vector_store.clone());

        let row = chunk(document_id, 0, "نص المادة");
        let chunk_id = row.chunk_id;
        dual.add_chunk(row, unit_vector()).await.unwrap();

        assert!(relational.chunk(chunk_id).await.unwrap().is_some());
        assert!(vector_store.get(chunk_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_add_chunk_rolls_back_on_vector_failure() {
        let (relational, document_id) = seeded_stores().await;
        let vector_store = Arc::new(FailingVectorStore::failing_after(0));
        let dual = DualStore::new(relational.clone(), vector_store);

        let row = chunk(document_id, 0, "نص");
        let chunk_id = row.chunk_id;
        let error = dual.add_chunk(row, unit_vector()).await.unwrap_err();
        assert_eq!(error.wire_kind(), "vector_write_failed");
        assert!(relational.chunk(chunk_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_chunk_rejects_dimension_mismatch() {
        let (relational, document_id) = seeded_stores().await;
        let dual = DualStore::new(relational, Arc::new(MemoryVectorStore::new()));

        let row = chunk(document_id, 0, "نص");
        let error = dual
            .add_chunk(row, Vector::new(vec![1.0, 0.0]))
            .await
            .unwrap_err();
        assert_eq!(error.wire_kind(), "dimension_mismatch");
    }

    #[tokio::test]
    async fn test_delete_document_clears_both_stores() {
        let (relational, document_id) = seeded_stores().await;
        let vector_store = Arc::new(MemoryVectorStore::new());
        let dual = DualStore::new(relational.clone(), vector_store.clone());

        for i in 0..3 {
            dual.add_chunk(chunk(document_id, i, "نص"), unit_vector())
                .await
                .unwrap();
        }
        dual.delete_document(document_id).await.unwrap();

        assert_eq!(relational.count_chunks().await.unwrap(), 0);
        assert_eq!(vector_store.count().await.unwrap(), 0);
        assert!(relational.document(document_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_chunk_failure_lands_in_repair_log_and_reconciles() {
        let (relational, document_id) = seeded_stores().await;
        // One successful upsert allowed, then failures.
        let vector_store = Arc::new(FailingVectorStore::failing_after(1));
        let dual = DualStore::new(relational.clone(), vector_store);

        let row = chunk(document_id, 0, "النص القديم");
        let chunk_id = row.chunk_id;
        dual.add_chunk(row, unit_vector()).await.unwrap();

        let error = dual
            .update_chunk(chunk_id, "النص الجديد".to_string(), unit_vector())
            .await
            .unwrap_err();
        assert_eq!(error.wire_kind(), "vector_write_failed");

        // Relational text was rewritten; the vector is gone until repair.
        let updated = relational.chunk(chunk_id).await.unwrap().unwrap();
        assert_eq!(updated.text, "النص الجديد");

        // The failing store keeps failing, so replay reports an error and
        // keeps the entry.
        let embedding = embedding_service();
        assert!(dual.reconcile(document_id, &embedding).await.is_err());
    }

    #[tokio::test]
    async fn test_reconcile_reinserts_and_deletes_strays() {
        let (relational, document_id) = seeded_stores().await;
        let vector_store = Arc::new(MemoryVectorStore::new());
        let dual = DualStore::new(relational.clone(), vector_store.clone());

        // A relational chunk with no vector.
        let missing = chunk(document_id, 0, "نص بلا متجه");
        relational.insert_chunk(missing.clone()).await.unwrap();

        // A stray vector with no relational chunk.
        let stray = chunk(document_id, 9, "شارد");
        vector_store
            .upsert(VectorRecord {
                chunk_id: stray.chunk_id,
                vector: unit_vector(),
                metadata: stray.metadata.clone(),
            })
            .await
            .unwrap();

        let embedding = embedding_service();
        let report = dual.reconcile(document_id, &embedding).await.unwrap();
        assert_eq!(report.reinserted, 1);
        assert_eq!(report.deleted, 1);

        let status = dual.status().await.unwrap();
        assert_eq!(status.sql_chunks, status.vector_chunks);
        assert!(status.divergent_ids_sample.is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_divergence() {
        let (relational, document_id) = seeded_stores().await;
        let dual = DualStore::new(relational.clone(), Arc::new(MemoryVectorStore::new()));

        let row = chunk(document_id, 0, "نص");
        relational.insert_chunk(row.clone()).await.unwrap();

        let status = dual.status().await.unwrap();
        assert_eq!(status.sql_chunks, 1);
        assert_eq!(status.vector_chunks, 0);
        assert_eq!(status.divergent_ids_sample, vec![row.chunk_id]);
    }
}
