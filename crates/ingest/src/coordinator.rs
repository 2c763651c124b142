//! The ingest coordinator.
//!
//! Orchestrates parse -> chunk -> embed -> dual write for one document,
//! with duplicate detection by content hash, orphan cleanup, per-hash
//! serialization, cancellation, and full rollback on any chunk failure.
//! Partial success is not allowed: a document is either fully committed or
//! ends `failed` with no chunks in either store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use qanun_core::config::EngineConfig;
use qanun_core::hash::sha256_hex;
use qanun_core::types::{
    ArticleId, ArticleParent, ArticleRow, ChapterId, ChapterRow, ChunkId, ChunkMetadata,
    ChunkRow, DocumentId, DocumentRow, DocumentStatus, DocumentType, SectionId, SectionRow,
};
use qanun_core::{Error, Result};
use qanun_embedding::EmbeddingService;
use qanun_parser::hierarchy::Diagnostic;
use qanun_parser::normalize::{NormalizerOptions, normalize_str};
use qanun_parser::{ParsedArticle, parse_document};
use qanun_store::{DualStore, ReconcileReport};

use crate::chunker::Chunker;

/// One document to ingest: metadata plus the extracted plain text.
#[derive(Debug, Clone)]
pub struct IngestPayload {
    pub name: String,
    pub doc_type: DocumentType,
    pub jurisdiction: String,
    pub issued_at: Option<NaiveDate>,
    pub text: String,
}

/// Result of a successful ingest.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub document_id: DocumentId,
    pub status: DocumentStatus,
    pub chunks_created: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Cancels an in-flight ingest.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observed by the coordinator between pipeline stages and chunk writes.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Create a linked cancel handle and token.
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// Orchestrates the ingest pipeline over the shared stores and embedding
/// service.
pub struct IngestCoordinator {
    store: Arc<DualStore>,
    embedding: Arc<EmbeddingService>,
    config: EngineConfig,
    chunker: Chunker,
    /// Per-content-hash locks serializing ingest and reconcile of the same
    /// document.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IngestCoordinator {
    pub fn new(
        store: Arc<DualStore>,
        embedding: Arc<EmbeddingService>,
        config: EngineConfig,
    ) -> Self {
        let chunker = Chunker::from_config(&config.chunking);
        Self {
            store,
            embedding,
            config,
            chunker,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<DualStore> {
        &self.store
    }

    pub fn embedding(&self) -> &Arc<EmbeddingService> {
        &self.embedding
    }

    /// Ingest one document without a cancellation signal.
    pub async fn ingest(&self, payload: IngestPayload) -> Result<IngestOutcome> {
        let (_handle, token) = cancellation();
        self.ingest_cancellable(payload, token).await
    }

    /// Ingest one document, checking `token` between stages and writes.
    pub async fn ingest_cancellable(
        &self,
        payload: IngestPayload,
        token: CancelToken,
    ) -> Result<IngestOutcome> {
        validate_payload(&payload)?;

        let normalized_source = normalize_str(&payload.text, &NormalizerOptions::search());
        let content_hash = sha256_hex(&normalized_source);

        let lock = self.lock_for(&content_hash).await;
        let _guard = lock.lock().await;

        self.guard_model_rotation().await?;

        // Duplicate detection: an active document with the same hash blocks
        // the ingest; a failed one is an orphan and is replaced.
        if let Some(existing) = self
            .store
            .relational()
            .document_by_hash(&content_hash)
            .await?
        {
            if existing.status.is_active() {
                return Err(Error::duplicate_document(
                    content_hash,
                    existing.document_id,
                ));
            }
            info!(document_id = %existing.document_id, "deleting orphaned document before re-ingest");
            self.store.delete_document(existing.document_id).await?;
        }

        let document = DocumentRow {
            document_id: DocumentId::new(),
            content_hash: content_hash.clone(),
            name: payload.name.clone(),
            doc_type: payload.doc_type,
            jurisdiction: payload.jurisdiction.clone(),
            issued_at: payload.issued_at,
            uploaded_at: chrono::Utc::now(),
            status: DocumentStatus::Pending,
            error: None,
            processed_at: None,
            vector_model_id: self.config.embedding.vector_model_id.clone(),
            vector_dim: self.config.embedding.vector_dim,
            chunk_count: 0,
        };
        let document_id = document.document_id;
        self.store
            .relational()
            .insert_document(document.clone())
            .await
            .map_err(|e| Error::relational_write_failed(e.to_string()))?;
        self.store
            .relational()
            .set_document_status(document_id, DocumentStatus::Processing, None)
            .await?;
        info!(%document_id, name = %payload.name, "ingest started");

        match self.run_pipeline(&document, &payload, &token).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.fail_with_rollback(document, &error).await;
                Err(error)
            }
        }
    }

    /// Delete a document and everything it owns, serialized against ingest
    /// of the same content.
    pub async fn delete_document(&self, document_id: DocumentId) -> Result<()> {
        let document = self
            .store
            .relational()
            .document(document_id)
            .await?
            .ok_or_else(|| Error::not_found("document", document_id.to_string()))?;

        let lock = self.lock_for(&document.content_hash).await;
        let _guard = lock.lock().await;
        self.store.delete_document(document_id).await
    }

    /// Reconcile one document's vector store state, serialized against
    /// ingest of the same content.
    pub async fn reconcile(&self, document_id: DocumentId) -> Result<ReconcileReport> {
        let document = self
            .store
            .relational()
            .document(document_id)
            .await?
            .ok_or_else(|| Error::not_found("document", document_id.to_string()))?;

        let lock = self.lock_for(&document.content_hash).await;
        let _guard = lock.lock().await;
        self.store.reconcile(document_id, &self.embedding).await
    }

    async fn lock_for(&self, content_hash: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(content_hash.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Refuse ingests while stored documents carry a different embedding
    /// model or dimension; reconcile or delete them first.
    async fn guard_model_rotation(&self) -> Result<()> {
        let expected_model = &self.config.embedding.vector_model_id;
        let expected_dim = self.config.embedding.vector_dim;

        for document in self.store.relational().list_documents().await? {
            if document.status == DocumentStatus::Failed {
                continue;
            }
            if document.vector_dim != expected_dim {
                return Err(Error::dimension_mismatch(expected_dim, document.vector_dim));
            }
            if &document.vector_model_id != expected_model {
                return Err(Error::invalid_input(format!(
                    "embedding model rotated from '{}' to '{expected_model}'; \
                     reconcile or delete existing documents first",
                    document.vector_model_id
                )));
            }
        }
        Ok(())
    }

    async fn run_pipeline(
        &self,
        document: &DocumentRow,
        payload: &IngestPayload,
        token: &CancelToken,
    ) -> Result<IngestOutcome> {
        let document_id = document.document_id;

        // Parse. CPU-bound and synchronous; best-effort with per-line
        // diagnostics.
        let parsed = parse_document(&payload.text, &self.config.parser);
        if parsed.article_count() == 0 {
            return Err(Error::no_articles_extracted(document_id));
        }
        check_cancelled(token)?;

        // Persist the tree and collect per-article chunk drafts.
        let chunk_rows = self.persist_tree(document_id, &parsed).await?;
        check_cancelled(token)?;

        // Embed all chunk texts; any item failure fails the document.
        let texts: Vec<String> = chunk_rows.iter().map(|c| c.text.clone()).collect();
        let embedded = self.embedding.embed_batch(&texts).await;
        check_cancelled(token)?;

        let mut vectors = Vec::with_capacity(embedded.len());
        let mut failures = Vec::new();
        for (row, result) in chunk_rows.iter().zip(embedded) {
            match result {
                Ok(vector) => vectors.push(vector),
                Err(error) => failures.push(format!("chunk {}: {error}", row.chunk_id)),
            }
        }
        if !failures.is_empty() {
            return Err(Error::embedding_failed(failures.join("; ")));
        }

        // Dual-write every chunk; any failure rolls the document back.
        let chunks_created = chunk_rows.len();
        for (row, vector) in chunk_rows.into_iter().zip(vectors) {
            check_cancelled(token)?;
            self.store.add_chunk(row, vector).await?;
        }

        self.store
            .relational()
            .set_document_processed(document_id, chunks_created)
            .await?;
        info!(%document_id, chunks_created, "ingest processed");

        Ok(IngestOutcome {
            document_id,
            status: DocumentStatus::Processed,
            chunks_created,
            diagnostics: parsed.diagnostics.clone(),
        })
    }

    /// Insert chapter, section, and article rows; return the chunk rows to
    /// embed, in reading order.
    async fn persist_tree(
        &self,
        document_id: DocumentId,
        parsed: &qanun_parser::ParsedDocument,
    ) -> Result<Vec<ChunkRow>> {
        let relational = self.store.relational();
        let mut chunk_rows = Vec::new();

        let emit_article = |article: &ParsedArticle,
                                parent: ArticleParent,
                                chapter_index: Option<u32>,
                                section_index: Option<u32>| {
            let article_id = ArticleId::new();
            let row = ArticleRow {
                article_id,
                document_id,
                parent,
                number: article.number.clone(),
                title: article.title.clone(),
                body: article.body.clone(),
                order_index: article.order_index,
                warnings: article.warnings.clone(),
            };
            let mut rows = Vec::new();
            if !article.body.is_empty() {
                for draft in self.chunker.chunk(&article.body) {
                    rows.push(ChunkRow {
                        chunk_id: ChunkId::new(),
                        document_id,
                        article_id,
                        chunk_index: draft.chunk_index,
                        token_count: draft.token_count,
                        metadata: ChunkMetadata {
                            document_id,
                            article_order_index: article.order_index,
                            chunk_index: draft.chunk_index,
                            article_number: article.number.clone(),
                            chapter_index,
                            section_index,
                        },
                        text: draft.text,
                    });
                }
            }
            (row, rows)
        };

        for article in &parsed.orphan_articles {
            let (row, rows) = emit_article(article, ArticleParent::Document, None, None);
            relational
                .insert_article(row)
                .await
                .map_err(|e| Error::relational_write_failed(e.to_string()))?;
            chunk_rows.extend(rows);
        }

        for chapter in &parsed.chapters {
            let chapter_id = ChapterId::new();
            relational
                .insert_chapter(ChapterRow {
                    chapter_id,
                    document_id,
                    index: chapter.index,
                    label: chapter.label.clone(),
                    title: chapter.title.clone(),
                })
                .await
                .map_err(|e| Error::relational_write_failed(e.to_string()))?;

            for article in &chapter.articles {
                let (row, rows) = emit_article(
                    article,
                    ArticleParent::Chapter(chapter_id),
                    Some(chapter.index),
                    None,
                );
                relational
                    .insert_article(row)
                    .await
                    .map_err(|e| Error::relational_write_failed(e.to_string()))?;
                chunk_rows.extend(rows);
            }

            for section in &chapter.sections {
                let section_id = SectionId::new();
                relational
                    .insert_section(SectionRow {
                        section_id,
                        document_id,
                        chapter_id,
                        index: section.index,
                        label: section.label.clone(),
                        title: section.title.clone(),
                    })
                    .await
                    .map_err(|e| Error::relational_write_failed(e.to_string()))?;

                for article in &section.articles {
                    let (row, rows) = emit_article(
                        article,
                        ArticleParent::Section(section_id),
                        Some(chapter.index),
                        Some(section.index),
                    );
                    relational
                        .insert_article(row)
                        .await
                        .map_err(|e| Error::relational_write_failed(e.to_string()))?;
                    chunk_rows.extend(rows);
                }
            }
        }

        // Chunks are embedded and written in reading order.
        chunk_rows.sort_by_key(|c| (c.metadata.article_order_index, c.chunk_index));
        Ok(chunk_rows)
    }

    /// Roll back everything the document wrote and leave a failed marker
    /// row with the preserved error.
    async fn fail_with_rollback(&self, mut document: DocumentRow, error: &Error) {
        let document_id = document.document_id;
        if let Err(rollback_error) = self.store.delete_document(document_id).await {
            warn!(%document_id, %rollback_error, "rollback after failed ingest also failed");
        }

        document.status = DocumentStatus::Failed;
        document.error = Some(format!("{}: {error}", error.wire_kind()));
        document.processed_at = Some(chrono::Utc::now());
        if let Err(insert_error) = self.store.relational().insert_document(document).await {
            warn!(%document_id, %insert_error, "failed to record failed document");
        }
        info!(%document_id, kind = error.wire_kind(), "ingest failed");
    }
}

fn check_cancelled(token: &CancelToken) -> Result<()> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

fn validate_payload(payload: &IngestPayload) -> Result<()> {
    if payload.name.trim().is_empty() {
        return Err(Error::invalid_input("document name must not be empty"));
    }
    if payload.text.trim().is_empty() {
        return Err(Error::invalid_input("document text must not be empty"));
    }
    Ok(())
}
