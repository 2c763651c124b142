//! SurrealDB-backed relational store.
//!
//! Uses the embedded engines (`mem://` for dev and tests, `rocksdb://` for
//! durable deployments). Record ids mirror the entity UUIDs; ownership
//! cascades are explicit deletes in dependency order, children first.

use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

use qanun_core::config::{StorageConfig, StorageEngine};
use qanun_core::types::{
    ArticleId, ArticleRow, ChapterId, ChapterRow, ChunkId, ChunkRow, DocumentFilter, DocumentId,
    DocumentRow, DocumentStatus, SectionId, SectionRow,
};
use qanun_core::{Error, Result};

use crate::relational::RelationalStore;

const DOCUMENTS: &str = "documents";
const CHAPTERS: &str = "chapters";
const SECTIONS: &str = "sections";
const ARTICLES: &str = "articles";
const CHUNKS: &str = "chunks";

/// Relational store over an embedded SurrealDB instance.
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    /// Connect per the storage configuration and select the namespace and
    /// database.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let endpoint = match &config.backend {
            StorageEngine::Memory => "mem://".to_string(),
            StorageEngine::Rocksdb { path } => format!("rocksdb://{path}"),
        };

        let db = surrealdb::engine::any::connect(endpoint)
            .await
            .map_err(|e| Error::store(format!("failed to open storage: {e}")))?;
        db.use_ns(config.namespace.clone())
            .use_db(config.database.clone())
            .await
            .map_err(|e| Error::store(format!("failed to select namespace/database: {e}")))?;

        Ok(Self { db })
    }

    async fn create<T>(&self, table: &'static str, id: String, row: T) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        let _: Option<T> = self
            .db
            .create((table, id))
            .content(row)
            .await
            .map_err(|e| Error::store(format!("create in {table} failed: {e}")))?;
        Ok(())
    }

    async fn select_one<T>(&self, table: &'static str, id: String) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned + Send + Sync,
    {
        self.db
            .select((table, id))
            .await
            .map_err(|e| Error::store(format!("select from {table} failed: {e}")))
    }

    async fn select_owned<T>(&self, table: &'static str, document_id: DocumentId) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned + Send + Sync,
    {
        let mut response = self
            .db
            .query(format!("SELECT * FROM {table} WHERE document_id = $document_id"))
            .bind(("document_id", document_id.to_string()))
            .await
            .map_err(|e| Error::store(format!("query on {table} failed: {e}")))?;
        response
            .take(0)
            .map_err(|e| Error::store(format!("decode from {table} failed: {e}")))
    }

    async fn processed_documents(&self) -> Result<Vec<DocumentRow>> {
        let mut response = self
            .db
            .query("SELECT * FROM documents WHERE status = $status")
            .bind(("status", "processed".to_string()))
            .await
            .map_err(|e| Error::store(format!("query on documents failed: {e}")))?;
        response
            .take(0)
            .map_err(|e| Error::store(format!("decode from documents failed: {e}")))
    }
}

#[derive(Deserialize)]
struct CountRow {
    count: usize,
}

#[derive(Deserialize)]
struct ChunkIdRow {
    chunk_id: ChunkId,
}

fn admits(filter: &DocumentFilter, document: &DocumentRow) -> bool {
    filter
        .document_id
        .is_none_or(|id| document.document_id == id)
        && filter.document_type.is_none_or(|t| document.doc_type == t)
        && filter
            .jurisdiction
            .as_ref()
            .is_none_or(|j| &document.jurisdiction == j)
}

#[async_trait]
impl RelationalStore for SurrealStore {
    async fn insert_document(&self, document: DocumentRow) -> Result<()> {
        let id = document.document_id.to_string();
        self.create(DOCUMENTS, id, document).await
    }

    async fn document(&self, id: DocumentId) -> Result<Option<DocumentRow>> {
        self.select_one(DOCUMENTS, id.to_string()).await
    }

    async fn document_by_hash(&self, content_hash: &str) -> Result<Option<DocumentRow>> {
        let mut response = self
            .db
            .query("SELECT * FROM documents WHERE content_hash = $content_hash LIMIT 1")
            .bind(("content_hash", content_hash.to_string()))
            .await
            .map_err(|e| Error::store(format!("hash lookup failed: {e}")))?;
        let rows: Vec<DocumentRow> = response
            .take(0)
            .map_err(|e| Error::store(format!("decode from documents failed: {e}")))?;
        Ok(rows.into_iter().next())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRow>> {
        let mut response = self
            .db
            .query("SELECT * FROM documents")
            .await
            .map_err(|e| Error::store(format!("query on documents failed: {e}")))?;
        let mut rows: Vec<DocumentRow> = response
            .take(0)
            .map_err(|e| Error::store(format!("decode from documents failed: {e}")))?;
        rows.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(rows)
    }

    async fn set_document_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
        error: Option<String>,
    ) -> Result<()> {
        let statement = if status == DocumentStatus::Failed {
            "UPDATE type::thing('documents', $id) SET status = $status, error = $error, processed_at = $processed_at"
        } else {
            "UPDATE type::thing('documents', $id) SET status = $status, error = $error"
        };
        self.db
            .query(statement)
            .bind(("id", id.to_string()))
            .bind(("status", status))
            .bind(("error", error))
            .bind(("processed_at", chrono::Utc::now()))
            .await
            .map_err(|e| Error::store(format!("status update failed: {e}")))?
            .check()
            .map_err(|e| Error::store(format!("status update failed: {e}")))?;
        Ok(())
    }

    async fn set_document_processed(&self, id: DocumentId, chunk_count: usize) -> Result<()> {
        self.db
            .query(
                "UPDATE type::thing('documents', $id) SET status = $status, error = NONE, \
                 processed_at = $processed_at, chunk_count = $chunk_count",
            )
            .bind(("id", id.to_string()))
            .bind(("status", DocumentStatus::Processed))
            .bind(("processed_at", chrono::Utc::now()))
            .bind(("chunk_count", chunk_count))
            .await
            .map_err(|e| Error::store(format!("processed update failed: {e}")))?
            .check()
            .map_err(|e| Error::store(format!("processed update failed: {e}")))?;
        Ok(())
    }

    async fn insert_chapter(&self, chapter: ChapterRow) -> Result<()> {
        let id = chapter.chapter_id.to_string();
        self.create(CHAPTERS, id, chapter).await
    }

    async fn insert_section(&self, section: SectionRow) -> Result<()> {
        let id = section.section_id.to_string();
        self.create(SECTIONS, id, section).await
    }

    async fn insert_article(&self, article: ArticleRow) -> Result<()> {
        let id = article.article_id.to_string();
        self.create(ARTICLES, id, article).await
    }

    async fn insert_chunk(&self, chunk: ChunkRow) -> Result<()> {
        let id = chunk.chunk_id.to_string();
        self.create(CHUNKS, id, chunk).await
    }

    async fn update_chunk_text(
        &self,
        id: ChunkId,
        text: String,
        token_count: usize,
    ) -> Result<()> {
        self.db
            .query(
                "UPDATE type::thing('chunks', $id) SET text = $text, token_count = $token_count",
            )
            .bind(("id", id.to_string()))
            .bind(("text", text))
            .bind(("token_count", token_count))
            .await
            .map_err(|e| Error::store(format!("chunk update failed: {e}")))?
            .check()
            .map_err(|e| Error::store(format!("chunk update failed: {e}")))?;
        Ok(())
    }

    async fn delete_chunk(&self, id: ChunkId) -> Result<()> {
        let _: Option<ChunkRow> = self
            .db
            .delete((CHUNKS, id.to_string()))
            .await
            .map_err(|e| Error::store(format!("chunk delete failed: {e}")))?;
        Ok(())
    }

    async fn chunk(&self, id: ChunkId) -> Result<Option<ChunkRow>> {
        self.select_one(CHUNKS, id.to_string()).await
    }

    async fn article(&self, id: ArticleId) -> Result<Option<ArticleRow>> {
        self.select_one(ARTICLES, id.to_string()).await
    }

    async fn chapter(&self, id: ChapterId) -> Result<Option<ChapterRow>> {
        self.select_one(CHAPTERS, id.to_string()).await
    }

    async fn section(&self, id: SectionId) -> Result<Option<SectionRow>> {
        self.select_one(SECTIONS, id.to_string()).await
    }

    async fn chapters_for_document(&self, id: DocumentId) -> Result<Vec<ChapterRow>> {
        let mut rows: Vec<ChapterRow> = self.select_owned(CHAPTERS, id).await?;
        rows.sort_by_key(|c| c.index);
        Ok(rows)
    }

    async fn sections_for_document(&self, id: DocumentId) -> Result<Vec<SectionRow>> {
        let mut rows: Vec<SectionRow> = self.select_owned(SECTIONS, id).await?;
        rows.sort_by_key(|s| s.index);
        Ok(rows)
    }

    async fn articles_for_document(&self, id: DocumentId) -> Result<Vec<ArticleRow>> {
        let mut rows: Vec<ArticleRow> = self.select_owned(ARTICLES, id).await?;
        rows.sort_by_key(|a| a.order_index);
        Ok(rows)
    }

    async fn chunks_for_document(&self, id: DocumentId) -> Result<Vec<ChunkRow>> {
        let mut rows: Vec<ChunkRow> = self.select_owned(CHUNKS, id).await?;
        rows.sort_by_key(|c| (c.metadata.article_order_index, c.chunk_index));
        Ok(rows)
    }

    async fn chunk_ids_for_document(&self, id: DocumentId) -> Result<Vec<ChunkId>> {
        Ok(self
            .chunks_for_document(id)
            .await?
            .into_iter()
            .map(|c| c.chunk_id)
            .collect())
    }

    async fn all_chunk_ids(&self) -> Result<Vec<ChunkId>> {
        let mut response = self
            .db
            .query("SELECT chunk_id FROM chunks")
            .await
            .map_err(|e| Error::store(format!("query on chunks failed: {e}")))?;
        let rows: Vec<ChunkIdRow> = response
            .take(0)
            .map_err(|e| Error::store(format!("decode from chunks failed: {e}")))?;
        Ok(rows.into_iter().map(|r| r.chunk_id).collect())
    }

    async fn count_chunks(&self) -> Result<usize> {
        let mut response = self
            .db
            .query("SELECT count() FROM chunks GROUP ALL")
            .await
            .map_err(|e| Error::store(format!("count on chunks failed: {e}")))?;
        let rows: Vec<CountRow> = response
            .take(0)
            .map_err(|e| Error::store(format!("decode count failed: {e}")))?;
        Ok(rows.first().map_or(0, |r| r.count))
    }

    async fn documents_matching(&self, filter: &DocumentFilter) -> Result<Vec<DocumentId>> {
        let mut ids: Vec<DocumentId> = self
            .processed_documents()
            .await?
            .into_iter()
            .filter(|d| admits(filter, d))
            .map(|d| d.document_id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn chunks_matching(&self, filter: &DocumentFilter) -> Result<Vec<ChunkRow>> {
        let mut chunks = Vec::new();
        for document_id in self.documents_matching(filter).await? {
            chunks.extend(self.chunks_for_document(document_id).await?);
        }
        Ok(chunks)
    }

    async fn article_titles(&self) -> Result<Vec<String>> {
        let mut titles = Vec::new();
        for document in self.processed_documents().await? {
            for article in self.articles_for_document(document.document_id).await? {
                if let Some(title) = article.title {
                    titles.push(title);
                }
            }
        }
        titles.sort();
        titles.dedup();
        Ok(titles)
    }

    async fn delete_document_rows(&self, id: DocumentId) -> Result<()> {
        self.db
            .query(
                "DELETE FROM chunks WHERE document_id = $document_id; \
                 DELETE FROM articles WHERE document_id = $document_id; \
                 DELETE FROM sections WHERE document_id = $document_id; \
                 DELETE FROM chapters WHERE document_id = $document_id; \
                 DELETE type::thing('documents', $document_id);",
            )
            .bind(("document_id", id.to_string()))
            .await
            .map_err(|e| Error::store(format!("cascade delete failed: {e}")))?
            .check()
            .map_err(|e| Error::store(format!("cascade delete failed: {e}")))?;
        Ok(())
    }
}
