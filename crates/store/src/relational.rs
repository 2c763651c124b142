//! Relational store trait and the in-memory implementation.
//!
//! The relational side owns documents, chapters, sections, articles, and
//! chunk rows (without vectors). The in-memory implementation backs tests
//! and local runs; [`crate::surreal::SurrealStore`] is the durable one.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use qanun_core::Result;
use qanun_core::types::{
    ArticleId, ArticleRow, ChapterId, ChapterRow, ChunkId, ChunkRow, DocumentFilter, DocumentId,
    DocumentRow, DocumentStatus, SectionId, SectionRow,
};

/// Storage contract for the relational side of the dual store.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn insert_document(&self, document: DocumentRow) -> Result<()>;

    async fn document(&self, id: DocumentId) -> Result<Option<DocumentRow>>;

    async fn document_by_hash(&self, content_hash: &str) -> Result<Option<DocumentRow>>;

    async fn list_documents(&self) -> Result<Vec<DocumentRow>>;

    /// Update lifecycle status; `error` is preserved for failed documents.
    async fn set_document_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
        error: Option<String>,
    ) -> Result<()>;

    /// Terminal success transition: set `processed` plus bookkeeping.
    async fn set_document_processed(&self, id: DocumentId, chunk_count: usize) -> Result<()>;

    async fn insert_chapter(&self, chapter: ChapterRow) -> Result<()>;

    async fn insert_section(&self, section: SectionRow) -> Result<()>;

    async fn insert_article(&self, article: ArticleRow) -> Result<()>;

    async fn insert_chunk(&self, chunk: ChunkRow) -> Result<()>;

    async fn update_chunk_text(
        &self,
        id: ChunkId,
        text: String,
        token_count: usize,
    ) -> Result<()>;

    async fn delete_chunk(&self, id: ChunkId) -> Result<()>;

    async fn chunk(&self, id: ChunkId) -> Result<Option<ChunkRow>>;

    async fn article(&self, id: ArticleId) -> Result<Option<ArticleRow>>;

    async fn chapter(&self, id: ChapterId) -> Result<Option<ChapterRow>>;

    async fn section(&self, id: SectionId) -> Result<Option<SectionRow>>;

    async fn chapters_for_document(&self, id: DocumentId) -> Result<Vec<ChapterRow>>;

    async fn sections_for_document(&self, id: DocumentId) -> Result<Vec<SectionRow>>;

    async fn articles_for_document(&self, id: DocumentId) -> Result<Vec<ArticleRow>>;

    async fn chunks_for_document(&self, id: DocumentId) -> Result<Vec<ChunkRow>>;

    async fn chunk_ids_for_document(&self, id: DocumentId) -> Result<Vec<ChunkId>>;

    async fn all_chunk_ids(&self) -> Result<Vec<ChunkId>>;

    async fn count_chunks(&self) -> Result<usize>;

    /// IDs of processed documents admitted by `filter`. Only processed
    /// documents are visible to search: readers never observe a partially
    /// ingested document.
    async fn documents_matching(&self, filter: &DocumentFilter) -> Result<Vec<DocumentId>>;

    /// Chunk rows of processed documents admitted by `filter`, for lexical
    /// scoring.
    async fn chunks_matching(&self, filter: &DocumentFilter) -> Result<Vec<ChunkRow>>;

    /// All article titles of processed documents, for suggestions.
    async fn article_titles(&self) -> Result<Vec<String>>;

    /// Delete a document and everything it owns, children first.
    async fn delete_document_rows(&self, id: DocumentId) -> Result<()>;
}

#[derive(Default)]
struct Inner {
    documents: HashMap<DocumentId, DocumentRow>,
    chapters: HashMap<ChapterId, ChapterRow>,
    sections: HashMap<SectionId, SectionRow>,
    articles: HashMap<ArticleId, ArticleRow>,
    chunks: HashMap<ChunkId, ChunkRow>,
}

impl Inner {
    fn is_processed(&self, id: DocumentId) -> bool {
        self.documents
            .get(&id)
            .is_some_and(|d| d.status == DocumentStatus::Processed)
    }

    fn admitted(&self, filter: &DocumentFilter) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self
            .documents
            .values()
            .filter(|d| d.status == DocumentStatus::Processed)
            .filter(|d| filter.document_id.is_none_or(|id| d.document_id == id))
            .filter(|d| filter.document_type.is_none_or(|t| d.doc_type == t))
            .filter(|d| {
                filter
                    .jurisdiction
                    .as_ref()
                    .is_none_or(|j| &d.jurisdiction == j)
            })
            .map(|d| d.document_id)
            .collect();
        ids.sort();
        ids
    }
}

/// In-memory relational store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn insert_document(&self, document: DocumentRow) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.documents.insert(document.document_id, document);
        Ok(())
    }

    async fn document(&self, id: DocumentId) -> Result<Option<DocumentRow>> {
        Ok(self.inner.read().await.documents.get(&id).cloned())
    }

    async fn document_by_hash(&self, content_hash: &str) -> Result<Option<DocumentRow>> {
        Ok(self
            .inner
            .read()
            .await
            .documents
            .values()
            .find(|d| d.content_hash == content_hash)
            .cloned())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRow>> {
        let inner = self.inner.read().await;
        let mut documents: Vec<DocumentRow> = inner.documents.values().cloned().collect();
        documents.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(documents)
    }

    async fn set_document_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
        error: Option<String>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(document) = inner.documents.get_mut(&id) {
            document.status = status;
            document.error = error;
            if status == DocumentStatus::Failed {
                document.processed_at = Some(chrono::Utc::now());
            }
        }
        Ok(())
    }

    async fn set_document_processed(&self, id: DocumentId, chunk_count: usize) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(document) = inner.documents.get_mut(&id) {
            document.status = DocumentStatus::Processed;
            document.error = None;
            document.processed_at = Some(chrono::Utc::now());
            document.chunk_count = chunk_count;
        }
        Ok(())
    }

    async fn insert_chapter(&self, chapter: ChapterRow) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.chapters.insert(chapter.chapter_id, chapter);
        Ok(())
    }

    async fn insert_section(&self, section: SectionRow) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.sections.insert(section.section_id, section);
        Ok(())
    }

    async fn insert_article(&self, article: ArticleRow) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.articles.insert(article.article_id, article);
        Ok(())
    }

    async fn insert_chunk(&self, chunk: ChunkRow) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.chunks.insert(chunk.chunk_id, chunk);
        Ok(())
    }

    async fn update_chunk_text(
        &self,
        id: ChunkId,
        text: String,
        token_count: usize,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(chunk) = inner.chunks.get_mut(&id) {
            chunk.text = text;
            chunk.token_count = token_count;
        }
        Ok(())
    }

    async fn delete_chunk(&self, id: ChunkId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.chunks.remove(&id);
        Ok(())
    }

    async fn chunk(&self, id: ChunkId) -> Result<Option<ChunkRow>> {
        Ok(self.inner.read().await.chunks.get(&id).cloned())
    }

    async fn article(&self, id: ArticleId) -> Result<Option<ArticleRow>> {
        Ok(self.inner.read().await.articles.get(&id).cloned())
    }

    async fn chapter(&self, id: ChapterId) -> Result<Option<ChapterRow>> {
        Ok(self.inner.read().await.chapters.get(&id).cloned())
    }

    async fn section(&self, id: SectionId) -> Result<Option<SectionRow>> {
        Ok(self.inner.read().await.sections.get(&id).cloned())
    }

    async fn chapters_for_document(&self, id: DocumentId) -> Result<Vec<ChapterRow>> {
        let inner = self.inner.read().await;
        let mut chapters: Vec<ChapterRow> = inner
            .chapters
            .values()
            .filter(|c| c.document_id == id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.index);
        Ok(chapters)
    }

    async fn sections_for_document(&self, id: DocumentId) -> Result<Vec<SectionRow>> {
        let inner = self.inner.read().await;
        let mut sections: Vec<SectionRow> = inner
            .sections
            .values()
            .filter(|s| s.document_id == id)
            .cloned()
            .collect();
        sections.sort_by_key(|s| s.index);
        Ok(sections)
    }

    async fn articles_for_document(&self, id: DocumentId) -> Result<Vec<ArticleRow>> {
        let inner = self.inner.read().await;
        let mut articles: Vec<ArticleRow> = inner
            .articles
            .values()
            .filter(|a| a.document_id == id)
            .cloned()
            .collect();
        articles.sort_by_key(|a| a.order_index);
        Ok(articles)
    }

    async fn chunks_for_document(&self, id: DocumentId) -> Result<Vec<ChunkRow>> {
        let inner = self.inner.read().await;
        let mut chunks: Vec<ChunkRow> = inner
            .chunks
            .values()
            .filter(|c| c.document_id == id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| (c.metadata.article_order_index, c.chunk_index));
        Ok(chunks)
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
        Ok(self.inner.read().await.chunks.keys().copied().collect())
    }

    async fn count_chunks(&self) -> Result<usize> {
        Ok(self.inner.read().await.chunks.len())
    }

    async fn documents_matching(&self, filter: &DocumentFilter) -> Result<Vec<DocumentId>> {
        Ok(self.inner.read().await.admitted(filter))
    }

    async fn chunks_matching(&self, filter: &DocumentFilter) -> Result<Vec<ChunkRow>> {
        let inner = self.inner.read().await;
        let admitted: std::collections::HashSet<DocumentId> =
            inner.admitted(filter).into_iter().collect();
        let mut chunks: Vec<ChunkRow> = inner
            .chunks
            .values()
            .filter(|c| admitted.contains(&c.document_id))
            .cloned()
            .collect();
        chunks.sort_by_key(|c| {
            (c.document_id, c.metadata.article_order_index, c.chunk_index)
        });
        Ok(chunks)
    }

    async fn article_titles(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let mut titles: Vec<String> = inner
            .articles
            .values()
            .filter(|a| inner.is_processed(a.document_id))
            .filter_map(|a| a.title.clone())
            .collect();
        titles.sort();
        titles.dedup();
        Ok(titles)
    }

    async fn delete_document_rows(&self, id: DocumentId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.chunks.retain(|_, c| c.document_id != id);
        inner.articles.retain(|_, a| a.document_id != id);
        inner.sections.retain(|_, s| s.document_id != id);
        inner.chapters.retain(|_, c| c.document_id != id);
        inner.documents.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use qanun_core::types::{ArticleParent, ChunkMetadata, DocumentType};

    fn document(status: DocumentStatus) -> DocumentRow {
        DocumentRow {
            document_id: DocumentId::new(),
            content_hash: "hash".to_string(),
            name: "نظام العمل".to_string(),
            doc_type: DocumentType::Law,
            jurisdiction: "SA".to_string(),
            issued_at: None,
            uploaded_at: chrono::Utc::now(),
            status,
            error: None,
            processed_at: None,
            vector_model_id: "test".to_string(),
            vector_dim: 64,
            chunk_count: 0,
        }
    }

    fn chunk(document_id: DocumentId, index: u32) -> ChunkRow {
        ChunkRow {
            chunk_id: ChunkId::new(),
            document_id,
            article_id: ArticleId::new(),
            chunk_index: index,
            text: "نص".to_string(),
            token_count: 1,
            metadata: ChunkMetadata {
                document_id,
                article_order_index: 1,
                chunk_index: index,
                article_number: None,
                chapter_index: None,
                section_index: None,
            },
        }
    }

    #[tokio::test]
    async fn test_document_roundtrip_and_hash_lookup() {
        let store = MemoryStore::new();
        let doc = document(DocumentStatus::Pending);
        let id = doc.document_id;
        store.insert_document(doc).await.unwrap();

        assert!(store.document(id).await.unwrap().is_some());
        assert!(store.document_by_hash("hash").await.unwrap().is_some());
        assert!(store.document_by_hash("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_only_processed_documents_are_admitted() {
        let store = MemoryStore::new();
        let pending = document(DocumentStatus::Pending);
        let processed = document(DocumentStatus::Processed);
        let processed_id = processed.document_id;
        store.insert_document(pending).await.unwrap();
        store.insert_document(processed).await.unwrap();

        let admitted = store
            .documents_matching(&DocumentFilter::default())
            .await
            .unwrap();
        assert_eq!(admitted, vec![processed_id]);
    }

    #[tokio::test]
    async fn test_filters_narrow_matches() {
        let store = MemoryStore::new();
        let mut law = document(DocumentStatus::Processed);
        law.jurisdiction = "SA".to_string();
        let mut case = document(DocumentStatus::Processed);
        case.doc_type = DocumentType::Case;
        case.jurisdiction = "AE".to_string();
        let law_id = law.document_id;
        store.insert_document(law).await.unwrap();
        store.insert_document(case).await.unwrap();

        let filter = DocumentFilter {
            document_type: Some(DocumentType::Law),
            ..DocumentFilter::default()
        };
        assert_eq!(store.documents_matching(&filter).await.unwrap(), vec![law_id]);

        let filter = DocumentFilter {
            jurisdiction: Some("AE".to_string()),
            ..DocumentFilter::default()
        };
        assert_eq!(store.documents_matching(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_document_rows_cascades() {
        let store = MemoryStore::new();
        let doc = document(DocumentStatus::Processed);
        let id = doc.document_id;
        store.insert_document(doc).await.unwrap();

        let article = ArticleRow {
            article_id: ArticleId::new(),
            document_id: id,
            parent: ArticleParent::Document,
            number: Some("1".to_string()),
            title: None,
            body: "نص".to_string(),
            order_index: 1,
            warnings: Vec::new(),
        };
        store.insert_article(article).await.unwrap();
        store.insert_chunk(chunk(id, 0)).await.unwrap();
        store.insert_chunk(chunk(id, 1)).await.unwrap();

        store.delete_document_rows(id).await.unwrap();
        assert!(store.document(id).await.unwrap().is_none());
        assert_eq!(store.count_chunks().await.unwrap(), 0);
        assert!(store.articles_for_document(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chunks_for_document_in_reading_order() {
        let store = MemoryStore::new();
        let doc = document(DocumentStatus::Processed);
        let id = doc.document_id;
        store.insert_document(doc).await.unwrap();
        store.insert_chunk(chunk(id, 1)).await.unwrap();
        store.insert_chunk(chunk(id, 0)).await.unwrap();

        let chunks = store.chunks_for_document(id).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].chunk_index < chunks[1].chunk_index);
    }
}
