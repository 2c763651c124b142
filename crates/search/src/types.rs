//! Search hit and response shapes.
//!
//! Every hit is enriched with its article and document context; absent
//! parents (orphan articles, chapterless sections) are `null` rather than
//! omitted.

use serde::{Deserialize, Serialize};

use qanun_core::types::{
    ArticleId, ArticleRow, ChapterRow, ChunkId, DocumentId, DocumentRow, DocumentType, SectionRow,
};

/// Document context attached to a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentContext {
    pub document_id: DocumentId,
    pub name: String,
    pub doc_type: DocumentType,
    pub jurisdiction: String,
}

impl From<&DocumentRow> for DocumentContext {
    fn from(row: &DocumentRow) -> Self {
        Self {
            document_id: row.document_id,
            name: row.name.clone(),
            doc_type: row.doc_type,
            jurisdiction: row.jurisdiction.clone(),
        }
    }
}

/// Chapter context attached to a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterContext {
    pub index: u32,
    pub label: String,
    pub title: Option<String>,
}

impl From<&ChapterRow> for ChapterContext {
    fn from(row: &ChapterRow) -> Self {
        Self {
            index: row.index,
            label: row.label.clone(),
            title: row.title.clone(),
        }
    }
}

/// Section context attached to a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionContext {
    pub index: u32,
    pub label: String,
    pub title: Option<String>,
}

impl From<&SectionRow> for SectionContext {
    fn from(row: &SectionRow) -> Self {
        Self {
            index: row.index,
            label: row.label.clone(),
            title: row.title.clone(),
        }
    }
}

/// Article context attached to a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleContext {
    pub article_id: ArticleId,
    pub number: Option<String>,
    pub title: Option<String>,
    pub order_index: u32,
}

impl From<&ArticleRow> for ArticleContext {
    fn from(row: &ArticleRow) -> Self {
        Self {
            article_id: row.article_id,
            number: row.number.clone(),
            title: row.title.clone(),
            order_index: row.order_index,
        }
    }
}

/// One enriched search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    pub content: String,
    pub similarity: f32,
    pub document: DocumentContext,
    pub chapter: Option<ChapterContext>,
    pub section: Option<SectionContext>,
    pub article: ArticleContext,
    #[serde(skip)]
    pub chunk_index: u32,
}

/// A full search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total_results: usize,
    pub threshold: f32,
    pub normalized_query: String,
    pub hits: Vec<SearchHit>,
}
