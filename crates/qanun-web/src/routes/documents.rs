//! Document administration endpoints: listing, detail, delete,
//! reconciliation, and store status.

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use qanun_core::Error;
use qanun_core::types::{DocumentId, DocumentRow, DocumentStatus, DocumentType};
use qanun_store::{DualStoreStatus, ReconcileReport};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub document_id: DocumentId,
    pub name: String,
    pub document_type: DocumentType,
    pub jurisdiction: String,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
    pub chunk_count: usize,
    pub error: Option<String>,
}

impl From<DocumentRow> for DocumentSummary {
    fn from(row: DocumentRow) -> Self {
        Self {
            document_id: row.document_id,
            name: row.name,
            document_type: row.doc_type,
            jurisdiction: row.jurisdiction,
            status: row.status,
            uploaded_at: row.uploaded_at,
            chunk_count: row.chunk_count,
            error: row.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub total_results: usize,
    pub documents: Vec<DocumentSummary>,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<DocumentListResponse>> {
    let documents: Vec<DocumentSummary> = state
        .store
        .relational()
        .list_documents()
        .await?
        .into_iter()
        .map(DocumentSummary::from)
        .collect();
    Ok(Json(DocumentListResponse {
        total_results: documents.len(),
        documents,
    }))
}

#[derive(Debug, Serialize)]
pub struct ArticleSummary {
    pub order_index: u32,
    pub number: Option<String>,
    pub title: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SectionSummary {
    pub index: u32,
    pub label: String,
    pub title: Option<String>,
    pub article_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ChapterSummary {
    pub index: u32,
    pub label: String,
    pub title: Option<String>,
    pub section_count: usize,
    pub article_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    pub chapters: Vec<ChapterSummary>,
    pub articles: Vec<ArticleSummary>,
}

fn parse_document_id(raw: &str) -> ApiResult<DocumentId> {
    raw.parse()
        .map_err(|_| ApiError(Error::invalid_input("malformed document id")))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentDetail>> {
    let document_id = parse_document_id(&id)?;
    let relational = state.store.relational();

    let document = relational
        .document(document_id)
        .await?
        .ok_or_else(|| ApiError(Error::not_found("document", document_id.to_string())))?;

    let sections = relational.sections_for_document(document_id).await?;
    let articles = relational.articles_for_document(document_id).await?;
    let chapters = relational
        .chapters_for_document(document_id)
        .await?
        .into_iter()
        .map(|chapter| {
            let section_count = sections
                .iter()
                .filter(|s| s.chapter_id == chapter.chapter_id)
                .count();
            let article_count = articles
                .iter()
                .filter(|a| {
                    use qanun_core::types::ArticleParent;
                    match a.parent {
                        ArticleParent::Chapter(id) => id == chapter.chapter_id,
                        ArticleParent::Section(id) => {
                            sections.iter().any(|s| {
                                s.section_id == id && s.chapter_id == chapter.chapter_id
                            })
                        }
                        ArticleParent::Document => false,
                    }
                })
                .count();
            ChapterSummary {
                index: chapter.index,
                label: chapter.label,
                title: chapter.title,
                section_count,
                article_count,
            }
        })
        .collect();

    let articles = articles
        .into_iter()
        .map(|a| ArticleSummary {
            order_index: a.order_index,
            number: a.number,
            title: a.title,
            warnings: a.warnings,
        })
        .collect();

    Ok(Json(DocumentDetail {
        summary: DocumentSummary::from(document),
        chapters,
        articles,
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub document_id: DocumentId,
    pub deleted: bool,
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let document_id = parse_document_id(&id)?;
    state.coordinator.delete_document(document_id).await?;
    Ok(Json(DeleteResponse {
        document_id,
        deleted: true,
    }))
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub document_id: DocumentId,
    pub replayed: usize,
    pub reinserted: usize,
    pub deleted: usize,
}

pub async fn reconcile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReconcileResponse>> {
    let document_id = parse_document_id(&id)?;
    let ReconcileReport {
        replayed,
        reinserted,
        deleted,
    } = state.coordinator.reconcile(document_id).await?;
    Ok(Json(ReconcileResponse {
        document_id,
        replayed,
        reinserted,
        deleted,
    }))
}

#[derive(Debug, Serialize)]
pub struct StoreStatusResponse {
    pub sql_chunks: usize,
    pub vector_chunks: usize,
    pub divergent_ids_sample: Vec<String>,
}

pub async fn store_status(
    State(state): State<AppState>,
) -> ApiResult<Json<StoreStatusResponse>> {
    let DualStoreStatus {
        sql_chunks,
        vector_chunks,
        divergent_ids_sample,
    } = state.store.status().await?;
    Ok(Json(StoreStatusResponse {
        sql_chunks,
        vector_chunks,
        divergent_ids_sample: divergent_ids_sample
            .into_iter()
            .map(|id| id.to_string())
            .collect(),
    }))
}
