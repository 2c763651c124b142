//! Ingest endpoint.

use axum::Json;
use axum::extract::State;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use qanun_core::Error;
use qanun_core::types::{DocumentId, DocumentStatus, DocumentType};
use qanun_ingest::IngestPayload;
use qanun_parser::hierarchy::Diagnostic;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IngestRequest {
    name: String,
    document_type: String,
    jurisdiction: String,
    issue_date: Option<NaiveDate>,
    text: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub document_id: DocumentId,
    pub status: DocumentStatus,
    pub chunks_created: usize,
    pub diagnostics: Vec<Diagnostic>,
}

pub async fn ingest_document(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<IngestResponse>> {
    let request: IngestRequest = serde_json::from_value(body)
        .map_err(|e| ApiError(Error::invalid_input(format!("malformed request: {e}"))))?;

    let doc_type = DocumentType::parse(&request.document_type).ok_or_else(|| {
        ApiError(Error::invalid_input(format!(
            "unknown document_type '{}'",
            request.document_type
        )))
    })?;

    let outcome = state
        .coordinator
        .ingest(IngestPayload {
            name: request.name,
            doc_type,
            jurisdiction: request.jurisdiction,
            issued_at: request.issue_date,
            text: request.text,
        })
        .await?;

    Ok(Json(IngestResponse {
        document_id: outcome.document_id,
        status: outcome.status,
        chunks_created: outcome.chunks_created,
        diagnostics: outcome.diagnostics,
    }))
}
