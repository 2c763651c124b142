//! HTTP error mapping.
//!
//! Every engine error carries a stable wire kind; responses are JSON
//! `{error, message}` with the matching status code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use qanun_core::Error;

/// Wrapper turning engine errors into HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub Error);

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput { .. } | Error::Config { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::DuplicateDocument { .. }
            | Error::DimensionMismatch { .. }
            | Error::Cancelled => StatusCode::CONFLICT,
            Error::NoArticlesExtracted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::EmbeddingFailed { .. } => StatusCode::BAD_GATEWAY,
            Error::VectorWriteFailed { .. }
            | Error::RelationalWriteFailed { .. }
            | Error::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.0.wire_kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use qanun_core::types::DocumentId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::invalid_input("x"), StatusCode::BAD_REQUEST),
            (Error::not_found("chunk", "c"), StatusCode::NOT_FOUND),
            (
                Error::duplicate_document("h", DocumentId::new()),
                StatusCode::CONFLICT,
            ),
            (Error::timeout("search", 1), StatusCode::GATEWAY_TIMEOUT),
            (
                Error::no_articles_extracted(DocumentId::new()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (Error::embedding_failed("x"), StatusCode::BAD_GATEWAY),
            (
                Error::vector_write_failed("x"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError(error).status_code(), status);
        }
    }
}
