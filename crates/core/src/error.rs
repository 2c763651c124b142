//! Error types for Qanun operations.
//!
//! All errors are explicit and typed. Each variant maps to a stable
//! snake_case wire kind carried in API responses, so callers can branch on
//! `wire_kind()` without matching on Rust types.

use thiserror::Error;

use crate::types::DocumentId;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Qanun operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed payload, empty document text, or an unsupported filter key.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// An ingest targeted a content hash that already has an active document.
    #[error("duplicate document: content hash {content_hash} already ingested as {existing_id}")]
    DuplicateDocument {
        content_hash: String,
        existing_id: DocumentId,
    },

    /// The parser ran to completion but produced zero articles.
    #[error("no articles extracted from document {document_id}")]
    NoArticlesExtracted { document_id: DocumentId },

    /// The embedding backend errored for a batch or item.
    #[error("embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    /// A vector-store write or delete failed.
    #[error("vector store write failed: {reason}")]
    VectorWriteFailed { reason: String },

    /// A relational-store write failed.
    #[error("relational store write failed: {reason}")]
    RelationalWriteFailed { reason: String },

    /// A vector's dimension differs from the document's established one.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The ingest was cancelled via its cancellation signal.
    #[error("operation cancelled")]
    Cancelled,

    /// Lookup for a missing chunk, document, or other entity.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Storage backend failure outside the write paths (connect, query).
    #[error("store error: {reason}")]
    Store { reason: String },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl Error {
    /// Create an invalid-input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a duplicate-document error.
    pub fn duplicate_document(content_hash: impl Into<String>, existing_id: DocumentId) -> Self {
        Self::DuplicateDocument {
            content_hash: content_hash.into(),
            existing_id,
        }
    }

    /// Create a no-articles-extracted error.
    pub fn no_articles_extracted(document_id: DocumentId) -> Self {
        Self::NoArticlesExtracted { document_id }
    }

    /// Create an embedding-failed error.
    pub fn embedding_failed(reason: impl Into<String>) -> Self {
        Self::EmbeddingFailed {
            reason: reason.into(),
        }
    }

    /// Create a vector-write-failed error.
    pub fn vector_write_failed(reason: impl Into<String>) -> Self {
        Self::VectorWriteFailed {
            reason: reason.into(),
        }
    }

    /// Create a relational-write-failed error.
    pub fn relational_write_failed(reason: impl Into<String>) -> Self {
        Self::RelationalWriteFailed {
            reason: reason.into(),
        }
    }

    /// Create a dimension-mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create a store error.
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Stable snake_case kind carried on the wire.
    pub fn wire_kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::DuplicateDocument { .. } => "duplicate_document",
            Self::NoArticlesExtracted { .. } => "no_articles_extracted",
            Self::EmbeddingFailed { .. } => "embedding_failed",
            Self::VectorWriteFailed { .. } => "vector_write_failed",
            Self::RelationalWriteFailed { .. } => "relational_write_failed",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::NotFound { .. } => "not_found",
            Self::Store { .. } => "store_error",
            Self::Config { .. } => "invalid_config",
        }
    }

    /// Whether a retry of the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingFailed { .. }
                | Self::VectorWriteFailed { .. }
                | Self::RelationalWriteFailed { .. }
                | Self::Timeout { .. }
                | Self::Store { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_wire_kinds_are_stable() {
        let id = DocumentId::new();
        let cases = [
            (Error::invalid_input("bad"), "invalid_input"),
            (Error::duplicate_document("abc", id), "duplicate_document"),
            (Error::no_articles_extracted(id), "no_articles_extracted"),
            (Error::embedding_failed("x"), "embedding_failed"),
            (Error::vector_write_failed("x"), "vector_write_failed"),
            (Error::relational_write_failed("x"), "relational_write_failed"),
            (Error::dimension_mismatch(256, 768), "dimension_mismatch"),
            (Error::timeout("embed", 30_000), "timeout"),
            (Error::Cancelled, "cancelled"),
            (Error::not_found("chunk", "c1"), "not_found"),
            (Error::store("down"), "store_error"),
            (Error::config("bad ttl"), "invalid_config"),
        ];
        for (error, kind) in cases {
            assert_eq!(error.wire_kind(), kind);
        }
    }

    #[test]
    fn test_display_carries_context() {
        let error = Error::dimension_mismatch(256, 768);
        let text = error.to_string();
        assert!(text.contains("256"));
        assert!(text.contains("768"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::embedding_failed("io").is_transient());
        assert!(Error::timeout("search", 10_000).is_transient());
        assert!(!Error::invalid_input("bad").is_transient());
        assert!(!Error::Cancelled.is_transient());
    }
}
