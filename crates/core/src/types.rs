//! Entity types for the legal document hierarchy and its retrieval units.
//!
//! The hierarchy is a strict tree: Document -> Chapters -> Sections ->
//! Articles -> Chunks. Back-references from children to parents are
//! lookup-only; ownership always points downward.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a document.
    DocumentId
);
entity_id!(
    /// Unique identifier for a chapter (الباب).
    ChapterId
);
entity_id!(
    /// Unique identifier for a section (الفصل).
    SectionId
);
entity_id!(
    /// Unique identifier for an article (المادة).
    ArticleId
);
entity_id!(
    /// Unique identifier for a chunk.
    ChunkId
);

/// Kind of legal source a document represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Law,
    Regulation,
    Case,
}

impl DocumentType {
    /// Parse from the lowercase wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "law" => Some(Self::Law),
            "regulation" => Some(Self::Regulation),
            "case" => Some(Self::Case),
            _ => None,
        }
    }

    /// The lowercase wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Law => "law",
            Self::Regulation => "regulation",
            Self::Case => "case",
        }
    }
}

/// Processing lifecycle of a document.
///
/// `Pending` on creation, `Processing` once parsing begins, then a terminal
/// `Processed` or `Failed` (with a preserved error message). Failed documents
/// are retryable: re-ingesting the same content hash replaces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    /// Whether this status still owns its content hash. Failed documents do
    /// not: a re-ingest of the same hash may replace them.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// A persisted document row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRow {
    pub document_id: DocumentId,
    /// SHA-256 hex of the normalized source text; the identity for
    /// duplicate detection.
    pub content_hash: String,
    pub name: String,
    pub doc_type: DocumentType,
    pub jurisdiction: String,
    pub issued_at: Option<NaiveDate>,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    /// Preserved failure message when `status` is `Failed`.
    pub error: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Embedding model identifier all of this document's vectors were
    /// produced with.
    pub vector_model_id: String,
    /// Dimension shared by all of this document's vectors.
    pub vector_dim: usize,
    pub chunk_count: usize,
}

/// A top-level subdivision (الباب).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRow {
    pub chapter_id: ChapterId,
    pub document_id: DocumentId,
    /// 1-based index within the document.
    pub index: u32,
    /// Display label as it appeared in the source, e.g. "الباب الأول".
    pub label: String,
    pub title: Option<String>,
}

/// A second-level subdivision (الفصل).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRow {
    pub section_id: SectionId,
    pub document_id: DocumentId,
    pub chapter_id: ChapterId,
    /// 1-based index within the owning chapter.
    pub index: u32,
    pub label: String,
    pub title: Option<String>,
}

/// The parent an article attaches to.
///
/// Articles under a section attach there; articles under a bare chapter
/// attach to it; "orphan" articles in documents without subdivisions attach
/// to the document directly. Exactly one variant applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleParent {
    Document,
    Chapter(ChapterId),
    Section(SectionId),
}

/// The leaf legal unit (المادة).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRow {
    pub article_id: ArticleId,
    pub document_id: DocumentId,
    pub parent: ArticleParent,
    /// Article number as written, e.g. "الخامسة عشرة" or "15". Kept as a
    /// string since compound Arabic numerals are common.
    pub number: Option<String>,
    pub title: Option<String>,
    pub body: String,
    /// 1-based position in document reading order; monotonically
    /// non-decreasing and stable across re-parses of unchanged content.
    pub order_index: u32,
    /// Parse-time flags such as `duplicate_article_number`.
    pub warnings: Vec<String>,
}

/// Metadata carried by every chunk, in both stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: DocumentId,
    pub article_order_index: u32,
    pub chunk_index: u32,
    pub article_number: Option<String>,
    pub chapter_index: Option<u32>,
    pub section_index: Option<u32>,
}

/// Filter over documents, shared by search and store lookups.
///
/// Unknown filter keys are rejected at the API boundary rather than
/// silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentFilter {
    pub document_id: Option<DocumentId>,
    pub document_type: Option<DocumentType>,
    pub jurisdiction: Option<String>,
}

impl DocumentFilter {
    pub fn is_empty(&self) -> bool {
        self.document_id.is_none() && self.document_type.is_none() && self.jurisdiction.is_none()
    }
}

/// A persisted chunk row (relational side; the vector lives in the vector
/// store keyed by `chunk_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRow {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub article_id: ArticleId,
    /// 0-based index within the owning article.
    pub chunk_index: u32,
    pub text: String,
    pub token_count: usize,
    pub metadata: ChunkMetadata,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_ids_roundtrip_through_strings() {
        let id = ChunkId::new();
        let parsed: ChunkId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_document_type_wire_forms() {
        for s in ["law", "regulation", "case"] {
            assert_eq!(DocumentType::parse(s).unwrap().as_str(), s);
        }
        assert!(DocumentType::parse("treaty").is_none());
    }

    #[test]
    fn test_status_activity() {
        assert!(DocumentStatus::Pending.is_active());
        assert!(DocumentStatus::Processing.is_active());
        assert!(DocumentStatus::Processed.is_active());
        assert!(!DocumentStatus::Failed.is_active());
    }

    #[test]
    fn test_article_parent_serialization() {
        let section = SectionId::new();
        let json = serde_json::to_string(&ArticleParent::Section(section)).unwrap();
        let back: ArticleParent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ArticleParent::Section(section));

        let json = serde_json::to_string(&ArticleParent::Document).unwrap();
        let back: ArticleParent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ArticleParent::Document);
    }
}
