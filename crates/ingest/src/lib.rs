//! Ingest pipeline for Arabic legal documents: chunking plus the
//! parse -> chunk -> embed -> store coordinator.

pub mod chunker;
pub mod coordinator;

pub use chunker::{ChunkDraft, Chunker};
pub use coordinator::{
    CancelHandle, CancelToken, IngestCoordinator, IngestOutcome, IngestPayload, cancellation,
};
