//! Search surface over the dual store: semantic, similar-to-chunk, hybrid,
//! and title suggestions.

pub mod lexical;
pub mod service;
pub mod types;

pub use lexical::{Bm25Index, Bm25Params};
pub use service::SearchService;
pub use types::{
    ArticleContext, ChapterContext, DocumentContext, SearchHit, SearchResponse, SectionContext,
};
