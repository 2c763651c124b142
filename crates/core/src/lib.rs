//! Core types, errors, configuration, and content hashing shared across the
//! Qanun workspace.
//!
//! Everything here is plain data: the ingest pipeline, stores, and search
//! service in the sibling crates build on these definitions.

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::EngineConfig;
pub use error::{Error, Result};
