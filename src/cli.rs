//! CLI definitions.

use clap::{Parser, Subcommand};

/// Qanun - ingest Arabic legal documents and search them semantically.
#[derive(Parser, Debug)]
#[command(name = "qanun")]
#[command(version)]
#[command(about = "Semantic retrieval engine for Arabic legal documents")]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Quiet logging (warnings only).
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server.
    Serve {
        /// Override the configured bind address.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Ingest a plain-text legal document from a file.
    Ingest {
        /// Path to the extracted plain-text file.
        file: String,

        /// Display name for the document.
        #[arg(short, long)]
        name: String,

        /// Document type: law, regulation, or case.
        #[arg(short = 't', long, default_value = "law")]
        doc_type: String,

        /// Jurisdiction code, e.g. SA.
        #[arg(short, long, default_value = "SA")]
        jurisdiction: String,

        /// Issue date (YYYY-MM-DD).
        #[arg(long)]
        issued: Option<String>,
    },

    /// Run a semantic or hybrid search against the local store.
    Search {
        /// Query text.
        query: String,

        /// Maximum number of results.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Similarity threshold.
        #[arg(long)]
        threshold: Option<f32>,

        /// Blend lexical scoring into the ranking.
        #[arg(long, default_value_t = false)]
        hybrid: bool,

        /// Semantic weight for hybrid search, in [0, 1].
        #[arg(short = 'w', long)]
        weight: Option<f32>,
    },

    /// Reconcile a document's vector store state.
    Reconcile {
        /// Document id.
        document_id: String,
    },

    /// Show documents and dual-store agreement.
    Status,
}
