//! Command execution: wire the engine together and run one subcommand.

use std::sync::Arc;

use anyhow::{Context, Result, bail};

use qanun_core::EngineConfig;
use qanun_core::types::{DocumentFilter, DocumentType};
use qanun_embedding::{EmbeddingService, embedder_from_config};
use qanun_ingest::{IngestCoordinator, IngestPayload};
use qanun_search::SearchService;
use qanun_store::{DualStore, MemoryVectorStore, relational_from_config};
use qanun_web::AppState;

use crate::cli::{Cli, Commands};

struct Engine {
    config: EngineConfig,
    store: Arc<DualStore>,
    coordinator: Arc<IngestCoordinator>,
    search: Arc<SearchService>,
}

async fn build_engine(config_path: Option<&str>) -> Result<Engine> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.validate()?;

    let relational = relational_from_config(&config.storage).await?;
    let vector = Arc::new(MemoryVectorStore::new());
    let store = Arc::new(DualStore::new(relational, vector));

    let embedder = embedder_from_config(&config.embedding)?;
    let embedding = EmbeddingService::new(embedder, config.embedding.clone());

    let coordinator = Arc::new(IngestCoordinator::new(
        store.clone(),
        embedding.clone(),
        config.clone(),
    ));
    let search = Arc::new(SearchService::new(
        store.clone(),
        embedding,
        config.search.clone(),
    ));

    Ok(Engine {
        config,
        store,
        coordinator,
        search,
    })
}

pub async fn execute(cli: Cli) -> Result<()> {
    let engine = build_engine(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind_addr = bind.unwrap_or_else(|| engine.config.server.bind_addr.clone());
            let state = AppState::new(
                engine.coordinator.clone(),
                engine.search.clone(),
                engine.store.clone(),
            );
            qanun_web::serve(state, &bind_addr).await?;
        }

        Commands::Ingest {
            file,
            name,
            doc_type,
            jurisdiction,
            issued,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read '{file}'"))?;
            let doc_type = DocumentType::parse(&doc_type)
                .with_context(|| format!("unknown document type '{doc_type}'"))?;
            let issued_at = issued
                .map(|raw| {
                    raw.parse()
                        .with_context(|| format!("invalid issue date '{raw}'"))
                })
                .transpose()?;

            let outcome = engine
                .coordinator
                .ingest(IngestPayload {
                    name,
                    doc_type,
                    jurisdiction,
                    issued_at,
                    text,
                })
                .await?;

            println!(
                "document {} ingested: {} chunks",
                outcome.document_id, outcome.chunks_created
            );
            for diagnostic in &outcome.diagnostics {
                println!(
                    "  line {}: {} ({})",
                    diagnostic.line_no, diagnostic.kind, diagnostic.detail
                );
            }
        }

        Commands::Search {
            query,
            top_k,
            threshold,
            hybrid,
            weight,
        } => {
            let filter = DocumentFilter::default();
            let response = if hybrid {
                engine
                    .search
                    .hybrid_search(&query, top_k, weight, &filter)
                    .await?
            } else {
                engine
                    .search
                    .semantic_search(&query, top_k, threshold, &filter)
                    .await?
            };

            println!(
                "{} results for '{}' (threshold {})",
                response.total_results, response.normalized_query, response.threshold
            );
            for hit in &response.hits {
                let article = hit
                    .article
                    .number
                    .clone()
                    .unwrap_or_else(|| hit.article.order_index.to_string());
                println!(
                    "  [{:.3}] {} / المادة {}: {}",
                    hit.similarity,
                    hit.document.name,
                    article,
                    snippet(&hit.content, 80)
                );
            }
        }

        Commands::Reconcile { document_id } => {
            let document_id = document_id
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid document id '{document_id}'"))?;
            let report = engine.coordinator.reconcile(document_id).await?;
            println!(
                "reconciled {document_id}: {} replayed, {} reinserted, {} strays deleted",
                report.replayed, report.reinserted, report.deleted
            );
        }

        Commands::Status => {
            let documents = engine.store.relational().list_documents().await?;
            if documents.is_empty() {
                println!("no documents");
            }
            for document in &documents {
                println!(
                    "{}  {:<12}  {:>4} chunks  {}",
                    document.document_id,
                    format!("{:?}", document.status).to_lowercase(),
                    document.chunk_count,
                    document.name
                );
            }

            let status = engine.store.status().await?;
            println!(
                "store: {} sql chunks, {} vectors, {} divergent",
                status.sql_chunks,
                status.vector_chunks,
                status.divergent_ids_sample.len()
            );
            if !status.divergent_ids_sample.is_empty() {
                bail!("stores diverge; run reconcile");
            }
        }
    }

    Ok(())
}

fn snippet(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}
