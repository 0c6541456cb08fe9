use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use support_rag::core::config::service::redacted;
use support_rag::core::config::validation::validate_settings;
use support_rag::core::config::{AppPaths, ConfigService};
use support_rag::core::logging;
use support_rag::llm::build_embedding_provider;
use support_rag::rag::{
    build_index, load_documents, Chunker, EmbeddingClient, IngestionPipeline, RetryPolicy,
};

#[derive(Parser, Debug)]
#[command(
    name = "ingest",
    about = "Chunk, embed and upsert scraped support documents into the vector index"
)]
struct IngestCli {
    /// JSON array or JSON-lines file of {url, title, content} documents
    #[arg(long, env = "INGEST_DOCUMENTS")]
    documents: PathBuf,

    /// Chunks embedded and upserted together (overrides ingest.batch_size)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Largest chunk in characters (overrides ingest.max_chunk_size)
    #[arg(long)]
    max_chunk_size: Option<usize>,

    /// Chunk and report counts without calling any provider
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = IngestCli::parse();

    let paths = Arc::new(AppPaths::new());
    logging::init(&paths, "ingest.log");

    if let Err(err) = run(cli, paths).await {
        tracing::error!("Ingestion failed: {:#}", err);
        return Err(err);
    }
    Ok(())
}

async fn run(cli: IngestCli, paths: Arc<AppPaths>) -> Result<()> {
    let config = ConfigService::new(paths);
    let mut settings = config
        .load()
        .with_context(|| format!("Failed to load {}", config.config_path().display()))?;
    if let Some(batch_size) = cli.batch_size {
        settings.ingest.batch_size = batch_size;
    }
    if let Some(max_chunk_size) = cli.max_chunk_size {
        settings.ingest.max_chunk_size = max_chunk_size;
    }
    validate_settings(&settings)?;
    tracing::info!("Settings: {}", redacted(&settings));

    let documents = load_documents(&cli.documents)?;
    if documents.is_empty() {
        bail!("no documents to ingest in {}", cli.documents.display());
    }
    tracing::info!("Read {} documents from {}", documents.len(), cli.documents.display());

    let ingest = &settings.ingest;
    let chunker = Chunker::new(ingest.min_chunk_size);

    if cli.dry_run {
        let mut total = 0usize;
        let mut empty = 0usize;
        for document in &documents {
            let chunks = chunker.chunk(document, ingest.max_chunk_size);
            if chunks.is_empty() {
                empty += 1;
                tracing::warn!("Document {} produced no chunks", document.url);
            }
            total += chunks.len();
        }
        tracing::info!(
            "Dry run: {} documents, {} without chunks, {} chunks in batches of {}",
            documents.len(),
            empty,
            total,
            ingest.batch_size
        );
        return Ok(());
    }

    let embedder = build_embedding_provider(&settings.embedding)?;
    let embeddings = EmbeddingClient::new(embedder, &settings.embedding);
    let index = build_index(&settings.index).await?;

    let pipeline = IngestionPipeline::new(chunker, embeddings, index.clone(), ingest.max_chunk_size)
        .with_rate_limit(ingest.requests_per_minute);
    let report = pipeline
        .run(
            &documents,
            ingest.batch_size,
            &RetryPolicy::exponential(ingest.max_retries),
        )
        .await?;

    tracing::info!(
        "Ingestion complete: {} documents read, {} without chunks, {} of {} chunks stored in {} batches",
        report.documents,
        report.empty_documents,
        report.chunks_stored,
        report.chunks_total,
        report.batches
    );
    if let Ok(Some(count)) = index.count().await {
        tracing::info!("{} index now holds {} entries", index.name(), count);
    }

    Ok(())
}
