use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_rag_core::{
    discover_pdf_files, load_documents, AgentOptions, CharacterNgramEmbedder, Embedder,
    IngestionOptions, OpenAiChatModel, OpenAiEmbedder, QueryResponse, RagConfig, RagPipeline,
    RetrievalOptions, RetryPolicy,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the persisted vector index
    #[arg(long, env = "PDF_RAG_INDEX_DIR", default_value = "vector_index")]
    index_dir: PathBuf,

    /// Maximum characters per chunk
    #[arg(long, env = "PDF_RAG_CHUNK_SIZE", default_value = "1000")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "PDF_RAG_CHUNK_OVERLAP", default_value = "200")]
    chunk_overlap: usize,

    /// Chunks returned per retrieval
    #[arg(long, env = "PDF_RAG_TOP_K", default_value = "4")]
    top_k: usize,

    /// Drop retrieved chunks scoring below this similarity
    #[arg(long, env = "PDF_RAG_MIN_SCORE")]
    min_score: Option<f32>,

    /// Embedding backend
    #[arg(long, env = "PDF_RAG_EMBEDDER", value_enum, default_value_t = EmbedderKind::Trigram)]
    embedder: EmbedderKind,

    /// Embedding model when using the OpenAI embedder
    #[arg(long, env = "PDF_RAG_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Vector size produced by the embedding model
    #[arg(long, env = "PDF_RAG_EMBEDDING_DIMENSIONS", default_value = "1536")]
    embedding_dimensions: usize,

    /// Chat model identifier
    #[arg(long, env = "PDF_RAG_MODEL", default_value = "gpt-3.5-turbo")]
    model: String,

    /// Sampling temperature
    #[arg(long, env = "PDF_RAG_TEMPERATURE", default_value = "0")]
    temperature: f32,

    /// Model turns allowed per question
    #[arg(long, env = "PDF_RAG_MAX_STEPS", default_value = "15")]
    max_steps: usize,

    /// Attempts per question when the backend is rate-limited
    #[arg(long, env = "PDF_RAG_MAX_ATTEMPTS", default_value = "5")]
    max_attempts: u32,

    /// First backoff delay in milliseconds
    #[arg(long, env = "PDF_RAG_INITIAL_BACKOFF_MS", default_value = "1000")]
    initial_backoff_ms: u64,

    /// Factor applied to the delay after every failed attempt
    #[arg(long, env = "PDF_RAG_BACKOFF_MULTIPLIER", default_value = "2")]
    backoff_multiplier: u32,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    /// API key for the model backend
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Offline character-trigram hashing
    Trigram,
    /// OpenAI-compatible embeddings endpoint
    Openai,
}

#[derive(Subcommand)]
enum Command {
    /// Build a fresh index from PDFs, replacing any previous one.
    Ingest {
        /// PDF files, in upload order.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Folder searched recursively for PDFs.
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Ask a question answered from the ingested documents.
    Ask {
        /// Question text
        #[arg(long)]
        question: String,
    },
    /// Show the chunks retrieved for a query, without the model.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
    },
}

impl Cli {
    fn rag_config(&self) -> RagConfig {
        RagConfig {
            index_dir: self.index_dir.clone(),
            ingestion: IngestionOptions {
                chunk_max_chars: self.chunk_size,
                chunk_overlap_chars: self.chunk_overlap,
            },
            retrieval: RetrievalOptions {
                top_k: self.top_k,
                min_score: self.min_score,
                ..RetrievalOptions::default()
            },
            agent: AgentOptions {
                model: self.model.clone(),
                temperature: self.temperature,
                max_steps: self.max_steps,
            },
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                initial_delay: Duration::from_millis(self.initial_backoff_ms),
                multiplier: self.backoff_multiplier,
            },
        }
    }

    fn embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        Ok(match self.embedder {
            EmbedderKind::Trigram => Arc::new(CharacterNgramEmbedder::default()),
            EmbedderKind::Openai => Arc::new(OpenAiEmbedder::new(
                &self.openai_base_url,
                self.openai_api_key.clone(),
                self.embedding_model.clone(),
                self.embedding_dimensions,
            )?),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.rag_config();
    let model = OpenAiChatModel::new(
        &cli.openai_base_url,
        cli.openai_api_key.clone(),
        config.agent.model.clone(),
        config.agent.temperature,
    )?;
    let pipeline = RagPipeline::new(config, cli.embedder()?, model);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        index_dir = %cli.index_dir.display(),
        "pdf-rag boot"
    );

    match cli.command {
        Command::Ingest { mut files, folder } => {
            if let Some(folder) = folder {
                files.extend(discover_pdf_files(&folder));
            }

            let documents =
                load_documents(&files).map_err(|error| anyhow::anyhow!(error.user_message()))?;
            let report = pipeline
                .ingest(&documents)
                .await
                .map_err(|error| anyhow::anyhow!(error.user_message()))?;

            println!(
                "{} chunks from {} document(s) indexed at {} ({})",
                report.chunk_count,
                report.document_count,
                report.index_path.display(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { question } => match pipeline.ask(&question).await {
            QueryResponse::Answer(answer) => println!("Reply: {answer}"),
            QueryResponse::Error(message) => anyhow::bail!(message),
        },
        Command::Search { query } => {
            let hits = pipeline
                .search(&query)
                .await
                .map_err(|error| anyhow::anyhow!(error.user_message()))?;

            println!("query: {query}");
            for hit in hits {
                println!("[{}] score={:.4} chunk={}", hit.chunk_index, hit.score, hit.chunk_id);
                println!("  chunk_text:\n{}", hit.text);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn every_global_option_has_an_env_fallback() {
        let command = Cli::command();
        let missing: Vec<String> = command
            .get_arguments()
            .filter(|arg| arg.get_long().is_some() && arg.get_long() != Some("help"))
            .filter(|arg| arg.get_long() != Some("version") && arg.get_env().is_none())
            .map(|arg| arg.get_id().to_string())
            .collect();
        assert!(missing.is_empty(), "options without env fallback: {missing:?}");
    }

    #[test]
    fn defaults_build_the_standard_config() {
        let cli = Cli::try_parse_from(["pdf-rag", "ask", "--question", "hi"]).unwrap();
        let config = cli.rag_config();
        assert_eq!(config.ingestion.chunk_max_chars, 1000);
        assert_eq!(config.ingestion.chunk_overlap_chars, 200);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
    }
}
