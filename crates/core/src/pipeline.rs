use crate::chunking::{build_chunks, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::extractor::{extract_raw_text, LopdfExtractor, TextExtractor};
use crate::models::{Answer, Document, IngestionReport, QueryResponse, RagConfig, ScoredChunk};
use crate::orchestrator::AgentOrchestrator;
use crate::retriever::RetrieverTool;
use crate::retry::{Sleeper, TokioSleeper};
use crate::store::IndexStore;
use crate::traits::ChatModel;
use crate::{AgentError, IngestError, SearchError};
use std::sync::Arc;
use tracing::{info, warn};

/// The two entry points: `ingest` (rebuild the index from uploads) and `ask`.
pub struct RagPipeline<M, S = TokioSleeper> {
    config: RagConfig,
    store: IndexStore,
    extractor: Box<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    agent: AgentOrchestrator<M, S>,
}

impl<M: ChatModel> RagPipeline<M, TokioSleeper> {
    pub fn new(config: RagConfig, embedder: Arc<dyn Embedder>, model: M) -> Self {
        Self {
            store: IndexStore::new(&config.index_dir),
            extractor: Box::new(LopdfExtractor),
            agent: AgentOrchestrator::new(model, embedder.clone(), &config),
            embedder,
            config,
        }
    }
}

impl<M: ChatModel, S: Sleeper> RagPipeline<M, S> {
    pub fn with_extractor(mut self, extractor: impl TextExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> RagPipeline<M, T> {
        RagPipeline {
            config: self.config,
            store: self.store,
            extractor: self.extractor,
            embedder: self.embedder,
            agent: self.agent.with_sleeper(sleeper),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn agent(&self) -> &AgentOrchestrator<M, S> {
        &self.agent
    }

    /// Extracts, chunks and embeds every document, then swaps the new index in.
    /// On any failure the previously persisted index is left as it was.
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestionReport, IngestError> {
        ChunkingConfig::from(self.config.ingestion.clone()).validate()?;

        if documents.is_empty() {
            return Err(IngestError::InvalidArgument(
                "no documents were supplied".to_string(),
            ));
        }

        let raw_text = extract_raw_text(self.extractor.as_ref(), documents)?;
        if raw_text.trim().is_empty() {
            let names = documents
                .iter()
                .map(|document| document.file_name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(IngestError::EmptyDocument(names));
        }

        let chunks = build_chunks(&raw_text, &self.config.ingestion)?;
        let index_path = self.store.build(&chunks, self.embedder.as_ref()).await?;

        info!(
            document_count = documents.len(),
            chunk_count = chunks.len(),
            "ingestion complete"
        );

        Ok(IngestionReport {
            document_count: documents.len(),
            chunk_count: chunks.len(),
            index_path,
        })
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, AgentError> {
        self.agent.answer(question).await
    }

    /// Every failure is turned into a readable message here.
    pub async fn ask(&self, question: &str) -> QueryResponse {
        match self.answer(question).await {
            Ok(answer) => QueryResponse::Answer(answer.text),
            Err(error) => {
                warn!(%error, "question could not be answered");
                QueryResponse::Error(error.user_message())
            }
        }
    }

    /// Retrieval only, without involving the model.
    pub async fn search(&self, query: &str) -> Result<Vec<ScoredChunk>, SearchError> {
        let snapshot = self.store.load().await?;
        let tool = RetrieverTool::over_snapshot(
            snapshot,
            self.embedder.clone(),
            self.config.retrieval.clone(),
        );
        Ok(tool.retrieve(query).await?.hits)
    }
}
