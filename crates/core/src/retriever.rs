use crate::embeddings::Embedder;
use crate::llm::ToolDefinition;
use crate::models::{RetrievalOptions, ScoredChunk};
use crate::store::IndexHandle;
use crate::traits::VectorIndex;
use crate::SearchError;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

pub const NO_CONTEXT_FOUND: &str = "No relevant context found in the document.";

#[derive(Debug, Deserialize)]
struct RetrieverArguments {
    query: String,
}

#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub hits: Vec<ScoredChunk>,
    /// What the model sees as the tool result.
    pub text: String,
}

/// Read-only search over one loaded index snapshot, exposed to the model as a named tool.
pub struct RetrieverTool<I = IndexHandle> {
    index: I,
    embedder: Arc<dyn Embedder>,
    options: RetrievalOptions,
}

impl<I: VectorIndex> RetrieverTool<I> {
    pub fn new(index: I, embedder: Arc<dyn Embedder>, options: RetrievalOptions) -> Self {
        Self {
            index,
            embedder,
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.options.tool_name
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.options.tool_name.clone(),
            description: self.options.tool_description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "query to look up in the uploaded documents"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Runs a tool call whose arguments are the model's raw JSON.
    pub async fn invoke(&self, arguments: &str) -> Result<RetrievalOutcome, SearchError> {
        let parsed: RetrieverArguments = serde_json::from_str(arguments)
            .map_err(|error| SearchError::InvalidToolArguments(error.to_string()))?;
        self.retrieve(&parsed.query).await
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievalOutcome, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let query_vector = self.embedder.embed(query).await?;
        let mut hits = self.index.search(&query_vector, self.options.top_k)?;

        if let Some(min_score) = self.options.min_score {
            hits.retain(|hit| hit.score >= min_score);
        }

        debug!(
            tool = %self.options.tool_name,
            query,
            hit_count = hits.len(),
            "retriever tool invoked"
        );

        let text = if hits.is_empty() {
            NO_CONTEXT_FOUND.to_string()
        } else {
            hits.iter()
                .map(|hit| hit.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        Ok(RetrievalOutcome { hits, text })
    }
}

impl RetrieverTool<IndexHandle> {
    /// Builds the tool over a freshly loaded snapshot.
    pub fn over_snapshot(
        index: IndexHandle,
        embedder: Arc<dyn Embedder>,
        options: RetrievalOptions,
    ) -> Self {
        if index.embedder() != embedder.name() {
            warn!(
                index_embedder = index.embedder(),
                query_embedder = embedder.name(),
                "query embedder differs from the one that built the index"
            );
        }
        Self::new(index, embedder, options)
    }
}
