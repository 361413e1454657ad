use crate::llm::{ChatMessage, ModelReply, ToolDefinition};
use crate::{BackendError, ScoredChunk, SearchError};
use async_trait::async_trait;

pub trait VectorIndex: Send + Sync {
    fn dimensions(&self) -> usize;

    /// Best-first, ties in insertion order.
    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, SearchError>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, BackendError>;
}
