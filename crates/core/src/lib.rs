pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod retriever;
pub mod retry;
pub mod store;
pub mod traits;

pub use chunking::{build_chunks, split_text, ChunkingConfig};
pub use embeddings::{CharacterNgramEmbedder, Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{AgentError, BackendError, EmbeddingError, FailureKind, IngestError, SearchError};
pub use extractor::{clean_extracted_text, extract_raw_text, LopdfExtractor, TextExtractor};
pub use ingest::{discover_pdf_files, load_documents};
pub use llm::{ChatMessage, ModelReply, OpenAiChatModel, Role, ToolCall, ToolDefinition};
pub use models::{
    AgentOptions, Answer, Document, IngestionOptions, IngestionReport, QueryResponse, RagConfig,
    RetrievalOptions, ScoredChunk, TextChunk,
};
pub use orchestrator::{AgentOrchestrator, ANSWER_NOT_AVAILABLE, SYSTEM_PROMPT};
pub use pipeline::RagPipeline;
pub use retriever::{RetrievalOutcome, RetrieverTool, NO_CONTEXT_FOUND};
pub use retry::{RetryError, RetryPolicy, Sleeper, TokioSleeper};
pub use store::{IndexHandle, IndexStore};
pub use traits::{ChatModel, VectorIndex};
