use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An uploaded file, kept only until its text has been extracted.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub chunk_id: String,
    pub chunk_index: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub chunk_index: u64,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub top_k: usize,
    /// Hits scoring below this are treated as irrelevant.
    pub min_score: Option<f32>,
    pub tool_name: String,
    pub tool_description: String,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_score: None,
            tool_name: "pdf_extractor".to_string(),
            tool_description: "This tool is to give answer to queries from the pdf".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub model: String,
    pub temperature: f32,
    pub max_steps: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_steps: 15,
        }
    }
}

/// Everything a pipeline needs to know, passed explicitly instead of living in globals.
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub index_dir: PathBuf,
    pub ingestion: IngestionOptions,
    pub retrieval: RetrievalOptions,
    pub agent: AgentOptions,
    pub retry: RetryPolicy,
}

impl RagConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("vector_index"),
            ingestion: IngestionOptions::default(),
            retrieval: RetrievalOptions::default(),
            agent: AgentOptions::default(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub document_count: usize,
    pub chunk_count: usize,
    pub index_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub attempts: u32,
    pub tool_calls: usize,
}

/// What the query entry point hands back: never a panic, never a raw error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResponse {
    Answer(String),
    Error(String),
}

impl QueryResponse {
    pub fn is_answer(&self) -> bool {
        matches!(self, QueryResponse::Answer(_))
    }

    pub fn text(&self) -> &str {
        match self {
            QueryResponse::Answer(text) | QueryResponse::Error(text) => text,
        }
    }
}
