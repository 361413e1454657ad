use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used to pick the message shown to the person asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    IngestFirst,
    NoReadableText,
    RateLimited,
    InvalidInput,
    Unexpected,
}

impl FailureKind {
    pub fn user_message(self, details: &str) -> String {
        match self {
            FailureKind::IngestFirst => {
                "No document index found. Upload a PDF and submit it before asking questions."
                    .to_string()
            }
            FailureKind::NoReadableText => format!(
                "The document had no readable text ({details}). Scanned or image-only PDFs are not supported."
            ),
            FailureKind::RateLimited => format!(
                "The model service is rate-limited or out of quota, please retry later ({details})."
            ),
            FailureKind::InvalidInput => format!("Invalid input: {details}"),
            FailureKind::Unexpected => format!("An unexpected error occurred: {details}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding backend unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("embedding backend returned {status}: {details}")]
    BackendResponse { status: u16, details: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("embedding dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no extractable text: {0}")]
    EmptyDocument(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IngestError {
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::EmptyDocument(_) | IngestError::PdfParse(_) => FailureKind::NoReadableText,
            IngestError::InvalidChunkConfig(_)
            | IngestError::InvalidArgument(_)
            | IngestError::MissingFileName(_) => FailureKind::InvalidInput,
            _ => FailureKind::Unexpected,
        }
    }

    pub fn user_message(&self) -> String {
        self.kind().user_message(&self.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no vector index at {}; ingest a document first", .0.display())]
    IndexNotFound(PathBuf),

    #[error("persisted index is unreadable: {0}")]
    CorruptIndex(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("query vector dim {actual} is not {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    #[error("search request failed: {0}")]
    Request(String),
}

impl SearchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SearchError::IndexNotFound(_) => FailureKind::IngestFirst,
            SearchError::Request(_) => FailureKind::InvalidInput,
            _ => FailureKind::Unexpected,
        }
    }

    pub fn user_message(&self) -> String {
        self.kind().user_message(&self.to_string())
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("rate limit reached: {0}")]
    RateLimited(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from model backend ({status}): {details}")]
    BackendResponse { status: u16, details: String },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

impl BackendError {
    /// Rate-limit and quota signals are the only failures worth replaying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimited(_) | BackendError::QuotaExceeded(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error(transparent)]
    Index(#[from] SearchError),

    #[error("model backend failed: {0}")]
    Backend(#[from] BackendError),

    #[error("agent stopped after {steps} steps without a final answer")]
    StepLimitExceeded { steps: usize },

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: BackendError,
    },
}

impl AgentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AgentError::EmptyQuestion => FailureKind::InvalidInput,
            AgentError::Index(error) => error.kind(),
            AgentError::Backend(error) if error.is_retryable() => FailureKind::RateLimited,
            AgentError::RetriesExhausted { .. } => FailureKind::RateLimited,
            AgentError::Backend(_) | AgentError::StepLimitExceeded { .. } => {
                FailureKind::Unexpected
            }
        }
    }

    pub fn user_message(&self) -> String {
        self.kind().user_message(&self.to_string())
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
