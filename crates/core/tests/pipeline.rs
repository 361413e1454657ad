use async_trait::async_trait;
use pdf_rag_core::{
    BackendError, CharacterNgramEmbedder, ChatMessage, ChatModel, Document, IngestError,
    ModelReply, QueryResponse, RagConfig, RagPipeline, Role, SearchError, Sleeper, TextExtractor,
    ToolCall, ToolDefinition, ANSWER_NOT_AVAILABLE, NO_CONTEXT_FOUND,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

/// Treats uploaded bytes as already-extracted UTF-8 text.
struct Utf8Extractor;

impl TextExtractor for Utf8Extractor {
    fn extract_text(&self, document: &Document) -> Result<String, IngestError> {
        Ok(String::from_utf8_lossy(&document.bytes).into_owned())
    }
}

/// Looks the question up once, then answers with the retrieved context, or with
/// the not-available phrase when the tool found nothing.
#[derive(Default)]
struct EchoingModel {
    failures: Mutex<VecDeque<BackendError>>,
    calls: Mutex<usize>,
}

impl EchoingModel {
    fn failing_with(failures: Vec<BackendError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ChatModel for EchoingModel {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, BackendError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(failure) = self.failures.lock().unwrap().pop_front() {
            return Err(failure);
        }

        let last = messages.last().expect("conversation is never empty");
        if last.role == Role::Tool {
            if last.content == NO_CONTEXT_FOUND {
                return Ok(ModelReply::Final(format!("Sorry, {ANSWER_NOT_AVAILABLE}.")));
            }
            return Ok(ModelReply::Final(format!("From the document: {}", last.content)));
        }

        Ok(ModelReply::ToolCalls(vec![ToolCall {
            id: "call_1".to_string(),
            name: tools[0].name.clone(),
            arguments: serde_json::json!({ "query": last.content }).to_string(),
        }]))
    }
}

#[derive(Default, Clone)]
struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}

fn pipeline(config: RagConfig, model: EchoingModel) -> RagPipeline<EchoingModel, RecordingSleeper> {
    RagPipeline::new(config, Arc::new(CharacterNgramEmbedder::default()), model)
        .with_extractor(Utf8Extractor)
        .with_sleeper(RecordingSleeper::default())
}

fn resume() -> Document {
    Document::new(
        "resume.pdf",
        b"Jane Doe is a backend engineer.\n\nShe has eight years of experience writing Rust services.\n\nShe speaks French and Spanish."
            .to_vec(),
    )
}

#[tokio::test]
async fn ingest_then_ask_answers_from_the_document() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(RagConfig::new(dir.path()), EchoingModel::default());

    let report = pipeline.ingest(&[resume()]).await.unwrap();
    assert_eq!(report.document_count, 1);
    assert!(report.chunk_count >= 1);
    assert!(report.index_path.exists());

    let response = pipeline.ask("How many years of Rust experience?").await;
    assert!(response.is_answer());
    assert!(response.text().contains("eight years"));
}

#[tokio::test]
async fn asking_before_any_ingestion_reports_index_not_found() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(RagConfig::new(dir.path()), EchoingModel::default());

    let error = pipeline.answer("anything?").await.unwrap_err();
    assert!(matches!(
        error,
        pdf_rag_core::AgentError::Index(SearchError::IndexNotFound(_))
    ));
    assert_eq!(*pipeline.agent().model().calls.lock().unwrap(), 0);

    let response = pipeline.ask("anything?").await;
    assert!(!response.is_answer());
    assert!(response.text().contains("before asking questions"));
}

#[tokio::test]
async fn second_ingestion_replaces_the_first() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(RagConfig::new(dir.path()), EchoingModel::default());

    pipeline
        .ingest(&[Document::new("a.pdf", b"Alpha project used welding robots.".to_vec())])
        .await
        .unwrap();
    pipeline
        .ingest(&[Document::new("b.pdf", b"Beta project used gardening drones.".to_vec())])
        .await
        .unwrap();

    let hits = pipeline.search("welding robots").await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|hit| !hit.text.contains("welding")));
}

#[tokio::test]
async fn empty_document_keeps_the_previous_index() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(RagConfig::new(dir.path()), EchoingModel::default());
    pipeline.ingest(&[resume()]).await.unwrap();

    let error = pipeline
        .ingest(&[Document::new("scan.pdf", Vec::new())])
        .await
        .unwrap_err();
    assert!(matches!(error, IngestError::EmptyDocument(_)));
    assert!(error.user_message().contains("no readable text"));

    let response = pipeline.ask("Which languages does she speak?").await;
    assert!(response.text().contains("French"));
}

#[tokio::test]
async fn invalid_chunk_config_is_rejected_before_any_work() {
    let dir = tempdir().unwrap();
    let mut config = RagConfig::new(dir.path());
    config.ingestion.chunk_overlap_chars = config.ingestion.chunk_max_chars;
    let pipeline = pipeline(config, EchoingModel::default());

    let error = pipeline.ingest(&[resume()]).await.unwrap_err();
    assert!(matches!(error, IngestError::InvalidChunkConfig(_)));
    assert!(!dir.path().join("index.json").exists());
}

#[tokio::test]
async fn four_rate_limits_then_success_waits_fifteen_seconds() {
    let dir = tempdir().unwrap();
    let model = EchoingModel::failing_with(
        (0..4)
            .map(|_| BackendError::RateLimited("Rate limit reached".to_string()))
            .collect(),
    );
    let pipeline = pipeline(RagConfig::new(dir.path()), model);
    pipeline.ingest(&[resume()]).await.unwrap();

    let answer = pipeline.answer("Rust experience?").await.unwrap();
    assert_eq!(answer.attempts, 5);
    assert!(answer.text.contains("eight years"));

    let delays = pipeline.agent().sleeper().delays.lock().unwrap().clone();
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ]
    );
}

#[tokio::test]
async fn five_rate_limits_surface_a_rate_limit_message() {
    let dir = tempdir().unwrap();
    let model = EchoingModel::failing_with(
        (0..6)
            .map(|_| BackendError::QuotaExceeded("insufficient_quota".to_string()))
            .collect(),
    );
    let pipeline = pipeline(RagConfig::new(dir.path()), model);
    pipeline.ingest(&[resume()]).await.unwrap();

    let response = pipeline.ask("Rust experience?").await;
    assert!(matches!(response, QueryResponse::Error(ref message) if message.contains("rate-limited")));
    assert_eq!(*pipeline.agent().model().calls.lock().unwrap(), 5);
}

#[tokio::test]
async fn out_of_context_questions_are_not_answered() {
    let dir = tempdir().unwrap();
    let mut config = RagConfig::new(dir.path());
    config.retrieval.min_score = Some(0.9);
    let pipeline = pipeline(config, EchoingModel::default());
    pipeline.ingest(&[resume()]).await.unwrap();

    let response = pipeline.ask("What is the capital of Australia?").await;
    assert!(response.text().contains(ANSWER_NOT_AVAILABLE));
}
