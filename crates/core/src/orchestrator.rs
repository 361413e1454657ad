use crate::embeddings::Embedder;
use crate::llm::{ChatMessage, ModelReply};
use crate::models::{AgentOptions, Answer, RagConfig, RetrievalOptions};
use crate::retriever::RetrieverTool;
use crate::retry::{RetryError, RetryPolicy, Sleeper, TokioSleeper};
use crate::store::IndexStore;
use crate::traits::ChatModel;
use crate::{AgentError, SearchError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Phrase the model is told to use when the documents do not contain the answer.
pub const ANSWER_NOT_AVAILABLE: &str = "answer is not available in the context";

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. Give a comprehensive reply to the \
question based on the context that has been provided. If the answer is not in the context, simply \
state that \"answer is not available in the context\" and avoid giving the incorrect response.";

#[derive(Debug)]
struct SessionOutcome {
    text: String,
    tool_calls: usize,
}

/// Drives the model through a bounded tool-use loop and replays the whole session
/// when the backend reports rate limiting.
pub struct AgentOrchestrator<M, S = TokioSleeper> {
    model: M,
    sleeper: S,
    store: IndexStore,
    embedder: Arc<dyn Embedder>,
    retrieval: RetrievalOptions,
    options: AgentOptions,
    retry: RetryPolicy,
}

impl<M: ChatModel> AgentOrchestrator<M, TokioSleeper> {
    pub fn new(model: M, embedder: Arc<dyn Embedder>, config: &RagConfig) -> Self {
        Self {
            model,
            sleeper: TokioSleeper,
            store: IndexStore::new(&config.index_dir),
            embedder,
            retrieval: config.retrieval.clone(),
            options: config.agent.clone(),
            retry: config.retry.clone(),
        }
    }
}

impl<M: ChatModel, S: Sleeper> AgentOrchestrator<M, S> {
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> AgentOrchestrator<M, T> {
        AgentOrchestrator {
            model: self.model,
            sleeper,
            store: self.store,
            embedder: self.embedder,
            retrieval: self.retrieval,
            options: self.options,
            retry: self.retry,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, AgentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::EmptyQuestion);
        }

        let outcome = self
            .retry
            .execute(&self.sleeper, is_retryable, |attempt| {
                self.run_session(question, attempt)
            })
            .await;

        match outcome {
            Ok((session, attempts)) => {
                info!(
                    attempts,
                    tool_calls = session.tool_calls,
                    "question answered"
                );
                Ok(Answer {
                    text: session.text,
                    attempts,
                    tool_calls: session.tool_calls,
                })
            }
            Err(RetryError::Fatal { error, .. }) => Err(error),
            Err(RetryError::Exhausted { attempts, last }) => match last {
                AgentError::Backend(last) => Err(AgentError::RetriesExhausted { attempts, last }),
                other => Err(other),
            },
        }
    }

    async fn run_session(&self, question: &str, attempt: u32) -> Result<SessionOutcome, AgentError> {
        let snapshot = self.store.load().await?;
        let tool = RetrieverTool::over_snapshot(snapshot, self.embedder.clone(), self.retrieval.clone());
        let tools = vec![tool.definition()];

        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(question),
        ];
        let mut tool_calls = 0;
        let mut relevant_hits = 0;
        let max_steps = self.options.max_steps.max(1);

        for step in 1..=max_steps {
            debug!(attempt, step, "requesting model reply");

            match self.model.generate(&messages, &tools).await? {
                ModelReply::Final(text) => {
                    if tool_calls > 0 && relevant_hits == 0 {
                        info!(tool_calls, "no relevant context was retrieved");
                        return Ok(SessionOutcome {
                            text: ANSWER_NOT_AVAILABLE.to_string(),
                            tool_calls,
                        });
                    }
                    return Ok(SessionOutcome { text, tool_calls });
                }
                ModelReply::ToolCalls(calls) => {
                    messages.push(ChatMessage::assistant_tool_calls(calls.clone()));

                    for call in calls {
                        let observation = if call.name == tool.name() {
                            match tool.invoke(&call.arguments).await {
                                Ok(outcome) => {
                                    tool_calls += 1;
                                    relevant_hits += outcome.hits.len();
                                    outcome.text
                                }
                                // The model can correct its own arguments; index and
                                // embedding failures still end the session.
                                Err(
                                    SearchError::InvalidToolArguments(details)
                                    | SearchError::Request(details),
                                ) => {
                                    warn!(tool = tool.name(), %details, "model sent invalid tool arguments");
                                    format!("invalid arguments for {}: {details}", tool.name())
                                }
                                Err(error) => return Err(error.into()),
                            }
                        } else {
                            format!(
                                "{} is not a valid tool, try one of [{}].",
                                call.name,
                                tool.name()
                            )
                        };
                        messages.push(ChatMessage::tool(call.id, observation));
                    }
                }
            }
        }

        Err(AgentError::StepLimitExceeded { steps: max_steps })
    }
}

fn is_retryable(error: &AgentError) -> bool {
    matches!(error, AgentError::Backend(backend) if backend.is_retryable())
}
