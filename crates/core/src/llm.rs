use crate::error::BackendError;
use crate::traits::ChatModel;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, "")
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    fn to_wire(&self) -> Value {
        match self.role {
            Role::Assistant if !self.tool_calls.is_empty() => json!({
                "role": self.role,
                "content": Value::Null,
                "tool_calls": self
                    .tool_calls
                    .iter()
                    .map(|call| json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.name, "arguments": call.arguments },
                    }))
                    .collect::<Vec<_>>(),
            }),
            Role::Tool => json!({
                "role": self.role,
                "tool_call_id": self.tool_call_id,
                "content": self.content,
            }),
            _ => json!({ "role": self.role, "content": self.content }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

impl ToolDefinition {
    fn to_wire(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    ToolCalls(Vec<ToolCall>),
    Final(String),
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint with tool calling.
pub struct OpenAiChatModel {
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    client: Client,
}

impl OpenAiChatModel {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, BackendError> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        Ok(Self {
            endpoint: base.join("chat/completions")?,
            api_key,
            model: model.into(),
            temperature,
            client: Client::new(),
        })
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages.iter().map(ChatMessage::to_wire).collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            body["tools"] = tools.iter().map(ToolDefinition::to_wire).collect();
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, BackendError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&self.request_body(messages, tools));

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|error| BackendError::MalformedResponse(error.to_string()))?;
        parse_reply(parsed)
    }
}

fn parse_reply(parsed: CompletionResponse) -> Result<ModelReply, BackendError> {
    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| BackendError::MalformedResponse("response had no choices".to_string()))?;

    let tool_calls = message.tool_calls.unwrap_or_default();
    if !tool_calls.is_empty() {
        return Ok(ModelReply::ToolCalls(
            tool_calls
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect(),
        ));
    }

    message
        .content
        .map(ModelReply::Final)
        .ok_or_else(|| {
            BackendError::MalformedResponse("message had neither content nor tool calls".to_string())
        })
}

/// 429 responses are split into quota exhaustion and plain rate limiting.
fn classify_failure(status: StatusCode, body: &str) -> BackendError {
    if status != StatusCode::TOO_MANY_REQUESTS {
        return BackendError::BackendResponse {
            status: status.as_u16(),
            details: body.to_string(),
        };
    }

    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let code = parsed.pointer("/error/code").and_then(Value::as_str);
    let kind = parsed.pointer("/error/type").and_then(Value::as_str);
    let message = parsed
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or(body)
        .to_string();

    if code == Some("insufficient_quota") || kind == Some("insufficient_quota") {
        BackendError::QuotaExceeded(message)
    } else {
        BackendError::RateLimited(message)
    }
}
