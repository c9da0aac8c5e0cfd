use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::{CapabilityHost, DelegateError, DelegateReply, DelegateRequest, ReasoningDelegate};
use crate::task::truncate_text;

pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-7-sonnet-20250219";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const TRANSCRIPT_RESULT_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn messages_endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

/// Reasoning delegate backed by the Anthropic Messages API, including its
/// tool-use loop.
pub struct AnthropicDelegate {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicDelegate {
    pub fn new(config: AnthropicConfig) -> Result<Self, DelegateError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| DelegateError::Unreachable(err.to_string()))?;
        Ok(Self { client, config })
    }

    async fn send(&self, body: &Value, cancel: &CancellationToken) -> Result<Value, DelegateError> {
        let request = self
            .client
            .post(self.config.messages_endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DelegateError::Cancelled),
            response = request => {
                response.map_err(|err| DelegateError::Unreachable(err.to_string()))?
            }
        };

        let status = response.status();
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DelegateError::Cancelled),
            text = response.text() => {
                text.map_err(|err| DelegateError::Unreachable(err.to_string()))?
            }
        };

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DelegateError::Unauthorized(format!(
                "HTTP {status}: {}",
                api_error_message(&text)
            )));
        }
        if !status.is_success() {
            return Err(DelegateError::Rejected(format!(
                "HTTP {status}: {}",
                api_error_message(&text)
            )));
        }

        serde_json::from_str(&text).map_err(|err| DelegateError::Protocol(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_text(body.trim(), 300).0)
}

#[async_trait]
impl ReasoningDelegate for AnthropicDelegate {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(
        &self,
        request: DelegateRequest,
        mut host: Option<&mut dyn CapabilityHost>,
    ) -> Result<DelegateReply, DelegateError> {
        let tools = host
            .as_ref()
            .map(|host| {
                host.capabilities()
                    .into_iter()
                    .map(|descriptor| {
                        json!({
                            "name": descriptor.name,
                            "description": descriptor.description,
                            "input_schema": descriptor.input_schema,
                        })
                    })
                    .collect::<Vec<Value>>()
            })
            .unwrap_or_default();

        let mut messages = request
            .messages
            .iter()
            .map(|message| json!({ "role": message.role, "content": message.content }))
            .collect::<Vec<Value>>();
        let mut transcript = Vec::new();
        let mut calls = 0usize;
        // One round per allowed call plus the closing reply.
        let max_rounds = request.max_calls.saturating_add(1);

        for round in 1..=max_rounds {
            let mut body = json!({
                "model": self.config.model,
                "max_tokens": self.config.max_tokens,
                "system": request.system,
                "messages": messages,
            });
            if !tools.is_empty() {
                body["tools"] = Value::Array(tools.clone());
            }

            tracing::debug!(round, model = %self.config.model, "sending messages request");
            let raw = self.send(&body, &request.cancel).await?;
            let parsed: MessagesResponse = serde_json::from_value(raw.clone())
                .map_err(|err| DelegateError::Protocol(err.to_string()))?;

            let mut text = String::new();
            let mut tool_uses = Vec::new();
            for block in parsed.content {
                match block {
                    ContentBlock::Text { text: chunk } => {
                        transcript.push(format!("assistant: {chunk}"));
                        text.push_str(&chunk);
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        transcript.push(format!("tool_use {name} {input}"));
                        tool_uses.push((id, name, input));
                    }
                    ContentBlock::Other => {}
                }
            }

            let wants_tools =
                parsed.stop_reason.as_deref() == Some("tool_use") && !tool_uses.is_empty();
            let Some(host) = host.as_mut().filter(|_| wants_tools && round < max_rounds) else {
                return Ok(DelegateReply {
                    text,
                    transcript: transcript.join("\n"),
                });
            };

            messages.push(json!({
                "role": "assistant",
                "content": raw.get("content").cloned().unwrap_or_else(|| json!([])),
            }));

            let mut results = Vec::new();
            for (id, name, input) in tool_uses {
                if request.cancel.is_cancelled() {
                    return Err(DelegateError::Cancelled);
                }
                let (content, is_error) = if calls >= request.max_calls {
                    (
                        json!({
                            "status": "error",
                            "code": "budget_exhausted",
                            "error": format!(
                                "capability call budget of {} calls is exhausted",
                                request.max_calls
                            ),
                        })
                        .to_string(),
                        true,
                    )
                } else {
                    calls += 1;
                    match host.invoke(&name, input).await {
                        Ok(value) => (value.to_string(), false),
                        Err(err) if err.is_cancellation() => return Err(DelegateError::Cancelled),
                        Err(err) => (
                            json!({
                                "status": "error",
                                "code": err.code(),
                                "error": err.to_string(),
                            })
                            .to_string(),
                            true,
                        ),
                    }
                };
                let (shown, _) = truncate_text(&content, TRANSCRIPT_RESULT_CHARS);
                transcript.push(format!(
                    "tool_result {name} ({}): {shown}",
                    if is_error { "error" } else { "ok" }
                ));
                results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": id,
                    "content": content,
                    "is_error": is_error,
                }));
            }
            messages.push(json!({ "role": "user", "content": results }));
        }

        Err(DelegateError::Protocol(
            "tool-use loop ended without a final reply".to_string(),
        ))
    }
}
