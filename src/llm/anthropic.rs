use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::sse::SseDataStream;
use super::{CompletionBackend, CompletionRequest, TokenStream, payload_preview};
use crate::error::BackendError;
use crate::models::Role;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: BlockDelta },
    Error { error: ErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

// System turns move to the top-level `system` field
fn build_body(request: &CompletionRequest) -> MessagesBody<'_> {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    MessagesBody {
        model: request.model.api_name(),
        system: if system.is_empty() { None } else { Some(system.join("\n\n")) },
        messages: request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage { role: m.role.as_str(), content: &m.content })
            .collect(),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        stream: true,
    }
}

fn parse_event(data: &str) -> Result<Option<String>, BackendError> {
    let event: StreamEvent = serde_json::from_str(data).map_err(|e| {
        BackendError::Parse(format!(
            "Failed to parse stream event: {} (data: {})",
            e,
            payload_preview(data)
        ))
    })?;
    match event {
        StreamEvent::ContentBlockDelta { delta: BlockDelta::TextDelta { text } } => {
            Ok(Some(text).filter(|t| !t.is_empty()))
        }
        StreamEvent::Error { error } => Err(BackendError::Api(error.message)),
        _ => Ok(None),
    }
}

#[async_trait]
impl CompletionBackend for AnthropicClient {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<TokenStream, BackendError> {
        let body = build_body(&request);

        let response = self
            .http_client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Anthropic streaming request failed");
                BackendError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Anthropic streaming API error");
            return Err(BackendError::Api(format!("Anthropic returned {}: {}", status, error_text)));
        }

        let deltas = SseDataStream::new(response.bytes_stream())
            .try_filter_map(|data| async move { parse_event(&data) });
        Ok(Box::pin(deltas))
    }
}
