//! OpenAI chat completions client (streaming only).
//!
//! Google's Gemini models are served through the same wire format via their
//! OpenAI-compatible endpoint, so `OpenAiClient::google` reuses this client.

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::sse::SseDataStream;
use super::{CompletionBackend, CompletionRequest, TokenStream, payload_preview};
use crate::error::BackendError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GOOGLE_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

#[derive(Clone)]
pub struct OpenAiClient {
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
struct StreamRequestBody<'a> {
    model: &'static str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunkRaw {
    #[serde(default)]
    choices: Vec<StreamChoiceRaw>,
    // sent instead of choices when the provider fails mid-stream
    #[serde(default)]
    error: Option<ErrorRaw>,
}

#[derive(Debug, Deserialize)]
struct ErrorRaw {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamChoiceRaw {
    delta: DeltaRaw,
}

#[derive(Debug, Deserialize)]
struct DeltaRaw {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Client for Gemini models through Google's OpenAI-compatible API.
    pub fn google(api_key: impl Into<String>) -> Self {
        Self::new(api_key).with_base_url(GOOGLE_OPENAI_BASE_URL)
    }

    /// Set a custom base URL (proxies, compatible providers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// Text delta carried by one `data:` payload, None for control payloads
fn parse_delta(data: &str) -> Result<Option<String>, BackendError> {
    if data == "[DONE]" {
        return Ok(None);
    }
    let raw: StreamChunkRaw = serde_json::from_str(data).map_err(|e| {
        BackendError::Parse(format!(
            "Failed to parse stream chunk: {} (data: {})",
            e,
            payload_preview(data)
        ))
    })?;
    if let Some(error) = raw.error {
        return Err(BackendError::Api(error.message));
    }
    Ok(raw
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty()))
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<TokenStream, BackendError> {
        let body = StreamRequestBody {
            model: request.model.api_name(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "OpenAI streaming request failed");
                BackendError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "OpenAI streaming API error");
            return Err(BackendError::Api(format!(
                "{} returned {}: {}",
                self.base_url, status, error_text
            )));
        }

        let deltas = SseDataStream::new(response.bytes_stream())
            .try_filter_map(|data| async move { parse_delta(&data) });
        Ok(Box::pin(deltas))
    }
}
