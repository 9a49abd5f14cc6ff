//! Streaming chat completions against the hosted model providers.

pub mod anthropic;
pub mod openai;
pub mod smooth;
pub mod sse;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
pub use smooth::smooth_words;

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

use crate::error::BackendError;
use crate::models::{ChatMessage, Provider, SupportedModel};

/// Fixed sampling parameters for page generation.
pub const TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS: u32 = 4000;

// First 200 characters of a payload, for error messages
pub(crate) fn payload_preview(data: &str) -> String {
    data.chars().take(200).collect()
}

/// Text deltas in the order the provider produced them.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: SupportedModel,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(model: SupportedModel, messages: Vec<ChatMessage>) -> Self {
        Self {
            model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }
}

/// Anything that can turn a conversation into a token stream.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn stream_completion(&self, request: CompletionRequest)
    -> Result<TokenStream, BackendError>;
}

/// Routes each request to the client for its model's provider.
#[derive(Clone, Default)]
pub struct ModelRouter {
    pub openai: Option<OpenAiClient>,
    pub anthropic: Option<AnthropicClient>,
    pub google: Option<OpenAiClient>,
}

impl ModelRouter {
    pub fn configured_providers(&self) -> Vec<Provider> {
        let mut out = Vec::new();
        if self.openai.is_some() {
            out.push(Provider::OpenAi);
        }
        if self.anthropic.is_some() {
            out.push(Provider::Anthropic);
        }
        if self.google.is_some() {
            out.push(Provider::Google);
        }
        out
    }
}

#[async_trait]
impl CompletionBackend for ModelRouter {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<TokenStream, BackendError> {
        let provider = request.model.provider();
        let missing = || BackendError::Config(format!("no API key configured for {}", provider));
        let backend: &dyn CompletionBackend = match provider {
            Provider::OpenAi => self.openai.as_ref().ok_or_else(missing)?,
            Provider::Anthropic => self.anthropic.as_ref().ok_or_else(missing)?,
            Provider::Google => self.google.as_ref().ok_or_else(missing)?,
        };
        backend.stream_completion(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_provider_is_a_config_error() {
        let router = ModelRouter::default();
        let request = CompletionRequest::new(SupportedModel::Claude37, vec![ChatMessage::user("hi")]);

        match router.stream_completion(request).await {
            Err(BackendError::Config(msg)) => assert!(msg.contains("anthropic")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn configured_providers_lists_clients() {
        let router = ModelRouter {
            openai: Some(OpenAiClient::new("sk-test")),
            ..Default::default()
        };
        assert_eq!(router.configured_providers(), vec![Provider::OpenAi]);
    }

    #[test]
    fn payload_preview_stops_on_a_character_boundary() {
        let data = format!("{}é{}", "x".repeat(199), "y".repeat(50));
        let preview = payload_preview(&data);
        assert_eq!(preview.chars().count(), 200);
        assert!(preview.ends_with('é'));
    }

    #[test]
    fn request_uses_fixed_sampling() {
        let request = CompletionRequest::new(SupportedModel::Gpt4o, Vec::new());
        assert_eq!(request.temperature, TEMPERATURE);
        assert_eq!(request.max_tokens, MAX_TOKENS);
    }
}
