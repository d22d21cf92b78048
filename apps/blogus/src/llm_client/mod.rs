/// LLM Client: the single point of entry for every model call Blogus makes.
///
/// ARCHITECTURAL RULE: analysis code never talks to a provider directly.
/// It calls `LlmClient`, which forwards to whatever `Transport` was injected
/// at startup (`HttpTransport` in production, `MockTransport` in tests).
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::llm_client::registry::{ModelId, Provider};

pub mod http;
pub mod mock;
pub mod prompts;
pub mod registry;

pub use http::HttpTransport;

/// Token budget for a single call when the caller does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("No API key configured for provider '{0}'")]
    MissingApiKey(Provider),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Whatever actually reaches a model: network, auth, provider quirks and
/// retry policy all live behind this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn complete(
        &self,
        model: ModelId,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

/// Uniform call into the injected transport. Owns the max-token default and
/// passes the model id through untouched. Does not retry.
#[derive(Clone)]
pub struct LlmClient {
    transport: Arc<dyn Transport>,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Sends `prompt` as a single user message and returns the model's text.
    pub async fn call(&self, model: ModelId, prompt: &str) -> Result<String, LlmError> {
        debug!(
            "Calling {} ({} chars, max_tokens={})",
            model,
            prompt.len(),
            self.max_tokens
        );
        self.transport
            .complete(model, prompt, self.max_tokens)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::mock::MockTransport;

    #[tokio::test]
    async fn test_call_uses_default_max_tokens_and_passes_model_through() {
        let mock = Arc::new(MockTransport::new().respond("hello"));
        let client = LlmClient::new(mock.clone());

        let text = client.call(ModelId::Claude3Haiku, "Say hi").await.unwrap();

        assert_eq!(text, "hello");
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, ModelId::Claude3Haiku);
        assert_eq!(calls[0].prompt, "Say hi");
        assert_eq!(calls[0].max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_max_tokens_override() {
        let mock = Arc::new(MockTransport::new().respond("ok"));
        let client = LlmClient::new(mock.clone()).with_max_tokens(256);

        client.call(ModelId::Gpt4o, "x").await.unwrap();

        assert_eq!(client.max_tokens(), 256);
        assert_eq!(mock.calls()[0].max_tokens, 256);
    }

    #[tokio::test]
    async fn test_transport_errors_propagate_unchanged() {
        let mock = Arc::new(MockTransport::new().fail(401, "invalid x-api-key"));
        let client = LlmClient::new(mock);

        let err = client.call(ModelId::Gpt4o, "x").await.unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 401, .. }));
    }
}
