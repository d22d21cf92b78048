//! Production transport: reqwest against the Anthropic, OpenAI and Groq APIs.
//!
//! Retries on 429 (rate limit) and 5xx errors with exponential backoff.
//! Everything above this module treats a failed call as final.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm_client::registry::{ModelId, Provider};
use crate::llm_client::{LlmError, Transport};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// Anthropic and the OpenAI-compatible APIs share the request shape for a
// single user turn.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// API keys per provider. A missing key only fails calls routed to that provider.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub anthropic: Option<String>,
    pub openai: Option<String>,
    pub groq: Option<String>,
}

impl ApiKeys {
    pub fn is_configured(&self, provider: Provider) -> bool {
        self.for_provider(provider).is_some()
    }

    fn for_provider(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Anthropic => self.anthropic.as_deref(),
            Provider::OpenAi => self.openai.as_deref(),
            Provider::Groq => self.groq.as_deref(),
        }
        .filter(|k| !k.is_empty())
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    keys: ApiKeys,
}

impl HttpTransport {
    pub fn new(keys: ApiKeys) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, keys })
    }

    fn build_request(&self, model: ModelId, api_key: &str, body: &ChatRequest<'_>) -> RequestBuilder {
        match model.provider() {
            Provider::Anthropic => self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(body),
            Provider::OpenAi => self.client.post(OPENAI_API_URL).bearer_auth(api_key).json(body),
            Provider::Groq => self.client.post(GROQ_API_URL).bearer_auth(api_key).json(body),
        }
    }

    async fn read_text(model: ModelId, response: reqwest::Response) -> Result<String, LlmError> {
        match model.provider() {
            Provider::Anthropic => {
                let parsed: AnthropicResponse = response.json().await?;
                debug!(
                    "LLM call succeeded: model={}, input_tokens={}, output_tokens={}",
                    model, parsed.usage.input_tokens, parsed.usage.output_tokens
                );
                parsed
                    .content
                    .into_iter()
                    .find(|b| b.block_type == "text")
                    .and_then(|b| b.text)
                    .ok_or(LlmError::EmptyContent)
            }
            Provider::OpenAi | Provider::Groq => {
                let parsed: ChatCompletionResponse = response.json().await?;
                if let Some(usage) = &parsed.usage {
                    debug!(
                        "LLM call succeeded: model={}, prompt_tokens={}, completion_tokens={}",
                        model, usage.prompt_tokens, usage.completion_tokens
                    );
                }
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or(LlmError::EmptyContent)
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn complete(
        &self,
        model: ModelId,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let provider = model.provider();
        let api_key = self
            .keys
            .for_provider(provider)
            .ok_or(LlmError::MissingApiKey(provider))?;

        let body = ChatRequest {
            model: model.api_name(),
            max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call to {} attempt {} failed, retrying after {}ms...",
                    model,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.build_request(model, api_key, &body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("{} API returned {}: {}", provider, status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ProviderError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Self::read_text(model, response).await;
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}
