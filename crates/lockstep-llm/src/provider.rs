//! Enum-dispatched LLM provider backends.
//!
//! Uses enum dispatch instead of trait objects because async methods
//! are not dyn-compatible in Rust. Concrete implementations exist for
//! OpenRouter (and any OpenAI-compatible chat completions API) plus a
//! deterministic stub for tests and offline runs.

use tracing::debug;

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse, TokenUsage};

/// A chat-completion backend.
pub enum LlmProvider {
    /// OpenRouter or any OpenAI-compatible chat completions API.
    OpenRouter(OpenRouterProvider),
    /// Deterministic canned responses, no network.
    Stub(StubProvider),
}

impl LlmProvider {
    /// Construct a provider from configuration.
    ///
    /// For network backends the API key is read from the environment
    /// variable named in `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::UnknownBackend`] for an unrecognized backend
    /// name, or [`LlmError::MissingApiKey`] if the key variable is unset
    /// or empty.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        match config.backend.as_str() {
            "openrouter" => {
                let api_key = std::env::var(&config.api_key_env)
                    .ok()
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| LlmError::MissingApiKey {
                        env_var: config.api_key_env.clone(),
                    })?;
                Ok(Self::OpenRouter(OpenRouterProvider::new(
                    &config.api_url,
                    api_key,
                )))
            }
            "stub" => Ok(Self::Stub(StubProvider::default())),
            other => Err(LlmError::UnknownBackend {
                backend: other.to_owned(),
            }),
        }
    }

    /// Send a chat completion request and return the response.
    ///
    /// Dispatches to the concrete backend implementation.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] if the call fails or the response cannot be
    /// extracted.
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        match self {
            Self::OpenRouter(backend) => backend.chat_completion(request).await,
            Self::Stub(backend) => backend.chat_completion(request),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenRouter(_) => "openrouter",
            Self::Stub(_) => "stub",
        }
    }
}

/// Backend for OpenRouter and other OpenAI-compatible APIs.
///
/// Sends requests to `{api_url}/chat/completions` with bearer auth.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl OpenRouterProvider {
    /// Create a new backend targeting the given base URL.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Send a chat completion request and extract the first choice.
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.api_url);
        debug!(model = request.model, url, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Http {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unable to read error body"));
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| LlmError::Parse {
            message: format!("{e}"),
        })?;

        let content = json
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(serde_json::Value::as_str)
            .ok_or(LlmError::EmptyResponse)?
            .to_owned();

        let usage = json
            .get("usage")
            .and_then(|usage| serde_json::from_value::<TokenUsage>(usage.clone()).ok())
            .unwrap_or_default();

        debug!(
            total_tokens = usage.total_tokens,
            content_len = content.len(),
            "Chat completion received"
        );

        Ok(ChatResponse { content, usage })
    }
}

/// Deterministic backend returning a canned reply.
///
/// Lets the orchestrator and agents be exercised end-to-end without a
/// network or an API key.
#[derive(Debug, Clone)]
pub struct StubProvider {
    reply: String,
}

impl StubProvider {
    /// Create a stub that always replies with the given content.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }

    fn chat_completion(&self, _request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: self.reply.clone(),
            usage: TokenUsage::default(),
        })
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new(r#"{"kind":"noop","intent":"observe quietly"}"#)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user("hello")],
            model: String::from("m"),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn stub_returns_canned_reply() {
        let provider = LlmProvider::Stub(StubProvider::new("pondering"));
        let response = provider.chat_completion(&request()).await.unwrap();
        assert_eq!(response.content, "pondering");
        assert_eq!(response.usage.total_tokens, 0);
    }

    #[test]
    fn factory_rejects_unknown_backend() {
        let config = LlmConfig {
            backend: String::from("telepathy"),
            ..LlmConfig::default()
        };
        let result = LlmProvider::from_config(&config);
        assert!(matches!(result, Err(LlmError::UnknownBackend { backend }) if backend == "telepathy"));
    }

    #[test]
    fn factory_requires_api_key_for_openrouter() {
        let config = LlmConfig {
            backend: String::from("openrouter"),
            api_key_env: String::from("LOCKSTEP_TEST_KEY_THAT_IS_NOT_SET"),
            ..LlmConfig::default()
        };
        let result = LlmProvider::from_config(&config);
        assert!(matches!(result, Err(LlmError::MissingApiKey { .. })));
    }

    #[test]
    fn factory_builds_stub_by_default() {
        let provider = LlmProvider::from_config(&LlmConfig::default()).unwrap();
        assert_eq!(provider.name(), "stub");
    }
}
