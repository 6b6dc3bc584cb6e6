//! Typed configuration for the LLM provider.
//!
//! API keys are never stored in configuration files; the config names an
//! environment variable and the factory reads the key from there at
//! construction time.

use serde::Deserialize;

/// Configuration for constructing an [`LlmProvider`](crate::LlmProvider).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmConfig {
    /// Backend selector: `"openrouter"` or `"stub"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier sent with each request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per completion (0 = backend default).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_backend() -> String {
    String::from("stub")
}

fn default_api_url() -> String {
    String::from("https://openrouter.ai/api/v1")
}

fn default_api_key_env() -> String {
    String::from("OPENROUTER_API_KEY")
}

fn default_model() -> String {
    String::from("openai/gpt-4o-mini")
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_tokens() -> u32 {
    512
}
