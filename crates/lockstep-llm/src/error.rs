//! Error type for provider construction and chat completion calls.

/// Errors that can occur in the LLM provider boundary.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The configured backend name is not recognized.
    #[error("unknown LLM backend: {backend}")]
    UnknownBackend {
        /// The backend name from configuration.
        backend: String,
    },

    /// The API key environment variable is unset or empty.
    #[error("missing API key: environment variable {env_var} is not set")]
    MissingApiKey {
        /// The environment variable that was consulted.
        env_var: String,
    },

    /// The HTTP request failed before a response arrived.
    #[error("LLM request failed: {message}")]
    Http {
        /// Description of the transport failure.
        message: String,
    },

    /// The backend returned a non-success status.
    #[error("LLM backend returned {status}: {body}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The response body, for diagnostics.
        body: String,
    },

    /// The response was well-formed but contained no usable completion.
    #[error("LLM response contained no choices")]
    EmptyResponse,

    /// The response body could not be parsed.
    #[error("failed to parse LLM response: {message}")]
    Parse {
        /// Description of the parse failure.
        message: String,
    },
}
