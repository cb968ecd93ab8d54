use thiserror::Error;

/// Errors that can occur when talking to the Ollama chat API.
///
/// Every failure is surfaced to the caller as-is. Nothing in this crate
/// retries or falls back.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Empty model name or endpoint at client construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The per-call transport handle could not be created, or the transport
    /// subsystem has already been shut down.
    #[error("Failed to initialize transport: {0}")]
    ResourceInit(String),

    /// Connection, DNS, TLS, timeout or body read failure.
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response body was not valid JSON.
    #[error("Failed to parse JSON response: {source}\nRaw response: {raw}")]
    Parse {
        #[source]
        source: serde_json::Error,
        raw: String,
    },

    /// The request document could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl OllamaError {
    /// Wraps any transport-level failure.
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }

    /// Returns the raw response body for parse failures.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
