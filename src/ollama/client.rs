/// Ollama chat client implementation.
///
/// This module provides `OllamaClient` for making synchronous chat requests to the Ollama API,
/// the `ChatClient` trait it implements, and a builder for configuration.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::dispatch::ChatMode;
use super::error::OllamaError;
use super::request;
use super::transport::{self, ReqwestTransport, ResponseBuffer, Transport};
use crate::models::Message;

/// Chat endpoint used when neither the builder nor the environment provides one.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/chat";

const CHAT_PATH: &str = "/api/chat";

/// Builder for constructing `OllamaClient` instances.
///
/// # Examples
///
/// ```
/// use tinychain::ollama::OllamaClientBuilder;
///
/// let client = OllamaClientBuilder::new()
///     .model("llama3.2")
///     .endpoint("http://localhost:11434/api/chat")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.model(), "llama3.2");
/// ```
#[derive(Default)]
pub struct OllamaClientBuilder {
    endpoint: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
}

impl OllamaClientBuilder {
    /// Creates a new `OllamaClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the full chat endpoint URL (e.g., "http://localhost:11434/api/chat").
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Sets the model name sent with every request (e.g., "llama3.2").
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a whole-request timeout.
    ///
    /// By default requests have no timeout and a hung service blocks the
    /// caller indefinitely.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the HTTP transport. The configured timeout is ignored when a
    /// custom transport is supplied.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the `OllamaClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// If `endpoint()` was not called, `OLLAMA_HOST` is used as the base URL
    /// (`http://` is assumed when it has no scheme) and `/api/chat` is appended. If that is not set either, the endpoint
    /// defaults to `http://localhost:11434/api/chat`.
    ///
    /// If `model()` was not called, `OLLAMA_MODEL` is used.
    ///
    /// # Errors
    ///
    /// Returns `OllamaError::InvalidConfig` if the resolved model or endpoint
    /// is empty.
    pub fn build(self) -> Result<OllamaClient, OllamaError> {
        let endpoint = match self.endpoint {
            Some(url) => url,
            None => std::env::var("OLLAMA_HOST")
                .map(|host| chat_endpoint(&host))
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
        };

        let model = match self.model {
            Some(m) => m,
            None => std::env::var("OLLAMA_MODEL").unwrap_or_default(),
        };

        if model.is_empty() {
            return Err(OllamaError::InvalidConfig(
                "model name cannot be empty".to_string(),
            ));
        }
        if endpoint.is_empty() {
            return Err(OllamaError::InvalidConfig(
                "endpoint URL cannot be empty".to_string(),
            ));
        }

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new(self.timeout)));

        Ok(OllamaClient {
            endpoint,
            model,
            transport,
        })
    }
}

impl fmt::Debug for OllamaClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaClientBuilder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

/// Turns an `OLLAMA_HOST` value into a chat endpoint.
///
/// Ollama accepts a bare `host:port`, so `http://` is assumed when no scheme
/// is given.
fn chat_endpoint(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return String::new();
    }
    if host.contains("://") {
        format!("{host}{CHAT_PATH}")
    } else {
        format!("http://{host}{CHAT_PATH}")
    }
}

/// Trait for chat operations against an Ollama-style service.
///
/// This trait enables mocking in unit tests. `dispatch` is provided and
/// routes to one of the three modes.
pub trait ChatClient: Send + Sync {
    /// Sends a plain chat request.
    fn chat(&self, messages: &[Message]) -> Result<Value, OllamaError>;

    /// Sends a chat request advertising `tools`.
    fn chat_with_tools(&self, messages: &[Message], tools: &Value) -> Result<Value, OllamaError>;

    /// Sends a chat request whose reply must match `schema`.
    fn chat_with_structure(&self, messages: &[Message], schema: &Value)
    -> Result<Value, OllamaError>;

    /// Picks a mode from `context` (see [`ChatMode::from_context`]) and sends
    /// the request.
    ///
    /// This is a single buffered round trip. Nothing is streamed.
    fn dispatch(&self, messages: &[Message], context: Option<&Value>) -> Result<Value, OllamaError> {
        match ChatMode::from_context(context) {
            ChatMode::Plain => self.chat(messages),
            ChatMode::Tools(tools) => self.chat_with_tools(messages, tools),
            ChatMode::Structured(schema) => self.chat_with_structure(messages, schema),
        }
    }
}

/// Synchronous client for the Ollama chat API.
///
/// Holds only immutable configuration, so one instance can be shared across
/// threads. Every call is independent: one handle, one POST, no retries.
pub struct OllamaClient {
    endpoint: String,
    model: String,
    transport: Arc<dyn Transport>,
}

impl OllamaClient {
    /// Creates a client for `model` against the default endpoint.
    ///
    /// # Errors
    ///
    /// Returns `OllamaError::InvalidConfig` if `model` is empty.
    pub fn new(model: impl Into<String>) -> Result<Self, OllamaError> {
        OllamaClientBuilder::new()
            .model(model)
            .endpoint(DEFAULT_ENDPOINT)
            .build()
    }

    /// Returns the chat endpoint URL configured for this client.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the model name configured for this client.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends `request` and returns the parsed response, whatever its shape.
    ///
    /// The HTTP status is not inspected; a JSON error body from the service
    /// is returned like any other reply.
    ///
    /// # Errors
    ///
    /// - `OllamaError::ResourceInit` if the transport is shut down or no
    ///   handle could be opened
    /// - `OllamaError::Transport` if the exchange failed
    /// - `OllamaError::Parse` if the body is not valid JSON
    pub fn perform_request(&self, request: &Value) -> Result<Value, OllamaError> {
        transport::init_transport()?;

        let body = serde_json::to_vec(request).map_err(OllamaError::Serialization)?;
        debug!(endpoint = %self.endpoint, bytes = body.len(), "sending chat request");

        let mut buffer = ResponseBuffer::default();
        let status = {
            let mut handle = self.transport.open()?;
            let headers = transport::json_headers();
            handle.post(&self.endpoint, headers, body, &mut |chunk: &[u8]| {
                buffer.append(chunk)
            })?
        };

        if (200..300).contains(&status) {
            debug!(status, bytes = buffer.len(), "received chat response");
        } else {
            warn!(status, bytes = buffer.len(), "chat endpoint returned non-success status");
        }

        let raw = buffer.into_bytes();
        serde_json::from_slice(&raw).map_err(|source| {
            let raw = String::from_utf8_lossy(&raw).into_owned();
            warn!(error = %source, raw = %raw, "response body is not valid JSON");
            OllamaError::Parse { source, raw }
        })
    }

    fn send(&self, messages: &[Message], mode: ChatMode<'_>) -> Result<Value, OllamaError> {
        debug!(
            model = %self.model,
            mode = mode.name(),
            messages = messages.len(),
            "building chat request"
        );
        let request = request::build_request(&self.model, messages, mode);
        self.perform_request(&request)
    }
}

impl ChatClient for OllamaClient {
    fn chat(&self, messages: &[Message]) -> Result<Value, OllamaError> {
        self.send(messages, ChatMode::Plain)
    }

    fn chat_with_tools(&self, messages: &[Message], tools: &Value) -> Result<Value, OllamaError> {
        self.send(messages, ChatMode::Tools(tools))
    }

    fn chat_with_structure(
        &self,
        messages: &[Message],
        schema: &Value,
    ) -> Result<Value, OllamaError> {
        self.send(messages, ChatMode::Structured(schema))
    }
}
