/// Ollama chat API client module.
///
/// This module provides a synchronous client for the Ollama `/api/chat` endpoint,
/// the request builders for its three modes, and the pluggable HTTP transport.
mod client;
pub mod dispatch;
mod error;
pub mod request;
pub mod transport;

pub use client::{ChatClient, DEFAULT_ENDPOINT, OllamaClient, OllamaClientBuilder};
pub use dispatch::ChatMode;
pub use error::OllamaError;
pub use transport::{
    ReqwestTransport, ResponseBuffer, Transport, TransportHandle, TransportLifecycle,
    init_transport, shutdown_transport,
};
