//! Minimal synchronous client for a local Ollama-style chat service.
//!
//! Three request modes are supported: plain chat, tool-augmented chat and
//! schema-constrained structured output. [`ChatClient::dispatch`] picks one
//! from optional caller context.
//!
//! ```no_run
//! use serde_json::json;
//! use tinychain::{ChatClient, Message, OllamaClient};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new("llama3.2")?;
//! let messages = vec![Message::user("Why is the sky blue?")];
//!
//! let reply = client.dispatch(&messages, None)?;
//! println!("{}", reply["message"]["content"]);
//!
//! let context = json!({"outputFormat": {"type": "object"}});
//! let _structured = client.dispatch(&messages, Some(&context))?;
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod ollama;

pub use models::{Message, MessageError};
pub use ollama::{
    ChatClient, ChatMode, OllamaClient, OllamaClientBuilder, OllamaError, init_transport,
    shutdown_transport,
};
