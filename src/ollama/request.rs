//! Request documents for the `/api/chat` endpoint.
//!
//! All functions here are pure. Caller-supplied tools and schemas are passed
//! through without validation; the service is the validator.

use serde_json::{Value, json};

use super::dispatch::ChatMode;
use crate::models::Message;

/// Sampling temperature forced for structured output.
pub const STRUCTURED_TEMPERATURE: f64 = 0.0;

/// Builds the skeleton shared by every mode.
///
/// Messages appear in input order. `stream` and `thinking` are always off.
pub fn build_base_request(model: &str, messages: &[Message]) -> Value {
    let messages: Vec<Value> = messages
        .iter()
        .map(|msg| json!({"role": msg.role(), "content": msg.content()}))
        .collect();

    json!({
        "model": model,
        "messages": messages,
        "stream": false,
        "thinking": false,
    })
}

/// Builds a request advertising `tools` to the model.
pub fn build_tool_request(model: &str, messages: &[Message], tools: &Value) -> Value {
    let mut request = build_base_request(model, messages);
    request["tools"] = tools.clone();
    request
}

/// Builds a request constraining the reply to `schema`.
pub fn build_structured_request(model: &str, messages: &[Message], schema: &Value) -> Value {
    let mut request = build_base_request(model, messages);
    request["format"] = json!({
        "type": "json",
        "schema": schema,
    });
    request["options"] = json!({"temperature": STRUCTURED_TEMPERATURE});
    request
}

/// Builds the request for the given mode.
pub fn build_request(model: &str, messages: &[Message], mode: ChatMode<'_>) -> Value {
    match mode {
        ChatMode::Plain => build_base_request(model, messages),
        ChatMode::Tools(tools) => build_tool_request(model, messages, tools),
        ChatMode::Structured(schema) => build_structured_request(model, messages, schema),
    }
}
