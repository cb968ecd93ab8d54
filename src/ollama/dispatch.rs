//! Mode selection for [`ChatClient::dispatch`](super::ChatClient::dispatch).

use serde_json::Value;

/// Context key holding a tools array.
pub const TOOLS_KEY: &str = "tools";

/// Context key holding a structured-output schema.
///
/// Note this differs from the wire field it produces (`format`).
pub const OUTPUT_FORMAT_KEY: &str = "outputFormat";

/// Which kind of chat request to build.
///
/// A request carries at most one of tools or a format schema, so the modes
/// are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChatMode<'a> {
    /// Base request only.
    Plain,
    /// Base request plus a `tools` array.
    Tools(&'a Value),
    /// Base request plus a `format` schema and deterministic sampling.
    Structured(&'a Value),
}

impl<'a> ChatMode<'a> {
    /// Selects a mode from optional caller context.
    ///
    /// Checked in order: an array under `tools`, then an object under
    /// `outputFormat`. Anything else, including a missing context, is plain
    /// chat.
    pub fn from_context(context: Option<&'a Value>) -> Self {
        let Some(context) = context else {
            return Self::Plain;
        };

        if let Some(tools) = context.get(TOOLS_KEY).filter(|v| v.is_array()) {
            return Self::Tools(tools);
        }

        if let Some(schema) = context.get(OUTPUT_FORMAT_KEY).filter(|v| v.is_object()) {
            return Self::Structured(schema);
        }

        Self::Plain
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Tools(_) => "tools",
            Self::Structured(_) => "structured",
        }
    }
}
