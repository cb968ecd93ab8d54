use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors that can occur when constructing a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The role was the empty string.
    #[error("Message role cannot be empty")]
    EmptyRole,
}

/// One role-tagged turn in a conversation.
///
/// The role is guaranteed non-empty. Recognized roles are `system`, `user` and
/// `assistant`, but any non-empty role is accepted and passed through to the
/// service. Content may be empty.
///
/// # Examples
///
/// ```
/// use tinychain::Message;
///
/// let msg = Message::new("user", "Why is the sky blue?").unwrap();
/// assert_eq!(msg.role(), "user");
/// assert!(Message::new("", "hello").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Message {
    role: String,
    content: String,
}

impl Message {
    /// Creates a new message.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::EmptyRole`] if `role` is empty.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Result<Self, MessageError> {
        let role = role.into();
        if role.is_empty() {
            return Err(MessageError::EmptyRole);
        }

        Ok(Self {
            role,
            content: content.into(),
        })
    }

    /// Creates a `system` message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_known_role("system", content)
    }

    /// Creates a `user` message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_known_role("user", content)
    }

    /// Creates an `assistant` message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_known_role("assistant", content)
    }

    fn with_known_role(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    /// Returns the role of the message sender.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns the message text.
    pub fn content(&self) -> &str {
        &self.content
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message{{role='{}', content='{}'}}", self.role, self.content)
    }
}
