use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message sent to a completion model.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// Instructions for the model.
    System {
        /// Text content.
        content: String,
    },
    /// Input written by the user.
    User {
        /// Text content.
        content: String,
    },
    /// A previous reply of the model.
    Assistant {
        /// Text content.
        content: String,
    },
}

impl Message {
    /// Creates a system message.
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    /// Returns the role of the message.
    #[inline]
    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
        }
    }

    /// Returns the text content.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            Self::System { content } | Self::User { content } | Self::Assistant { content } => {
                content
            }
        }
    }

    fn content_mut(&mut self) -> &mut String {
        match self {
            Self::System { content } | Self::User { content } | Self::Assistant { content } => {
                content
            }
        }
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// System instructions.
    System,
    /// End user.
    User,
    /// Model.
    Assistant,
}

impl Role {
    /// Returns the role name used by OpenAI-compatible APIs.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Content returned by a completion model.
#[derive(Clone, Debug, PartialEq)]
pub enum AssistantContent {
    /// Plain text.
    Text(String),
    /// A call of a tool declared in the request.
    ToolCall(ToolCall),
}

impl AssistantContent {
    /// Creates a text content.
    #[inline]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a tool call content.
    #[inline]
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCall(ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        })
    }
}

/// A tool call produced by a model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    /// Provider-assigned call id.
    pub id: String,
    /// Name of the called tool.
    pub name: String,
    /// Arguments, either an object or a string holding serialized JSON.
    pub arguments: Value,
}

/// Merges consecutive messages with the same role so that roles alternate.
///
/// Several chat models reject histories with two adjacent user messages.
pub fn ensure_alternating(messages: Vec<Message>) -> Vec<Message> {
    let mut fixed: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages {
        match fixed.last_mut() {
            Some(last) if last.role() == message.role() => {
                let content = last.content_mut();
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(message.content());
            }
            _ => fixed.push(message),
        }
    }
    fixed
}
