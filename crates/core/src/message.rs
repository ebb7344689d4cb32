//! Message and Conversation domain types.
//!
//! These are the core value objects that flow through the system:
//! a user message arrives, the chat engine processes it, and an
//! assistant message comes back — all persisted by the store.
//!
//! Identifiers and timestamps are store-assigned: a message starts life
//! as a [`NewMessage`] draft and becomes a [`Message`] only once saved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
}

impl Role {
    /// The lowercase wire/storage form of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Parse a stored role string. Unknown strings map to `User` so a
    /// corrupted row cannot poison history rendering.
    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message draft, not yet persisted. The store assigns the id and
/// timestamp on save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    /// The conversation this message belongs to
    pub conversation_id: i64,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,
}

impl NewMessage {
    /// Draft a user message.
    pub fn user(conversation_id: i64, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role: Role::User,
            content: content.into(),
        }
    }

    /// Draft an assistant message.
    pub fn assistant(conversation_id: i64, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single persisted message in a conversation.
///
/// Immutable once persisted; never deleted individually (only
/// cascade-deleted with its conversation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned message id
    pub id: i64,

    /// The conversation this message belongs to
    pub conversation_id: i64,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Store-assigned creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A conversation: an id, a mutable title, and a creation timestamp.
/// Messages reference it by id rather than being embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Store-assigned conversation id
    pub id: i64,

    /// Title (auto-generated or user-set, mutable)
    pub title: String,

    /// Store-assigned creation timestamp
    pub created_at: DateTime<Utc>,
}
