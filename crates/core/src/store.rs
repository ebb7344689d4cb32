//! ChatStore trait — durable storage for conversations, messages, and the
//! knowledge base.
//!
//! The store owns a lexical full-text index over knowledge content. Lexical
//! search is a cheap, high-recall pre-filter: it returns term matches with
//! **no relevance score** — scoring is entirely the chat engine's job.
//!
//! The store must support safe concurrent access from multiple turn tasks;
//! multi-statement operations (knowledge insert + index update, cascading
//! conversation delete) are transactional inside the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::{Conversation, Message, NewMessage};

/// A raw knowledge row returned by lexical search.
///
/// `conversation_id` is nullable: deleting a conversation must not
/// delete the fact, only detach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// The stored fact text
    pub content: String,

    /// The conversation the fact was learned in, if it still exists
    pub conversation_id: Option<i64>,

    /// When the fact was stored
    pub created_at: DateTime<Utc>,
}

/// The core ChatStore trait.
///
/// Implementations: SQLite (production and tests, via `sqlite::memory:`).
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The backend name (e.g., "sqlite").
    fn name(&self) -> &str;

    /// Persist a message draft; the store assigns id and timestamp.
    async fn save_message(&self, draft: NewMessage) -> Result<Message, StoreError>;

    /// Fetch up to `limit` messages for a conversation, **newest first**.
    async fn conversation_history(
        &self,
        conversation_id: i64,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError>;

    /// Create a conversation with the given title.
    async fn create_conversation(&self, title: &str) -> Result<Conversation, StoreError>;

    /// List all conversations, newest first.
    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError>;

    /// Rename a conversation.
    async fn update_conversation_title(&self, id: i64, title: &str) -> Result<(), StoreError>;

    /// Delete a conversation and its messages, detaching (not deleting)
    /// its knowledge entries, in one transaction.
    async fn delete_conversation(&self, id: i64) -> Result<(), StoreError>;

    /// Insert a knowledge entry and keep the lexical index consistent.
    async fn save_knowledge(
        &self,
        content: &str,
        conversation_id: Option<i64>,
    ) -> Result<(), StoreError>;

    /// Lexical/term search over knowledge content. No relevance score.
    async fn search_knowledge(&self, query: &str) -> Result<Vec<KnowledgeRecord>, StoreError>;
}
