//! SQLite backend with FTS5 full-text search.
//!
//! Uses a single SQLite database file with three tables:
//! - `conversations` — conversation metadata
//! - `messages` — chat messages, cascade-deleted with their conversation
//! - `knowledge` — durable facts, detached (not deleted) when their
//!   conversation goes away
//!
//! An FTS5 virtual table `knowledge_fts` provides the lexical index over
//! knowledge content; triggers keep it in sync on insert/delete/update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnemo_core::error::StoreError;
use mnemo_core::message::{Conversation, Message, NewMessage, Role};
use mnemo_core::store::{ChatStore, KnowledgeRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A production SQLite store with FTS5 lexical search over knowledge.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a connection string.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection, so the pool must
        // hold exactly one and never recycle it.
        let pool_options = if path.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations — creates tables, FTS5 virtual table, and triggers.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                title      TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversations table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                content         TEXT NOT NULL,
                conversation_id INTEGER REFERENCES conversations(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("knowledge table: {e}")))?;

        // External-content FTS5 table synced via triggers
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_fts USING fts5(
                content,
                content='knowledge',
                content_rowid='id',
                tokenize='porter unicode61'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("FTS5 table: {e}")))?;

        // Trigger: sync FTS on INSERT
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS knowledge_ai AFTER INSERT ON knowledge BEGIN
                INSERT INTO knowledge_fts(rowid, content)
                VALUES (new.id, new.content);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("insert trigger: {e}")))?;

        // Trigger: sync FTS on DELETE (uses special external-content delete command)
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS knowledge_ad AFTER DELETE ON knowledge BEGIN
                INSERT INTO knowledge_fts(knowledge_fts, rowid, content)
                VALUES ('delete', old.id, old.content);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("delete trigger: {e}")))?;

        // Trigger: sync FTS on UPDATE (delete old, insert new)
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS knowledge_au AFTER UPDATE ON knowledge BEGIN
                INSERT INTO knowledge_fts(knowledge_fts, rowid, content)
                VALUES ('delete', old.id, old.content);
                INSERT INTO knowledge_fts(rowid, content)
                VALUES (new.id, new.content);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("update trigger: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation
             ON messages(conversation_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `Message` from a SQLite row.
    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let conversation_id: i64 = row
            .try_get("conversation_id")
            .map_err(|e| StoreError::QueryFailed(format!("conversation_id column: {e}")))?;
        let role: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(Message {
            id,
            conversation_id,
            role: Role::parse(&role),
            content,
            created_at: parse_timestamp(&created_at_str),
        })
    }

    /// Parse a `Conversation` from a SQLite row.
    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let title: String = row
            .try_get("title")
            .map_err(|e| StoreError::QueryFailed(format!("title column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(Conversation {
            id,
            title,
            created_at: parse_timestamp(&created_at_str),
        })
    }

    /// Build a safe FTS5 query from user text.
    ///
    /// FTS5 requires special syntax. We tokenize the user input into words
    /// and join them with implicit AND, quoting each token to prevent
    /// injection. Tokens use prefix matching so partial words still recall.
    fn sanitize_fts_query(text: &str) -> String {
        text.split_whitespace()
            .map(|w| {
                let clean: String = w
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                if clean.is_empty() {
                    return String::new();
                }
                format!("\"{}\"*", clean)
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ChatStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save_message(&self, draft: NewMessage) -> Result<Message, StoreError> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, role, content, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(draft.conversation_id)
        .bind(draft.role.as_str())
        .bind(&draft.content)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message failed: {e}")))?;

        let id = result.last_insert_rowid();
        debug!(message_id = id, conversation_id = draft.conversation_id, "Stored message");

        Ok(Message {
            id,
            conversation_id: draft.conversation_id,
            role: draft.role,
            content: draft.content,
            created_at,
        })
    }

    async fn conversation_history(
        &self,
        conversation_id: i64,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, role, content, created_at
            FROM messages
            WHERE conversation_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(conversation_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("History fetch: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation, StoreError> {
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO conversations (title, created_at) VALUES (?1, ?2)",
        )
        .bind(title)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT conversation failed: {e}")))?;

        let id = result.last_insert_rowid();
        info!(conversation_id = id, title, "Created conversation");

        Ok(Conversation {
            id,
            title: title.to_string(),
            created_at,
        })
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, created_at FROM conversations ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Conversation list: {e}")))?;

        rows.iter().map(Self::row_to_conversation).collect()
    }

    async fn update_conversation_title(&self, id: i64, title: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE conversations SET title = ?1 WHERE id = ?2")
            .bind(title)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE title failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("conversation {id}")));
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: i64) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("Begin delete tx: {e}")))?;

        sqlx::query("DELETE FROM messages WHERE conversation_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("Delete messages: {e}")))?;

        // Knowledge outlives its conversation: detach, never delete.
        sqlx::query("UPDATE knowledge SET conversation_id = NULL WHERE conversation_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("Detach knowledge: {e}")))?;

        sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("Delete conversation: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("Commit delete tx: {e}")))?;

        info!(conversation_id = id, "Deleted conversation");
        Ok(())
    }

    async fn save_knowledge(
        &self,
        content: &str,
        conversation_id: Option<i64>,
    ) -> Result<(), StoreError> {
        // Single statement; the insert trigger keeps the FTS index in step
        // within the same implicit transaction.
        let result = sqlx::query(
            "INSERT INTO knowledge (content, conversation_id, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(content)
        .bind(conversation_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT knowledge failed: {e}")))?;

        debug!(
            knowledge_id = result.last_insert_rowid(),
            ?conversation_id,
            "Stored knowledge entry"
        );
        Ok(())
    }

    async fn search_knowledge(&self, query: &str) -> Result<Vec<KnowledgeRecord>, StoreError> {
        let fts_query = Self::sanitize_fts_query(query);
        if fts_query.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            r#"
            SELECT k.content, k.conversation_id, k.created_at
            FROM knowledge_fts f
            JOIN knowledge k ON k.id = f.rowid
            WHERE knowledge_fts MATCH ?1
            ORDER BY k.created_at DESC, k.id DESC
            "#,
        )
        .bind(&fts_query)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("FTS5 search: {e}")))?;

        rows.iter()
            .map(|row| {
                let content: String = row
                    .try_get("content")
                    .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
                let conversation_id: Option<i64> = row
                    .try_get("conversation_id")
                    .map_err(|e| StoreError::QueryFailed(format!("conversation_id column: {e}")))?;
                let created_at_str: String = row
                    .try_get("created_at")
                    .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

                Ok(KnowledgeRecord {
                    content,
                    conversation_id,
                    created_at: parse_timestamp(&created_at_str),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn save_and_fetch_message() {
        let db = test_store().await;
        let conv = db.create_conversation("Test").await.unwrap();

        let msg = db
            .save_message(NewMessage::user(conv.id, "Hello there"))
            .await
            .unwrap();
        assert!(msg.id > 0);
        assert_eq!(msg.conversation_id, conv.id);

        let history = db.conversation_history(conv.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "Hello there");
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_bounded() {
        let db = test_store().await;
        let conv = db.create_conversation("Ordering").await.unwrap();

        for i in 0..5 {
            db.save_message(NewMessage::user(conv.id, format!("msg {i}")))
                .await
                .unwrap();
        }

        let history = db.conversation_history(conv.id, 3).await.unwrap();
        assert_eq!(history.len(), 3);
        // Newest first
        assert_eq!(history[0].content, "msg 4");
        assert_eq!(history[2].content, "msg 2");
    }

    #[tokio::test]
    async fn message_to_missing_conversation_fails() {
        let db = test_store().await;
        let err = db
            .save_message(NewMessage::user(999, "orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
    }

    #[tokio::test]
    async fn list_conversations_newest_first() {
        let db = test_store().await;
        db.create_conversation("First").await.unwrap();
        db.create_conversation("Second").await.unwrap();

        let all = db.list_conversations().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Second");
    }

    #[tokio::test]
    async fn update_title() {
        let db = test_store().await;
        let conv = db.create_conversation("Old").await.unwrap();

        db.update_conversation_title(conv.id, "New").await.unwrap();
        let all = db.list_conversations().await.unwrap();
        assert_eq!(all[0].title, "New");
    }

    #[tokio::test]
    async fn update_title_missing_conversation() {
        let db = test_store().await;
        let err = db.update_conversation_title(42, "Nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_cascades_messages_but_detaches_knowledge() {
        let db = test_store().await;
        let conv = db.create_conversation("Doomed").await.unwrap();
        db.save_message(NewMessage::user(conv.id, "hi")).await.unwrap();
        db.save_knowledge("The sky is blue", Some(conv.id))
            .await
            .unwrap();

        db.delete_conversation(conv.id).await.unwrap();

        let history = db.conversation_history(conv.id, 10).await.unwrap();
        assert!(history.is_empty());

        // The fact survives, detached from the deleted conversation.
        let hits = db.search_knowledge("sky").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].conversation_id, None);
    }

    #[tokio::test]
    async fn knowledge_search_matches_terms() {
        let db = test_store().await;
        db.save_knowledge("Rust is a systems programming language", None)
            .await
            .unwrap();
        db.save_knowledge("Python is great for scripting", None)
            .await
            .unwrap();

        let hits = db.search_knowledge("Rust").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("Rust"));
    }

    #[tokio::test]
    async fn knowledge_search_no_score_assigned() {
        let db = test_store().await;
        db.save_knowledge("Plain lexical match", None).await.unwrap();

        // The record carries content + provenance only — scoring happens
        // upstream in the chat engine.
        let hits = db.search_knowledge("lexical").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Plain lexical match");
    }

    #[tokio::test]
    async fn knowledge_search_empty_query() {
        let db = test_store().await;
        db.save_knowledge("Something", None).await.unwrap();

        let hits = db.search_knowledge("  !!  ").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn knowledge_search_prefix_matching() {
        let db = test_store().await;
        db.save_knowledge("The user's birthday is in September", None)
            .await
            .unwrap();

        let hits = db.search_knowledge("birth").await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn sanitize_fts_query_basic() {
        assert_eq!(
            SqliteStore::sanitize_fts_query("hello world"),
            "\"hello\"* \"world\"*"
        );
    }

    #[tokio::test]
    async fn sanitize_fts_query_special_chars() {
        assert_eq!(
            SqliteStore::sanitize_fts_query("hello! @world#"),
            "\"hello\"* \"world\"*"
        );
    }

    #[tokio::test]
    async fn concurrent_message_inserts() {
        let db = std::sync::Arc::new(test_store().await);
        let conv = db.create_conversation("Concurrent").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let db = db.clone();
            let conv_id = conv.id;
            handles.push(tokio::spawn(async move {
                db.save_message(NewMessage::user(conv_id, format!("parallel {i}")))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let history = db.conversation_history(conv.id, 20).await.unwrap();
        assert_eq!(history.len(), 8);
    }
}
