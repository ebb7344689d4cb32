//! Persistence layer for Mnemo.
//!
//! One backend: SQLite via `sqlx`, with an FTS5 virtual table providing
//! the lexical knowledge index. Pass `sqlite::memory:` for an in-process
//! ephemeral database (useful for tests).

mod sqlite;

pub use sqlite::SqliteStore;
