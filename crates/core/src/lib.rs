//! # Mnemo Core
//!
//! Domain types, traits, and error definitions for the Mnemo conversational
//! assistant. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The persistent store and the completion provider are defined as traits
//! here. Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError};
pub use message::{Conversation, Message, NewMessage, Role};
pub use provider::CompletionProvider;
pub use store::{ChatStore, KnowledgeRecord};
