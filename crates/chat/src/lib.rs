//! # Mnemo Chat
//!
//! The response-interpretation and knowledge-retrieval core: everything
//! between an inbound user message and the persisted assistant reply.
//!
//! ## Pipeline
//!
//! 1. [`KnowledgeRetriever`] — lexical candidates from the store, scored
//!    one by one by the [`RelevanceScorer`], filtered and ranked
//! 2. [`assembler`] — renders instructions, knowledge, and history into
//!    a single prompt (pure, no I/O)
//! 3. The completion provider generates one free-text response
//! 4. [`interpreter`] — parses the completion into a structured action,
//!    repairing malformed output
//! 5. [`ActionDispatcher`] — executes the action against the store
//!
//! [`ChatEngine`] wires the stages together, one task per inbound message
//! with no shared mutable state.

pub mod assembler;
pub mod dispatcher;
pub mod engine;
pub mod interpreter;
pub mod retriever;
pub mod scorer;

pub use dispatcher::{ActionDispatcher, TurnOutcome};
pub use engine::ChatEngine;
pub use interpreter::{Action, InterpretedResponse, StoreInfo};
pub use retriever::{KnowledgeHit, KnowledgeRetriever, RELEVANCE_THRESHOLD};
pub use scorer::RelevanceScorer;
