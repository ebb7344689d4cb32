//! Completion provider implementations for Mnemo.
//!
//! - [`OpenAiCompatProvider`] — any OpenAI-compatible `/chat/completions`
//!   endpoint (OpenAI, OpenRouter, Ollama, vLLM, ...)
//! - [`mock::SequentialMockProvider`] — scripted completions for tests

mod openai_compat;

pub mod mock;

pub use openai_compat::OpenAiCompatProvider;
