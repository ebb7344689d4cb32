//! Scripted mock provider for tests.
//!
//! Returns a queue of canned completions in order and records every prompt
//! it was asked, so tests can assert on both sides of the exchange.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mnemo_core::error::ProviderError;
use mnemo_core::provider::CompletionProvider;

/// A mock provider that returns a sequence of scripted completions.
///
/// Each call to `complete` returns the next result in the queue.
/// Panics if more calls are made than results provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
    call_count: Mutex<usize>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
            call_count: Mutex::new(0),
        }
    }

    /// A provider that returns a single completion.
    pub fn single(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    /// A provider that returns the same completion for every call.
    pub fn repeating(text: &str, times: usize) -> Self {
        Self::new(vec![Ok(text.to_string()); times])
    }

    /// How many completions have been requested so far.
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Every prompt this provider has been sent, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(
        &self,
        prompt: &str,
        _deadline: Duration,
    ) -> Result<String, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        self.prompts.lock().unwrap().push(prompt.to_string());
        let response = responses[*count].clone();
        *count += 1;
        response
    }
}
