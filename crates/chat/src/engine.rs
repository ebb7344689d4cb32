//! The chat engine: one inbound message in, one persisted reply out.
//!
//! Each turn is a pure pipeline over its arguments. The engine holds only
//! shared immutable handles (store, provider), so concurrent turns need
//! no coordination.
//!
//! Failure policy per stage:
//! - knowledge retrieval degrades to an empty list, never aborts the turn
//! - history fetch, the main completion call, an unknown action tag, and
//!   reply persistence are fatal and abort the turn

use std::sync::Arc;
use std::time::Duration;

use mnemo_config::AppConfig;
use mnemo_core::error::{Error, Result};
use mnemo_core::message::{Message, NewMessage};
use mnemo_core::provider::CompletionProvider;
use mnemo_core::store::ChatStore;
use tracing::{debug, info, warn};

use crate::assembler::{self, PromptInput};
use crate::dispatcher::{ActionDispatcher, TurnOutcome};
use crate::interpreter;
use crate::retriever::{KnowledgeHit, KnowledgeRetriever};
use crate::scorer::RelevanceScorer;

/// Default deadline for the main completion call.
pub const COMPLETION_DEADLINE: Duration = Duration::from_secs(30);

/// Default number of history messages folded into the prompt.
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

pub struct ChatEngine {
    store: Arc<dyn ChatStore>,
    provider: Arc<dyn CompletionProvider>,
    retriever: KnowledgeRetriever,
    dispatcher: ActionDispatcher,
    history_limit: u32,
    completion_deadline: Duration,
}

impl ChatEngine {
    pub fn new(store: Arc<dyn ChatStore>, provider: Arc<dyn CompletionProvider>) -> Self {
        let retriever =
            KnowledgeRetriever::new(store.clone(), RelevanceScorer::new(provider.clone()));
        let dispatcher = ActionDispatcher::new(store.clone());
        Self {
            store,
            provider,
            retriever,
            dispatcher,
            history_limit: DEFAULT_HISTORY_LIMIT,
            completion_deadline: COMPLETION_DEADLINE,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn ChatStore>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        let mut engine = Self::new(store, provider);
        engine.history_limit = config.history_limit;
        engine.completion_deadline = Duration::from_secs(config.completion_timeout_secs);
        engine
    }

    /// Run a full turn for raw user text: persist the inbound message,
    /// then process it.
    pub async fn handle_user_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<TurnOutcome> {
        let inbound = self
            .store
            .save_message(NewMessage::user(conversation_id, content))
            .await?;
        self.process(&inbound).await
    }

    /// Process an already-persisted inbound message into a persisted
    /// assistant reply.
    pub async fn process(&self, inbound: &Message) -> Result<TurnOutcome> {
        let knowledge = self.retrieve_knowledge(&inbound.content).await;

        let history = self
            .store
            .conversation_history(inbound.conversation_id, self.history_limit)
            .await?;

        let prompt = assembler::build_prompt(&PromptInput {
            knowledge: &knowledge,
            history: &history,
            current: inbound,
        });
        debug!(
            conversation_id = inbound.conversation_id,
            prompt_len = prompt.len(),
            knowledge = knowledge.len(),
            history = history.len(),
            "Prompt assembled"
        );

        let completion = self
            .provider
            .complete(&prompt, self.completion_deadline)
            .await
            .map_err(Error::Provider)?;

        let response = interpreter::interpret(&completion)?;
        info!(
            conversation_id = inbound.conversation_id,
            action = response.action.as_str(),
            "Completion interpreted"
        );

        self.dispatcher.dispatch(inbound, &response).await
    }

    /// Retrieval failure must never abort a turn; log and continue with
    /// nothing.
    async fn retrieve_knowledge(&self, query: &str) -> Vec<KnowledgeHit> {
        match self.retriever.retrieve(query).await {
            Ok(hits) => hits,
            Err(err) => {
                warn!(error = %err, "Knowledge retrieval failed, continuing without knowledge");
                Vec::new()
            }
        }
    }
}
