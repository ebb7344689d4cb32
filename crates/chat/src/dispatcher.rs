//! Action dispatch. One entry point, four terminal outcomes.
//!
//! Every action ends with a persisted assistant reply. `store` first
//! writes a knowledge entry and `new_conversation` first creates the
//! conversation the reply lands in; `reply` and `search` are persistence-
//! identical (search is a hint to the model, not a store operation).
//!
//! The knowledge write in `store` is the only non-fatal persistence step;
//! the turn still replies when it fails.

use std::fmt::Write as _;
use std::sync::Arc;

use mnemo_core::error::Error;
use mnemo_core::message::{Message, NewMessage};
use mnemo_core::store::ChatStore;
use tracing::{info, warn};

use crate::interpreter::{Action, InterpretedResponse, StoreInfo};

/// What a dispatched turn produced.
#[derive(Debug)]
pub struct TurnOutcome {
    /// The persisted assistant reply.
    pub message: Message,
    /// Set only when the turn moved to a newly created conversation.
    pub new_conversation_id: Option<i64>,
}

/// Executes an interpreted action against the store.
pub struct ActionDispatcher {
    store: Arc<dyn ChatStore>,
}

impl ActionDispatcher {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Perform the side effect the action implies and persist the reply.
    pub async fn dispatch(
        &self,
        inbound: &Message,
        response: &InterpretedResponse,
    ) -> Result<TurnOutcome, Error> {
        match response.action {
            Action::Reply | Action::Search => {
                self.reply_in(inbound.conversation_id, &response.content).await
            }
            Action::Store => {
                self.store_knowledge(inbound.conversation_id, response).await;
                self.reply_in(inbound.conversation_id, &response.content).await
            }
            Action::NewConversation => {
                let title = response.new_title.as_deref().unwrap_or_default();
                let conversation = self.store.create_conversation(title).await?;
                info!(
                    conversation_id = conversation.id,
                    title, "Created conversation for topic change"
                );
                let mut outcome = self.reply_in(conversation.id, &response.content).await?;
                outcome.new_conversation_id = Some(conversation.id);
                Ok(outcome)
            }
        }
    }

    async fn reply_in(&self, conversation_id: i64, content: &str) -> Result<TurnOutcome, Error> {
        let message = self
            .store
            .save_message(NewMessage::assistant(conversation_id, content))
            .await?;
        Ok(TurnOutcome {
            message,
            new_conversation_id: None,
        })
    }

    /// Persist the facts the model extracted. Failures are logged and
    /// swallowed so the turn still produces a reply.
    async fn store_knowledge(&self, conversation_id: i64, response: &InterpretedResponse) {
        let info = response.store_info.clone().unwrap_or_default();
        let body = render_knowledge_body(&info);
        match self.store.save_knowledge(&body, Some(conversation_id)).await {
            Ok(()) => info!(conversation_id, "Stored knowledge entry"),
            Err(err) => warn!(
                conversation_id,
                error = %err,
                "Failed to store knowledge entry, replying anyway"
            ),
        }
    }
}

/// Render the knowledge body: one `Information:` line per extracted fact,
/// with a `Context:` line after each fact that has matching commentary.
fn render_knowledge_body(info: &StoreInfo) -> String {
    let mut body = String::from("Knowledge Entry:\n");
    for (i, fact) in info.user_input.iter().enumerate() {
        let _ = writeln!(body, "Information: {fact}");
        if let Some(context) = info.bot_response.get(i) {
            let _ = writeln!(body, "Context: {context}");
        }
    }
    body
}
