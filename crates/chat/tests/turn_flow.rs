//! End-to-end turn tests: in-memory store, scripted provider, real engine.

use std::sync::Arc;

use mnemo_chat::ChatEngine;
use mnemo_core::error::{Error, ProviderError};
use mnemo_core::message::Role;
use mnemo_core::store::ChatStore;
use mnemo_providers::mock::SequentialMockProvider;
use mnemo_store::SqliteStore;

async fn store_with_conversation() -> (Arc<SqliteStore>, i64) {
    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    let conversation = store.create_conversation("test").await.unwrap();
    (Arc::new(store), conversation.id)
}

fn engine(
    store: Arc<SqliteStore>,
    responses: Vec<Result<String, ProviderError>>,
) -> (ChatEngine, Arc<SequentialMockProvider>) {
    let provider = Arc::new(SequentialMockProvider::new(responses));
    (ChatEngine::new(store, provider.clone()), provider)
}

#[tokio::test]
async fn reply_turn_persists_both_sides() {
    let (store, conv_id) = store_with_conversation().await;
    let (engine, _) = engine(
        store.clone(),
        vec![Ok(r#"{"action":"reply","content":"Hello!"}"#.to_string())],
    );

    let outcome = engine.handle_user_message(conv_id, "hi").await.unwrap();
    assert_eq!(outcome.message.role, Role::Assistant);
    assert_eq!(outcome.message.content, "Hello!");
    assert!(outcome.new_conversation_id.is_none());

    // Newest first: the reply, then the inbound user message.
    let history = store.conversation_history(conv_id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::Assistant);
    assert_eq!(history[1].role, Role::User);
    assert_eq!(history[1].content, "hi");
}

#[tokio::test]
async fn knowledge_flows_into_the_prompt() {
    let (store, conv_id) = store_with_conversation().await;
    store
        .save_knowledge("The cat's name is Miso", Some(conv_id))
        .await
        .unwrap();
    // Call 1 scores the knowledge candidate, call 2 is the completion.
    let (engine, provider) = engine(
        store,
        vec![
            Ok("0.9".to_string()),
            Ok(r#"{"action":"reply","content":"Your cat is Miso."}"#.to_string()),
        ],
    );

    engine.handle_user_message(conv_id, "cat name?").await.unwrap();

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("The cat's name is Miso"));
    assert!(prompts[1].contains("- The cat's name is Miso (relevance: 0.90)"));
    assert!(prompts[1].contains("Current message:\nuser: cat name?"));
}

#[tokio::test]
async fn store_turn_writes_knowledge_and_replies() {
    let (store, conv_id) = store_with_conversation().await;
    let completion = r#"{
        "action": "store",
        "content": "Noted, your birthday is in June.",
        "store_info": {
            "user_input": ["Birthday is June 12"],
            "bot_response": ["User shared their birthday"]
        }
    }"#;
    let (engine, _) = engine(store.clone(), vec![Ok(completion.to_string())]);

    let outcome = engine
        .handle_user_message(conv_id, "my birthday is June 12")
        .await
        .unwrap();
    assert_eq!(outcome.message.content, "Noted, your birthday is in June.");

    let records = store.search_knowledge("birthday").await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].content.contains("Information: Birthday is June 12"));
    assert!(records[0].content.contains("Context: User shared their birthday"));
}

#[tokio::test]
async fn new_conversation_turn_moves_the_reply() {
    let (store, conv_id) = store_with_conversation().await;
    let completion =
        r#"{"action":"new_conversation","content":"New topic, then.","new_title":"Cooking"}"#;
    let (engine, _) = engine(store.clone(), vec![Ok(completion.to_string())]);

    let outcome = engine
        .handle_user_message(conv_id, "let's talk about cooking")
        .await
        .unwrap();

    let new_conv = outcome.new_conversation_id.unwrap();
    assert_ne!(new_conv, conv_id);
    assert_eq!(outcome.message.conversation_id, new_conv);

    let conversations = store.list_conversations().await.unwrap();
    assert!(conversations.iter().any(|c| c.id == new_conv && c.title == "Cooking"));

    // The inbound user message stays in the old conversation.
    let old_history = store.conversation_history(conv_id, 10).await.unwrap();
    assert_eq!(old_history.len(), 1);
    assert_eq!(old_history[0].role, Role::User);
}

#[tokio::test]
async fn malformed_completion_becomes_verbatim_reply() {
    let (store, conv_id) = store_with_conversation().await;
    let raw = "Sorry, I can only answer in plain text today.";
    let (engine, _) = engine(store, vec![Ok(raw.to_string())]);

    let outcome = engine.handle_user_message(conv_id, "hello").await.unwrap();
    assert_eq!(outcome.message.content, raw);
}

#[tokio::test]
async fn unknown_action_aborts_without_persisting_a_reply() {
    let (store, conv_id) = store_with_conversation().await;
    let (engine, _) = engine(
        store.clone(),
        vec![Ok(r#"{"action":"delete","content":"gone"}"#.to_string())],
    );

    let err = engine.handle_user_message(conv_id, "hi").await.unwrap_err();
    assert!(matches!(err, Error::UnknownAction(tag) if tag == "delete"));

    // Only the inbound user message exists; no reply was written.
    let history = store.conversation_history(conv_id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test]
async fn retrieval_failure_degrades_to_no_knowledge() {
    let (store, conv_id) = store_with_conversation().await;
    store
        .save_knowledge("A fact about failure", Some(conv_id))
        .await
        .unwrap();
    // The scoring call fails; the main completion call succeeds.
    let (engine, provider) = engine(
        store,
        vec![
            Err(ProviderError::Timeout("scoring timed out".to_string())),
            Ok(r#"{"action":"reply","content":"Answering blind."}"#.to_string()),
        ],
    );

    let outcome = engine.handle_user_message(conv_id, "failure").await.unwrap();
    assert_eq!(outcome.message.content, "Answering blind.");

    // The completion prompt carries the empty knowledge section.
    let prompts = provider.prompts();
    let main_prompt = prompts.last().unwrap();
    assert!(main_prompt.contains("Relevant knowledge from database:\n\n"));
    assert!(!main_prompt.contains("A fact about failure"));
}

#[tokio::test]
async fn broken_search_index_degrades_to_no_knowledge() {
    let inner = SqliteStore::new("sqlite::memory:").await.unwrap();
    let conv_id = inner.create_conversation("test").await.unwrap().id;
    let store = Arc::new(support::SearchFails(inner));
    let provider = Arc::new(SequentialMockProvider::single(
        r#"{"action":"reply","content":"Still here."}"#,
    ));
    let engine = ChatEngine::new(store, provider.clone());

    let outcome = engine.handle_user_message(conv_id, "anything").await.unwrap();
    assert_eq!(outcome.message.content, "Still here.");

    // No scoring calls happened; the single prompt has no knowledge lines.
    assert_eq!(provider.call_count(), 1);
    assert!(provider.prompts()[0].contains("Relevant knowledge from database:\n\n"));
}

mod support {
    use async_trait::async_trait;
    use mnemo_core::error::StoreError;
    use mnemo_core::message::{Conversation, Message, NewMessage};
    use mnemo_core::store::{ChatStore, KnowledgeRecord};
    use mnemo_store::SqliteStore;

    /// Delegates to SQLite but fails every knowledge search.
    pub struct SearchFails(pub SqliteStore);

    #[async_trait]
    impl ChatStore for SearchFails {
        fn name(&self) -> &str {
            "search_fails"
        }

        async fn save_message(&self, draft: NewMessage) -> Result<Message, StoreError> {
            self.0.save_message(draft).await
        }

        async fn conversation_history(
            &self,
            conversation_id: i64,
            limit: u32,
        ) -> Result<Vec<Message>, StoreError> {
            self.0.conversation_history(conversation_id, limit).await
        }

        async fn create_conversation(&self, title: &str) -> Result<Conversation, StoreError> {
            self.0.create_conversation(title).await
        }

        async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
            self.0.list_conversations().await
        }

        async fn update_conversation_title(&self, id: i64, title: &str) -> Result<(), StoreError> {
            self.0.update_conversation_title(id, title).await
        }

        async fn delete_conversation(&self, id: i64) -> Result<(), StoreError> {
            self.0.delete_conversation(id).await
        }

        async fn save_knowledge(
            &self,
            content: &str,
            conversation_id: Option<i64>,
        ) -> Result<(), StoreError> {
            self.0.save_knowledge(content, conversation_id).await
        }

        async fn search_knowledge(&self, _query: &str) -> Result<Vec<KnowledgeRecord>, StoreError> {
            Err(StoreError::QueryFailed("index corrupted".to_string()))
        }
    }
}

#[tokio::test]
async fn main_completion_failure_is_fatal() {
    let (store, conv_id) = store_with_conversation().await;
    let (engine, _) = engine(
        store.clone(),
        vec![Err(ProviderError::Network("connection refused".to_string()))],
    );

    let err = engine.handle_user_message(conv_id, "hi").await.unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::Network(_))));

    let history = store.conversation_history(conv_id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}
