//! Prompt assembly. Pure string rendering, no I/O.
//!
//! Folds the standing instructions, retrieved knowledge, and recent
//! history into the single prompt sent to the completion provider. The
//! section order is fixed: instructions, knowledge, history, current
//! message. Both the knowledge and history section headers are emitted
//! even when their sections are empty, so the model always sees the same
//! frame.

use mnemo_core::message::Message;
use std::fmt::Write;

use crate::retriever::KnowledgeHit;

/// Standing instructions prepended to every prompt. Defines the four
/// actions and the JSON envelope the interpreter expects back.
pub const SYSTEM_INSTRUCTIONS: &str = r#"You are an AI assistant that can:
1. Reply to users (action: "reply")
2. Store important information in a knowledge base (action: "store")
3. Search existing knowledge (action: "search")
4. Create new conversations when topics change significantly (action: "new_conversation")

When storing knowledge:
- Only store specific, important facts or information
- Extract and summarize the key information, don't store entire conversations
- Format the information clearly and concisely

When the user asks about previous information or references past conversations,
use the "reply" action to respond using the conversation history and knowledge provided.
Only use "search" when explicitly asked to search for something.

IMPORTANT: Your response must be a valid JSON object, but the "content" field should contain
your natural language response to the user, not JSON or technical details.

Respond with a JSON object containing:
{
    "action": "reply|store|search|new_conversation",
    "content": "Your natural language response here...",
    "store_info": {
        "user_input": ["The key information to store"],
        "bot_response": ["Confirmation or clarification of the stored info"]
    },
    "new_title": "optional: title for new conversation if action is new_conversation"
}"#;

/// Everything the assembler needs to render one turn's prompt.
///
/// `history` is newest-first, as the store returns it; rendering reverses
/// it so the model reads the conversation in chronological order.
pub struct PromptInput<'a> {
    pub knowledge: &'a [KnowledgeHit],
    pub history: &'a [Message],
    pub current: &'a Message,
}

/// Render the full prompt for one turn.
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = String::with_capacity(SYSTEM_INSTRUCTIONS.len() + 512);
    prompt.push_str(SYSTEM_INSTRUCTIONS);

    prompt.push_str("\n\nRelevant knowledge from database:\n");
    for hit in input.knowledge {
        let _ = writeln!(prompt, "- {} (relevance: {:.2})", hit.content, hit.relevance);
    }

    prompt.push_str("\n\nConversation history:\n");
    for message in input.history.iter().rev() {
        let _ = writeln!(prompt, "{}: {}", message.role, message.content);
    }

    let _ = write!(
        prompt,
        "\nCurrent message:\n{}: {}\n\nResponse:",
        input.current.role, input.current.content
    );

    prompt
}
