//! Response interpretation. Turns one raw completion into a structured
//! action, repairing the ways models imperfectly follow the envelope.
//!
//! The repair pipeline runs in a fixed order:
//! 1. parse the completion as the JSON envelope; a parse failure is not
//!    an error, it becomes a `reply` carrying the raw text verbatim
//! 2. if the parsed `content` is itself a JSON object or array with a
//!    `content` string inside, unwrap that inner value (double-encoded
//!    model output)
//! 3. trim `content` and strip exactly one layer of surrounding matching
//!    quotes
//! 4. validate the action tag; an unknown tag is a hard error, never
//!    repaired
//!
//! Everything here is pure. Side effects belong to the dispatcher.

use mnemo_core::error::Error;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// The four actions a completion may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reply,
    Store,
    Search,
    NewConversation,
}

impl Action {
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "reply" => Some(Self::Reply),
            "store" => Some(Self::Store),
            "search" => Some(Self::Search),
            "new_conversation" => Some(Self::NewConversation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Store => "store",
            Self::Search => "search",
            Self::NewConversation => "new_conversation",
        }
    }
}

/// Facts the model asked to persist, paired with its own commentary.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StoreInfo {
    #[serde(default)]
    pub user_input: Vec<String>,
    #[serde(default)]
    pub bot_response: Vec<String>,
}

/// A completion after interpretation: validated action, repaired content.
#[derive(Debug, Clone)]
pub struct InterpretedResponse {
    pub action: Action,
    pub content: String,
    pub store_info: Option<StoreInfo>,
    pub new_title: Option<String>,
}

/// The JSON envelope as the model is asked to emit it. Lenient: every
/// field except `action` may be missing.
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    action: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    store_info: Option<StoreInfo>,
    #[serde(default)]
    new_title: Option<String>,
}

/// Interpret one raw completion.
///
/// Only an unrecognized action tag fails; every malformed-output shape is
/// repaired into a usable response.
pub fn interpret(raw: &str) -> Result<InterpretedResponse, Error> {
    let wire: WireResponse = match serde_json::from_str(raw) {
        Ok(wire) => wire,
        Err(err) => {
            warn!(error = %err, "Completion is not valid JSON, treating it as a plain reply");
            return Ok(InterpretedResponse {
                action: Action::Reply,
                content: raw.to_string(),
                store_info: None,
                new_title: None,
            });
        }
    };

    let content = repair_content(wire.content);

    let action = Action::parse(&wire.action)
        .ok_or_else(|| Error::UnknownAction(wire.action.clone()))?;

    Ok(InterpretedResponse {
        action,
        content,
        store_info: wire.store_info,
        new_title: wire.new_title,
    })
}

/// Unwrap double-encoded content, then trim and strip one quote layer.
fn repair_content(content: String) -> String {
    let content = unwrap_double_encoded(content);
    let trimmed = content.trim();
    strip_one_quote_layer(trimmed).to_string()
}

/// If `content` is itself a JSON object or array carrying a `content`
/// string field, replace it with that inner value. The replacement
/// happens only when the inner document actually parses.
fn unwrap_double_encoded(content: String) -> String {
    let probe = content.trim_start();
    if !(probe.starts_with('{') || probe.starts_with('[')) {
        return content;
    }
    match serde_json::from_str::<Value>(probe) {
        Ok(inner) => match inner.get("content").and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None => content,
        },
        Err(_) => content,
    }
}

/// Strip exactly one layer of surrounding quotes, only when both ends
/// carry the same quote character.
fn strip_one_quote_layer(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}
