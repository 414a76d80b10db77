//! Per-thread conversation state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::ChatMessage;

/// The full state of one conversation thread: the ordered message history plus
/// arbitrary key/value fields written by tools (e.g. a verified name).
///
/// Owned exclusively by one thread id; only the dispatch loop mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, Value>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge tool-supplied field updates. Later writes win.
    pub fn merge_fields(&mut self, updates: HashMap<String, Value>) {
        self.fields.extend(updates);
    }
}
