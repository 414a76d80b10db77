//! Checkpoint store: thread id → latest conversation snapshot.
//!
//! A checkpoint is written after every completed or suspended turn and never
//! deleted automatically. Stores are keyed and last-write-wins; distinct
//! thread ids may be written concurrently.

mod memory;
mod sqlite;

pub use memory::InMemorySaver;
pub use sqlite::SqliteSaver;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::llm::ToolCall;
use crate::state::ConversationState;

/// Current timestamp as an RFC 3339 string.
pub(crate) fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// Why a turn is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptReason {
    /// The tool call is waiting for a human go/no-go.
    Approval,
    /// The tool itself asked a human for information.
    HumanInput,
}

/// A suspended tool execution, persisted with enough context to resume
/// deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInterrupt {
    /// Resumption token, unique per suspension.
    pub token: Uuid,
    /// The tool call being held.
    pub tool_call: ToolCall,
    pub reason: InterruptReason,
    /// Opaque payload describing what is being asked.
    pub payload: Value,
    /// Tool executions already spent in this turn; the per-turn bound keeps
    /// counting from here after resume.
    pub iterations_used: usize,
}

/// Latest snapshot of one conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: ConversationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingInterrupt>,
    pub created_at: String,
    pub updated_at: String,
}

impl Checkpoint {
    /// Fresh checkpoint for a thread's first turn.
    pub fn new(thread_id: impl Into<String>) -> Self {
        let now = now_string();
        Self {
            thread_id: thread_id.into(),
            state: ConversationState::new(),
            pending: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Keyed, last-write-wins checkpoint storage.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Whether checkpoints survive a process restart.
    fn is_persistent(&self) -> bool;

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, String>;

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), String>;

    /// Remove a thread's checkpoint. Returns whether anything was deleted.
    async fn delete(&self, thread_id: &str) -> Result<bool, String>;

    async fn list_threads(&self) -> Result<Vec<String>, String>;
}
