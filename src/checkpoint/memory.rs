//! In-memory checkpoint store (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{now_string, Checkpoint, CheckpointStore};

#[derive(Clone, Default)]
pub struct InMemorySaver {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemorySaver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemorySaver {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, String> {
        Ok(self.checkpoints.read().await.get(thread_id).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), String> {
        let mut checkpoints = self.checkpoints.write().await;
        let mut checkpoint = checkpoint.clone();
        if let Some(existing) = checkpoints.get(&checkpoint.thread_id) {
            checkpoint.created_at = existing.created_at.clone();
        }
        checkpoint.updated_at = now_string();
        checkpoints.insert(checkpoint.thread_id.clone(), checkpoint);
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, String> {
        Ok(self.checkpoints.write().await.remove(thread_id).is_some())
    }

    async fn list_threads(&self) -> Result<Vec<String>, String> {
        let mut threads: Vec<String> = self.checkpoints.read().await.keys().cloned().collect();
        threads.sort();
        Ok(threads)
    }
}
