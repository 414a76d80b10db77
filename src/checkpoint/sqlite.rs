//! Sqlite-backed checkpoint store.
//!
//! One row per thread; the checkpoint itself is stored as JSON so the schema
//! never has to track the conversation shape. Blocking rusqlite work runs on
//! the blocking pool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{now_string, Checkpoint, CheckpointStore};

pub struct SqliteSaver {
    path: PathBuf,
}

impl SqliteSaver {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|e| e.to_string())?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id  TEXT PRIMARY KEY,
                data       TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| e.to_string())?;
        Ok(Self { path })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, String> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path).map_err(|e| e.to_string())?;
            f(&conn)
        })
        .await
        .map_err(|e| format!("blocking task failed: {}", e))?
    }
}

#[async_trait]
impl CheckpointStore for SqliteSaver {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, String> {
        let thread_id = thread_id.to_string();
        self.with_conn(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM checkpoints WHERE thread_id = ?1",
                    params![thread_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| e.to_string())?;

            data.map(|json| serde_json::from_str(&json).map_err(|e| e.to_string()))
                .transpose()
        })
        .await
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), String> {
        let mut checkpoint = checkpoint.clone();
        self.with_conn(move |conn| {
            let existing_created_at: Option<String> = conn
                .query_row(
                    "SELECT created_at FROM checkpoints WHERE thread_id = ?1",
                    params![checkpoint.thread_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| e.to_string())?;

            if let Some(created_at) = existing_created_at {
                checkpoint.created_at = created_at;
            }
            checkpoint.updated_at = now_string();

            let data = serde_json::to_string(&checkpoint).map_err(|e| e.to_string())?;
            conn.execute(
                "INSERT INTO checkpoints (thread_id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(thread_id) DO UPDATE SET
                     data = excluded.data,
                     updated_at = excluded.updated_at",
                params![
                    checkpoint.thread_id,
                    data,
                    checkpoint.created_at,
                    checkpoint.updated_at
                ],
            )
            .map_err(|e| e.to_string())?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, String> {
        let thread_id = thread_id.to_string();
        self.with_conn(move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM checkpoints WHERE thread_id = ?1",
                    params![thread_id],
                )
                .map_err(|e| e.to_string())?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_threads(&self) -> Result<Vec<String>, String> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT thread_id FROM checkpoints ORDER BY thread_id")
                .map_err(|e| e.to_string())?;
            let threads = stmt
                .query_map([], |row| row.get(0))
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<String>, _>>()
                .map_err(|e| e.to_string())?;
            Ok(threads)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    fn temp_db() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkpoints.db");
        (dir, path)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (_dir, path) = temp_db();
        let store = SqliteSaver::open(&path).expect("open");

        let mut checkpoint = Checkpoint::new("t1");
        checkpoint.state.messages.push(ChatMessage::user("hello"));
        store.save(&checkpoint).await.expect("save");

        let loaded = store
            .load("t1")
            .await
            .expect("load")
            .expect("checkpoint exists");
        assert_eq!(loaded.state.messages.len(), 1);
        assert_eq!(loaded.thread_id, "t1");
    }

    #[tokio::test]
    async fn checkpoints_survive_reopening() {
        let (_dir, path) = temp_db();
        {
            let store = SqliteSaver::open(&path).expect("open");
            store.save(&Checkpoint::new("t1")).await.expect("save");
        }

        let reopened = SqliteSaver::open(&path).expect("reopen");
        assert!(reopened.is_persistent());
        let loaded = reopened.load("t1").await.expect("load");
        assert!(loaded.is_some());
    }

    #[tokio::test]
    async fn upsert_preserves_created_at() {
        let (_dir, path) = temp_db();
        let store = SqliteSaver::open(&path).expect("open");

        store.save(&Checkpoint::new("t1")).await.expect("first save");
        let created_at = store
            .load("t1")
            .await
            .expect("load")
            .expect("exists")
            .created_at;

        let mut second = Checkpoint::new("t1");
        second.state.messages.push(ChatMessage::user("again"));
        store.save(&second).await.expect("second save");

        let loaded = store.load("t1").await.expect("load").expect("exists");
        assert_eq!(loaded.created_at, created_at);
        assert_eq!(loaded.state.messages.len(), 1);
    }

    #[tokio::test]
    async fn delete_and_list() {
        let (_dir, path) = temp_db();
        let store = SqliteSaver::open(&path).expect("open");

        store.save(&Checkpoint::new("a")).await.expect("save a");
        store.save(&Checkpoint::new("b")).await.expect("save b");
        assert_eq!(store.list_threads().await.expect("list"), vec!["a", "b"]);

        assert!(store.delete("a").await.expect("delete"));
        assert!(!store.delete("a").await.expect("second delete"));
        assert_eq!(store.list_threads().await.expect("list"), vec!["b"]);
    }
}
