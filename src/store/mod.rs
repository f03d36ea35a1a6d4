//! Persistence layer.
//!
//! [`Store`] is the interface every persisted operation goes through; the
//! default implementation is [`sqlite::SqliteStore`]. The orchestrator
//! holds it as `Arc<dyn Store>` so that a dropped connection can be
//! replaced in place with [`Store::reconnect`], and [`StoreOpener`] gives
//! the recovery path a brand-new handle when the primary one is unusable.

pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::types::{Message, Session, Task, TaskStatus, Track};

pub use sqlite::{SqliteOpener, SqliteStore};

/// One atomic task transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    /// Written as-is: `None` clears any stored result.
    pub result: Option<Value>,
    /// `None` keeps the stored message.
    pub message: Option<String>,
    /// Candidate `updated_at`; the stored value never moves backwards.
    pub at: DateTime<Utc>,
    /// Status the row must currently have for the update to apply.
    pub from: Option<TaskStatus>,
}

/// Filter for [`Store::list_tasks`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub owner_id: Option<String>,
    pub status: Option<TaskStatus>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip proving the connection is usable.
    async fn ping(&self) -> Result<()>;

    /// Replaces the underlying connection pool.
    async fn reconnect(&self) -> Result<()>;

    async fn insert_task(&self, task: &Task) -> Result<()>;

    /// Applies `update` in a single statement and returns the new row.
    ///
    /// Terminal rows are never updated; `None` means the id is unknown,
    /// the row is terminal, or it does not have the status `update.from`.
    async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<Option<Task>>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>>;

    /// Tasks matching `filter`, newest first.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    async fn create_session(&self, session: &Session) -> Result<()>;

    async fn session_exists(&self, id: &str) -> Result<bool>;

    /// Deletes a session and its messages. Returns false when it did not exist.
    async fn delete_session(&self, id: &str) -> Result<bool>;

    async fn insert_message(&self, message: &Message) -> Result<()>;

    /// Messages of a session, oldest first.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Rewrites a message's reply text. Returns false when it did not exist.
    async fn update_message_reply(&self, id: &str, reply: &str) -> Result<bool>;

    /// Stores `track` and points the message at it in one transaction.
    ///
    /// Fails with `FATAL_REFERENCE` when the message no longer exists.
    async fn insert_track_and_link_message(
        &self,
        track: &Track,
        message_id: &str,
        reply: &str,
    ) -> Result<()>;
}

/// Opens a fresh, independent store handle.
#[async_trait]
pub trait StoreOpener: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn Store>>;
}

/// Timestamp text stored in the database.
///
/// Fixed width so that SQL string comparison matches time order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
