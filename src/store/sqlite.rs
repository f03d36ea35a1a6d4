//! SQLite implementation of [`Store`].
//!
//! Migrations under `migrations/` are embedded at compile time and run by
//! [`SqliteStore::connect`]. Queries use the runtime-checked `sqlx::query`
//! form so no database is needed at build time. Timestamps are stored as
//! fixed-width RFC 3339 text and JSON payloads as text.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{timestamp, Store, StoreOpener, TaskFilter, TaskUpdate};
use crate::error::{DaemonError, Result};
use crate::types::{Message, Session, Task, TaskStatus, TaskType, Track};

const MAX_CONNECTIONS: u32 = 5;

const TASK_COLUMNS: &str =
    "id, task_type, status, owner_id, input, result, message, created_at, updated_at";

/// SQLite-backed store whose pool can be swapped on reconnect.
#[derive(Debug)]
pub struct SqliteStore {
    url: String,
    pool: RwLock<SqlitePool>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `url` and runs pending migrations.
    ///
    /// `url` is a sqlx SQLite URL such as `sqlite://songgen.db?mode=rwc`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = open_pool(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(url = %url, "database ready");
        Ok(Self {
            url: url.to_string(),
            pool: RwLock::new(pool),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn pool(&self) -> SqlitePool {
        self.pool.read().await.clone()
    }

    /// Closes the current pool; later calls fail until [`Store::reconnect`].
    pub async fn close(&self) {
        self.pool().await.close().await;
    }
}

async fn open_pool(url: &str) -> Result<SqlitePool> {
    Ok(SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(url)
        .await?)
}

fn parse_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(raw = %raw, error = %e, "failed to parse stored timestamp; using now");
            Utc::now()
        })
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let created_at: String = row.try_get("created_at")?;
    Ok(Message {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        user_text: row.try_get("user_text")?,
        reply_text: row.try_get("reply_text")?,
        track_id: row.try_get("track_id")?,
        created_at: parse_time(&created_at),
    })
}

fn parse_json(raw: Option<String>) -> Result<Option<Value>> {
    raw.map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(Into::into)
}

fn task_from_row(row: &SqliteRow) -> Result<Task> {
    let task_type: String = row.try_get("task_type")?;
    let status: String = row.try_get("status")?;
    let input: String = row.try_get("input")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Task {
        id: row.try_get("id")?,
        task_type: TaskType::parse(&task_type)
            .ok_or_else(|| DaemonError::storage(format!("unknown task type: {}", task_type)))?,
        status: TaskStatus::parse(&status)
            .ok_or_else(|| DaemonError::storage(format!("unknown task status: {}", status)))?,
        owner_id: row.try_get("owner_id")?,
        input: serde_json::from_str(&input)?,
        result: parse_json(row.try_get("result")?)?,
        message: row.try_get("message")?,
        created_at: parse_time(&created_at),
        updated_at: parse_time(&updated_at),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool().await).await?;
        Ok(())
    }

    async fn reconnect(&self) -> Result<()> {
        let fresh = open_pool(&self.url).await?;
        let stale = std::mem::replace(&mut *self.pool.write().await, fresh);
        stale.close().await;
        info!("database connection re-established");
        Ok(())
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        let result = task.result.as_ref().map(Value::to_string);
        sqlx::query(
            "INSERT INTO tasks (id, task_type, status, owner_id, input, result, message, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&task.id)
        .bind(task.task_type.as_str())
        .bind(task.status.as_str())
        .bind(&task.owner_id)
        .bind(task.input.to_string())
        .bind(result)
        .bind(&task.message)
        .bind(timestamp(task.created_at))
        .bind(timestamp(task.updated_at))
        .execute(&self.pool().await)
        .await?;
        Ok(())
    }

    async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<Option<Task>> {
        let result = update.result.as_ref().map(Value::to_string);
        let sql = format!(
            "UPDATE tasks SET status = ?1, result = ?2, message = COALESCE(?3, message), \
             updated_at = MAX(updated_at, ?4) \
             WHERE id = ?5 AND status IN ('pending', 'processing') \
             AND (?6 IS NULL OR status = ?6) RETURNING {}",
            TASK_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(update.status.as_str())
            .bind(result)
            .bind(&update.message)
            .bind(timestamp(update.at))
            .bind(id)
            .bind(update.from.map(|s| s.as_str()))
            .fetch_optional(&self.pool().await)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool().await)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks \
             WHERE (?1 IS NULL OR owner_id = ?1) AND (?2 IS NULL OR status = ?2) \
             ORDER BY created_at DESC",
            TASK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&filter.owner_id)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.pool().await)
            .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        sqlx::query("INSERT INTO sessions (id, owner_id, title, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&session.id)
            .bind(&session.owner_id)
            .bind(&session.title)
            .bind(timestamp(session.created_at))
            .execute(&self.pool().await)
            .await?;
        Ok(())
    }

    async fn session_exists(&self, id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool().await)
            .await?;
        Ok(row.is_some())
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        let done = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool().await)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn insert_message(&self, message: &Message) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (id, session_id, user_text, reply_text, track_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&message.id)
        .bind(&message.session_id)
        .bind(&message.user_text)
        .bind(&message.reply_text)
        .bind(&message.track_id)
        .bind(timestamp(message.created_at))
        .execute(&self.pool().await)
        .await?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, session_id, user_text, reply_text, track_id, created_at FROM messages \
             WHERE session_id = ?1 ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool().await)
        .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn update_message_reply(&self, id: &str, reply: &str) -> Result<bool> {
        let done = sqlx::query("UPDATE messages SET reply_text = ?1 WHERE id = ?2")
            .bind(reply)
            .bind(id)
            .execute(&self.pool().await)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn insert_track_and_link_message(
        &self,
        track: &Track,
        message_id: &str,
        reply: &str,
    ) -> Result<()> {
        let pool = self.pool().await;
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO tracks (id, owner_id, session_id, title, artist, file_name, storage_path, \
             public_url, size_bytes, format, duration_sec, sample_rate, sha256, cover_path, \
             model_name, source, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .bind(&track.id)
        .bind(&track.owner_id)
        .bind(&track.session_id)
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.file_name)
        .bind(&track.storage_path)
        .bind(&track.public_url)
        .bind(track.size_bytes)
        .bind(&track.format)
        .bind(track.duration_sec)
        .bind(track.sample_rate)
        .bind(&track.sha256)
        .bind(&track.cover_path)
        .bind(&track.model_name)
        .bind(&track.source)
        .bind(timestamp(track.created_at))
        .execute(&mut *tx)
        .await?;

        let linked = sqlx::query("UPDATE messages SET track_id = ?1, reply_text = ?2 WHERE id = ?3")
            .bind(&track.id)
            .bind(reply)
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        if linked.rows_affected() == 0 {
            // Dropping the transaction rolls the track insert back.
            return Err(DaemonError::fatal_reference(format!("message {}", message_id)));
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Opens new [`SqliteStore`] handles on the same database.
#[derive(Debug, Clone)]
pub struct SqliteOpener {
    url: String,
}

impl SqliteOpener {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl StoreOpener for SqliteOpener {
    async fn open(&self) -> Result<Arc<dyn Store>> {
        Ok(Arc::new(SqliteStore::connect(&self.url).await?))
    }
}
