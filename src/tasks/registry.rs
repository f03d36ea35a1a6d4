//! Persisted task state machine.
//!
//! `pending -> processing -> {completed | failed}`. Every transition is a
//! single `UPDATE ... RETURNING` statement, terminal states are never left,
//! and `result` is present exactly when the task is completed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DaemonError, Result};
use crate::store::{Store, TaskFilter, TaskUpdate};
use crate::types::{NewTask, Task, TaskStatus, TaskType};

/// Message written when the staleness guard fails a task.
pub const STALE_TASK_MESSAGE: &str =
    "task timed out without update (worker restart or storage disconnect?)";

/// Task operations over a [`Store`].
#[derive(Clone)]
pub struct TaskRegistry {
    store: Arc<dyn Store>,
}

impl TaskRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Creates a task, pending unless `auto_complete` is set.
    pub async fn create(&self, new: NewTask) -> Result<Task> {
        let now = Utc::now();
        let (status, result) = if new.auto_complete {
            (
                TaskStatus::Completed,
                Some(new.result.unwrap_or_else(|| json!({}))),
            )
        } else {
            (TaskStatus::Pending, None)
        };

        let task = Task {
            id: Uuid::new_v4().to_string(),
            task_type: new.task_type,
            status,
            owner_id: new.owner_id,
            input: new.input,
            result,
            message: new.message,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_task(&task).await?;
        debug!(task_id = %task.id, task_type = task.task_type.as_str(), status = %task.status, "task created");
        Ok(task)
    }

    /// Moves a task to a non-completed status and clears any result.
    ///
    /// `completed` is refused; use [`TaskRegistry::complete`].
    pub async fn set_status(
        &self,
        id: &str,
        status: TaskStatus,
        message: Option<String>,
    ) -> Result<Option<Task>> {
        if status == TaskStatus::Completed {
            return Err(DaemonError::validation(
                "set_status cannot complete a task; use complete with a result",
            ));
        }
        self.transition(id, status, None, message).await
    }

    /// Marks a task completed with `result`.
    pub async fn complete(
        &self,
        id: &str,
        result: Value,
        message: Option<String>,
    ) -> Result<Option<Task>> {
        self.transition(id, TaskStatus::Completed, Some(result), message)
            .await
    }

    /// Marks a task failed with a diagnostic message.
    pub async fn fail(&self, id: &str, message: impl Into<String>) -> Result<Option<Task>> {
        self.transition(id, TaskStatus::Failed, None, Some(message.into()))
            .await
    }

    /// Fails a task only if it is still processing.
    ///
    /// Returns the task as stored afterwards, so a task that reached another
    /// status first comes back unchanged.
    pub async fn fail_if_processing(
        &self,
        id: &str,
        message: impl Into<String>,
    ) -> Result<Option<Task>> {
        let update = TaskUpdate {
            status: TaskStatus::Failed,
            result: None,
            message: Some(message.into()),
            at: Utc::now(),
            from: Some(TaskStatus::Processing),
        };
        match self.store.update_task(id, &update).await? {
            Some(task) => {
                debug!(task_id = %id, "processing task failed");
                Ok(Some(task))
            }
            None => self.store.get_task(id).await,
        }
    }

    /// Applies a transition out of a non-terminal status.
    ///
    /// Unknown ids give `None`; a terminal task is a `CONFLICT`.
    async fn transition(
        &self,
        id: &str,
        status: TaskStatus,
        result: Option<Value>,
        message: Option<String>,
    ) -> Result<Option<Task>> {
        let update = TaskUpdate {
            status,
            result,
            message,
            at: Utc::now(),
            from: None,
        };
        if let Some(task) = self.store.update_task(id, &update).await? {
            debug!(task_id = %id, status = %task.status, "task transitioned");
            return Ok(Some(task));
        }
        match self.store.get_task(id).await? {
            Some(current) => Err(DaemonError::conflict(format!(
                "task {} is already {}",
                id, current.status
            ))),
            None => {
                warn!(task_id = %id, status = %status, "transition on unknown task");
                Ok(None)
            }
        }
    }

    /// Reads a task; a type mismatch is reported as not found.
    pub async fn get(&self, id: &str, expected_type: Option<TaskType>) -> Result<Option<Task>> {
        let task = self.store.get_task(id).await?;
        Ok(task.filter(|t| expected_type.map_or(true, |expected| t.task_type == expected)))
    }

    /// Tasks filtered by owner and status, newest first.
    pub async fn list(
        &self,
        owner_id: Option<String>,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>> {
        self.store
            .list_tasks(&TaskFilter { owner_id, status })
            .await
    }

    /// Reads a task, failing it first if it has been processing without
    /// any update for longer than `stale_after`.
    pub async fn get_checked(
        &self,
        id: &str,
        expected_type: TaskType,
        stale_after: Duration,
    ) -> Result<Option<Task>> {
        let Some(task) = self.get(id, Some(expected_type)).await? else {
            return Ok(None);
        };
        if task.status != TaskStatus::Processing {
            return Ok(Some(task));
        }

        let idle = task.idle_for(Utc::now());
        let limit = chrono::Duration::from_std(stale_after)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        if idle <= limit {
            return Ok(Some(task));
        }

        warn!(
            task_id = %id,
            idle_secs = idle.num_seconds(),
            "failing stale task"
        );
        self.fail_if_processing(id, STALE_TASK_MESSAGE).await
    }
}
