//! Generic task endpoints.
//!
//! Synchronous features (emotion analysis, for one) record their output as
//! an already-completed task so that every result is polled the same way.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use super::AppState;
use crate::error::{DaemonError, Result};
use crate::types::{NewTask, Task, TaskStatus, TaskType};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub auto_complete: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskTypeQuery {
    #[serde(rename = "type")]
    pub task_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub owner: Option<String>,
    pub status: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<Task>> {
    let new = NewTask {
        task_type: req.task_type,
        input: req.input,
        owner_id: req.owner_id,
        auto_complete: req.auto_complete,
        result: req.result,
        message: req.message,
    };
    Ok(Json(state.tasks().create(new).await?))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<TaskTypeQuery>,
) -> Result<Json<Task>> {
    let expected = q
        .task_type
        .as_deref()
        .map(|t| {
            TaskType::parse(t).ok_or_else(|| DaemonError::validation(format!("unknown task type: {}", t)))
        })
        .transpose()?;
    let task = state
        .tasks()
        .get(&id, expected)
        .await?
        .ok_or_else(|| DaemonError::not_found(format!("task {}", id)))?;
    Ok(Json(task))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>> {
    let status = q
        .status
        .as_deref()
        .map(|s| {
            TaskStatus::parse(s).ok_or_else(|| DaemonError::validation(format!("unknown status: {}", s)))
        })
        .transpose()?;
    Ok(Json(state.tasks().list(q.owner, status).await?))
}
