//! Task type for client-visible asynchronous work.
//!
//! A Task is created once per request and mirrors the pipeline's progress
//! in the database so that callers can poll it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of work a task tracks. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    GenerateMusic,
    AnalyzeEmotion,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::GenerateMusic => "generate_music",
            TaskType::AnalyzeEmotion => "analyze_emotion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "generate_music" => Some(TaskType::GenerateMusic),
            "analyze_emotion" => Some(TaskType::AnalyzeEmotion),
            _ => None,
        }
    }
}

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "processing" => Some(TaskStatus::Processing),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted task record.
///
/// `result` is present exactly when `status` is `completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub owner_id: Option<String>,
    pub input: Value,
    pub result: Option<Value>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Time since the last recorded transition.
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.updated_at)
    }
}

/// Parameters for creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_type: TaskType,
    pub input: Value,
    pub owner_id: Option<String>,
    /// Create the task already completed with `result`.
    pub auto_complete: bool,
    pub result: Option<Value>,
    pub message: Option<String>,
}

impl NewTask {
    /// A pending task with no owner.
    pub fn pending(task_type: TaskType, input: Value) -> Self {
        Self {
            task_type,
            input,
            owner_id: None,
            auto_complete: false,
            result: None,
            message: None,
        }
    }

    pub fn with_owner(mut self, owner_id: Option<String>) -> Self {
        self.owner_id = owner_id;
        self
    }

    /// Marks the task to be created completed with `result`.
    pub fn completed_with(mut self, result: Value) -> Self {
        self.auto_complete = true;
        self.result = Some(result);
        self
    }
}
