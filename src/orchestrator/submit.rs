//! Synchronous entry point for background generation.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::pipeline::{Pipeline, PipelineJob};
use crate::error::{DaemonError, Result};
use crate::generation::FallbackEnricher;
use crate::types::{GenerationRequest, Message, NewTask, Session, Task, TaskStatus, TaskType};

/// Reply shown on the placeholder message while the track is generated.
pub const PLACEHOLDER_REPLY: &str = "Composing your track, please wait...";
pub const QUEUED_MESSAGE: &str = "queued for generation";

/// A request to generate a track inside a session.
#[derive(Debug, Clone)]
pub struct Submission {
    pub owner_id: Option<String>,
    /// Existing session; a new one is created when absent.
    pub session_id: Option<String>,
    /// Title for a newly created session.
    pub title: Option<String>,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submitted {
    pub task_id: String,
    pub status: TaskStatus,
    pub session_id: String,
    pub message_id: String,
}

/// Records the task and placeholder message, then starts the pipeline in
/// the background.
///
/// Invalid requests fail with `VALIDATION` before anything is written. Once
/// the task exists, any error fails it before being returned.
pub async fn submit_generation(pipeline: &Pipeline, submission: Submission) -> Result<Submitted> {
    submission.request.validate()?;
    let tasks = pipeline.tasks();
    let store = tasks.store();

    let session_id = match submission.session_id {
        Some(id) => {
            if !store.session_exists(&id).await? {
                return Err(DaemonError::not_found(format!("session {}", id)));
            }
            id
        }
        None => {
            let session = Session {
                id: Uuid::new_v4().to_string(),
                owner_id: submission.owner_id.clone(),
                title: submission
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| FallbackEnricher::title_for(&submission.request.prompt)),
                created_at: Utc::now(),
            };
            store.create_session(&session).await?;
            session.id
        }
    };

    let input = serde_json::to_value(&submission.request)?;
    let task = tasks
        .create(
            NewTask::pending(TaskType::GenerateMusic, input)
                .with_owner(submission.owner_id.clone()),
        )
        .await?;
    let task_id = task.id.clone();

    match start(pipeline, task, session_id, submission.owner_id, submission.request).await {
        Ok(submitted) => Ok(submitted),
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "submission failed after task was created");
            pipeline.abandon(&task_id, &e).await;
            Err(e)
        }
    }
}

/// Queues a created task: placeholder message, then the background run.
async fn start(
    pipeline: &Pipeline,
    task: Task,
    session_id: String,
    owner_id: Option<String>,
    request: GenerationRequest,
) -> Result<Submitted> {
    let tasks = pipeline.tasks();
    let status = tasks
        .set_status(&task.id, TaskStatus::Processing, Some(QUEUED_MESSAGE.to_string()))
        .await?
        .map_or(task.status, |t| t.status);

    let message = Message {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.clone(),
        user_text: request.prompt.clone(),
        reply_text: PLACEHOLDER_REPLY.to_string(),
        track_id: None,
        created_at: Utc::now(),
    };
    tasks.store().insert_message(&message).await?;

    let job = PipelineJob {
        task_id: task.id.clone(),
        session_id: session_id.clone(),
        message_id: message.id.clone(),
        owner_id,
        request,
    };
    let runner = pipeline.clone();
    tokio::spawn(async move { runner.run(job).await });
    info!(task_id = %task.id, session_id = %session_id, "generation submitted");

    Ok(Submitted {
        task_id: task.id,
        status,
        session_id,
        message_id: message.id,
    })
}
