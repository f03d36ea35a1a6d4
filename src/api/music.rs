//! Music generation endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::AppState;
use crate::error::{DaemonError, Result};
use crate::orchestrator::{submit_generation, Submission, Submitted};
use crate::types::{AudioFormat, GenerationRequest, Task, TaskType};

/// Body of `POST /api/music/generate`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMusicRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Title of the session created when `session_id` is absent.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration_sec: Option<u32>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub instrumental: Option<bool>,
    #[serde(default)]
    pub format: Option<AudioFormat>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl GenerateMusicRequest {
    fn into_submission(self, default_duration_sec: u32) -> Submission {
        let mut request =
            GenerationRequest::new(self.prompt, self.duration_sec.unwrap_or(default_duration_sec));
        request.style = self.style;
        request.lyrics = self.lyrics;
        request.seed = self.seed;
        if let Some(instrumental) = self.instrumental {
            request.instrumental = instrumental;
        }
        if let Some(format) = self.format {
            request.format = format;
        }
        Submission {
            owner_id: self.owner_id,
            session_id: self.session_id,
            title: self.title,
            request,
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/music/generate", post(generate_music))
        .route("/music/generate/{task_id}", get(get_generation))
}

pub async fn generate_music(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateMusicRequest>,
) -> Result<Json<Submitted>> {
    if req.prompt.trim().is_empty() && req.lyrics.as_deref().map_or(true, |l| l.trim().is_empty()) {
        return Err(DaemonError::validation("prompt must not be empty"));
    }
    let submission = req.into_submission(state.default_duration_sec);
    Ok(Json(submit_generation(&state.pipeline, submission).await?))
}

/// Task of a generation, failing it first if it has gone stale.
pub async fn get_generation(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>> {
    let task = state
        .tasks()
        .get_checked(&task_id, TaskType::GenerateMusic, state.stale_after)
        .await?
        .ok_or_else(|| DaemonError::not_found(format!("task {}", task_id)))?;
    Ok(Json(task))
}
