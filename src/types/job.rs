//! RemoteJob type tracked by the worker service.
//!
//! A RemoteJob follows one GPU generation run from submission through a
//! terminal state. It lives only in the worker's in-memory registry; the
//! client sees it through [`JobView`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::{GenerationMode, GenerationRequest};

/// Status of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Registered, waiting for an execution slot.
    #[default]
    Queued,
    /// Holding a slot and running the generation command.
    Running,
    /// Audio artifact ready for download.
    Succeeded,
    /// Generation or post-processing failed.
    Failed,
}

impl JobStatus {
    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation run owned by the worker.
#[derive(Debug, Clone)]
pub struct RemoteJob {
    /// 32-character lowercase hex id.
    pub id: String,

    pub status: JobStatus,

    /// Working directory owned by this job alone.
    pub job_dir: PathBuf,

    /// The validated request.
    pub request: GenerationRequest,

    /// Mode derived from the request flags.
    pub mode: GenerationMode,

    /// Reference audio saved inside `job_dir`, if one was uploaded.
    pub prompt_audio: Option<PathBuf>,

    /// Final artifact; set only when succeeded.
    pub audio_path: Option<PathBuf>,

    /// Failure detail; set only when failed.
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RemoteJob {
    /// Creates a queued job.
    pub fn new(
        id: String,
        job_dir: PathBuf,
        request: GenerationRequest,
        mode: GenerationMode,
    ) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            job_dir,
            request,
            mode,
            prompt_audio: None,
            audio_path: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Marks the job as running. Ignored once terminal.
    pub fn set_running(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Marks the job as succeeded with its artifact. Ignored once terminal.
    pub fn set_succeeded(&mut self, audio_path: PathBuf) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Succeeded;
        self.audio_path = Some(audio_path);
        self.error = None;
        self.finished_at = Some(Utc::now());
    }

    /// Marks the job as failed. Ignored once terminal.
    pub fn set_failed(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.audio_path = None;
        self.finished_at = Some(Utc::now());
    }

    /// Wire representation served by `GET /v1/jobs/{id}`.
    pub fn view(&self) -> JobView {
        JobView {
            job_id: self.id.clone(),
            status: self.status,
            audio_path: self
                .audio_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            error: self.error.clone(),
        }
    }
}

/// Job state as exchanged over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
