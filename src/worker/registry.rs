//! In-memory registry of remote jobs and their execution slots.
//!
//! Jobs are registered synchronously on submission and run on a spawned
//! task once a slot frees up. The number of concurrently running
//! generation commands never exceeds the configured slot count.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::runner::JobRunner;
use crate::error::{DaemonError, Result};
use crate::types::{GenerationRequest, JobView, RemoteJob};

/// Reference audio uploaded alongside a request.
#[derive(Debug, Clone)]
pub struct ReferenceAudio {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl ReferenceAudio {
    /// Extension of the uploaded file, `wav` when unknown.
    fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "wav".to_string())
    }
}

/// Creates the job directory and saves the reference audio in it.
///
/// The directory is removed again when the reference cannot be written.
async fn prepare_job_dir(
    job_dir: &Path,
    reference: Option<&ReferenceAudio>,
) -> Result<Option<PathBuf>> {
    tokio::fs::create_dir_all(job_dir).await?;
    let Some(reference) = reference.filter(|r| !r.bytes.is_empty()) else {
        return Ok(None);
    };
    let path = job_dir.join(format!("prompt_audio.{}", reference.extension()));
    if let Err(e) = tokio::fs::write(&path, &reference.bytes).await {
        if let Err(cleanup) = tokio::fs::remove_dir_all(job_dir).await {
            warn!(dir = %job_dir.display(), error = %cleanup, "failed to remove job directory");
        }
        return Err(e.into());
    }
    Ok(Some(path))
}

/// Registry of every job this worker has accepted since it started.
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, RemoteJob>>,
    slots: Arc<Semaphore>,
    slot_count: usize,
    jobs_dir: PathBuf,
    runner: JobRunner,
}

impl JobRegistry {
    pub fn new(runner: JobRunner, jobs_dir: PathBuf, slots: usize) -> Self {
        let slot_count = slots.max(1);
        Self {
            jobs: Mutex::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(slot_count)),
            slot_count,
            jobs_dir,
            runner,
        }
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Slots not currently held by a running job.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RemoteJob>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validates the request, registers a queued job and schedules it.
    ///
    /// Invalid requests fail before any directory is created.
    pub async fn submit(
        self: &Arc<Self>,
        request: GenerationRequest,
        reference: Option<ReferenceAudio>,
    ) -> Result<JobView> {
        let mode = request.validate()?;

        let id = Uuid::new_v4().simple().to_string();
        let job_dir = self.jobs_dir.join(&id);
        let prompt_audio = prepare_job_dir(&job_dir, reference.as_ref()).await?;

        let mut job = RemoteJob::new(id.clone(), job_dir, request, mode);
        job.prompt_audio = prompt_audio;

        let view = job.view();
        self.lock().insert(id.clone(), job);
        info!(job_id = %id, mode = mode.as_str(), "job queued");

        let registry = Arc::clone(self);
        tokio::spawn(async move { registry.execute(id).await });

        Ok(view)
    }

    async fn execute(self: Arc<Self>, id: String) {
        let permit = match Arc::clone(&self.slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.update(&id, |job| job.set_failed("worker is shutting down"));
                return;
            }
        };

        let Some(job) = self.update(&id, RemoteJob::set_running) else {
            warn!(job_id = %id, "job vanished before it could run");
            return;
        };
        info!(job_id = %id, "job running");

        let started = Instant::now();
        let outcome = self.runner.run(&job).await;
        drop(permit);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(path) => {
                info!(job_id = %id, elapsed_ms, audio = %path.display(), "job succeeded");
                self.update(&id, |job| job.set_succeeded(path));
            }
            Err(e) => {
                error!(job_id = %id, elapsed_ms, error = %e, "job failed");
                self.update(&id, |job| job.set_failed(e.message.clone()));
            }
        }
    }

    /// Applies `f` to the job and returns a snapshot of the result.
    fn update(&self, id: &str, f: impl FnOnce(&mut RemoteJob)) -> Option<RemoteJob> {
        let mut jobs = self.lock();
        let job = jobs.get_mut(id)?;
        f(job);
        Some(job.clone())
    }

    /// Snapshot of a job.
    pub fn get(&self, id: &str) -> Option<RemoteJob> {
        self.lock().get(id).cloned()
    }

    /// Wire view of a job.
    pub fn view(&self, id: &str) -> Result<JobView> {
        self.get(id)
            .map(|job| job.view())
            .ok_or_else(|| DaemonError::not_found(format!("job {}", id)))
    }
}
