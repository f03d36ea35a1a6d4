//! End-to-end execution of one generation task.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connection::{ensure_connection, with_reconnect_retry};
use super::recovery;
use crate::error::{DaemonError, Result};
use crate::generation::{
    ArtifactStore, Enricher, FallbackEnricher, GeneratedAudio, Generator, StoredArtifact,
};
use crate::lyrics::{lyric_skeleton, merge_style_tags, sanitize_user_lyrics, suggest_style_tags};
use crate::store::{Store, StoreOpener};
use crate::tasks::TaskRegistry;
use crate::types::{GenerationRequest, TaskStatus, Track, GENERATED_ARTIST};

const ARTIFACT_PREFIX: &str = "music";

/// Tunables of a pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Cap on user lyrics after sanitizing.
    pub max_lyrics_chars: usize,
    /// Bound on each enrichment call.
    pub enrich_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_lyrics_chars: 1200,
            enrich_timeout: Duration::from_secs(20),
        }
    }
}

/// Everything one run needs to know about its task.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub task_id: String,
    pub session_id: String,
    pub message_id: String,
    pub owner_id: Option<String>,
    pub request: GenerationRequest,
}

/// Drives a task from `processing` to a terminal state.
///
/// Cheap to clone; each spawned run holds its own copy.
#[derive(Clone)]
pub struct Pipeline {
    tasks: TaskRegistry,
    generator: Arc<dyn Generator>,
    artifacts: ArtifactStore,
    enricher: Arc<dyn Enricher>,
    opener: Arc<dyn StoreOpener>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        tasks: TaskRegistry,
        generator: Arc<dyn Generator>,
        artifacts: ArtifactStore,
        opener: Arc<dyn StoreOpener>,
    ) -> Self {
        Self {
            tasks,
            generator,
            artifacts,
            enricher: Arc::new(FallbackEnricher),
            opener,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Best-effort failure of a task this pipeline will not run.
    pub(crate) async fn abandon(&self, task_id: &str, err: &DaemonError) {
        recovery::fail_task_anywhere(&self.tasks, &*self.opener, task_id, &err.message).await;
    }

    fn store(&self) -> &dyn Store {
        &**self.tasks.store()
    }

    /// Runs the job to completion. Never returns an error: failures end in
    /// the recovery steps, which leave the task `failed` where storage allows.
    pub async fn run(&self, job: PipelineJob) {
        let started = Instant::now();
        info!(task_id = %job.task_id, session_id = %job.session_id, "pipeline started");

        match self.execute(&job).await {
            Ok(track_id) => info!(
                task_id = %job.task_id,
                track_id = %track_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "pipeline completed"
            ),
            Err(e) => {
                warn!(
                    task_id = %job.task_id,
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "pipeline failed"
                );
                recovery::recover(
                    &self.tasks,
                    &*self.opener,
                    &job.task_id,
                    &job.message_id,
                    &e,
                )
                .await;
            }
        }
    }

    async fn execute(&self, job: &PipelineJob) -> Result<String> {
        self.tasks
            .set_status(&job.task_id, TaskStatus::Processing, Some("generating".into()))
            .await?
            .ok_or_else(|| DaemonError::fatal_reference(format!("task {}", job.task_id)))?;
        if !self.store().session_exists(&job.session_id).await? {
            return Err(DaemonError::fatal_reference("session"));
        }

        let request = prepare_request(&job.request, self.settings.max_lyrics_chars)?;
        let audio = self.generator.generate(&request).await?;
        debug!(task_id = %job.task_id, bytes = audio.bytes.len(), "audio generated");

        let stored = self
            .artifacts
            .save(&audio.bytes, ARTIFACT_PREFIX, audio.format)
            .await?;

        let title = self.title(&request.prompt).await;
        let cover = self.cover(&request.prompt).await;
        let reply = completion_reply(&request.prompt);
        let track = build_track(job, &audio, stored, title, cover);

        self.ensure_connection().await;
        with_reconnect_retry(self.store(), || {
            self.store()
                .insert_track_and_link_message(&track, &job.message_id, &reply)
        })
        .await?;

        let result = task_result(job, &track, &reply);
        self.ensure_connection().await;
        let completed = with_reconnect_retry(self.store(), || {
            self.tasks.complete(&job.task_id, result.clone(), None)
        })
        .await?;
        if completed.is_none() {
            return Err(DaemonError::fatal_reference(format!("task {}", job.task_id)));
        }

        Ok(track.id)
    }

    async fn ensure_connection(&self) {
        if let Err(e) = ensure_connection(self.store()).await {
            warn!(error = %e, "storage unreachable; continuing with retry");
        }
    }

    async fn title(&self, prompt: &str) -> String {
        match self.bounded(self.enricher.title(prompt)).await {
            Some(title) if !title.trim().is_empty() => title.trim().to_string(),
            _ => FallbackEnricher::title_for(prompt),
        }
    }

    async fn cover(&self, prompt: &str) -> Option<String> {
        self.bounded(self.enricher.cover(prompt)).await.flatten()
    }

    /// Awaits an enrichment call, turning errors and timeouts into `None`.
    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Option<T> {
        match tokio::time::timeout(self.settings.enrich_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(error = %e, "enrichment failed; using fallback");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.enrich_timeout.as_millis() as u64,
                    "enrichment timed out; using fallback"
                );
                None
            }
        }
    }
}

/// Fills in lyrics and style before generation.
///
/// Vocal requests get sanitized user lyrics, or a wordless skeleton when
/// none were given. The style is merged with tags suggested by the prompt.
pub fn prepare_request(request: &GenerationRequest, max_lyrics_chars: usize) -> Result<GenerationRequest> {
    let mode = request.validate()?;
    let mut prepared = request.clone();

    if mode.has_vocals() {
        let lyrics = request
            .lyrics_text()
            .map(|raw| sanitize_user_lyrics(raw, max_lyrics_chars))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| lyric_skeleton(request.duration_sec));
        prepared.lyrics = Some(lyrics);
    } else {
        prepared.lyrics = None;
    }

    let style = merge_style_tags(request.style_text(), &suggest_style_tags(&request.prompt));
    prepared.style = (!style.is_empty()).then_some(style);
    Ok(prepared)
}

/// Reply shown in the conversation once the track is ready.
pub fn completion_reply(prompt: &str) -> String {
    format!(
        "Got it: {}. Here is a track in that mood, have a listen.",
        prompt.trim()
    )
}

fn build_track(
    job: &PipelineJob,
    audio: &GeneratedAudio,
    stored: StoredArtifact,
    title: String,
    cover: Option<String>,
) -> Track {
    Track {
        id: Uuid::new_v4().to_string(),
        owner_id: job.owner_id.clone(),
        session_id: Some(job.session_id.clone()),
        title,
        artist: GENERATED_ARTIST.to_string(),
        file_name: stored.file_name,
        storage_path: stored.storage_path,
        public_url: stored.public_url,
        size_bytes: stored.size_bytes,
        format: audio.format.extension().to_string(),
        duration_sec: audio.duration_sec,
        sample_rate: audio.sample_rate,
        sha256: stored.sha256,
        cover_path: cover,
        model_name: audio.model_name.clone(),
        source: "generated".to_string(),
        created_at: Utc::now(),
    }
}

fn task_result(job: &PipelineJob, track: &Track, reply: &str) -> Value {
    json!({
        "id": track.id,
        "trackId": track.id,
        "title": track.title,
        "artist": track.artist,
        "url": track.public_url,
        "duration": track.duration_sec,
        "cover": track.cover_path,
        "sessionId": job.session_id,
        "messageId": job.message_id,
        "reply": reply,
        "model": track.model_name,
    })
}
