//! Execution of one job inside an execution slot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::descriptor::JobDescriptor;
use super::postprocess::PostProcessPlan;
use super::process::{describe_exit, run_logged, CommandSpec};
use super::select::{select_candidate, CandidateScorer, KeywordScorer};
use crate::config::WorkerConfig;
use crate::error::{DaemonError, Result};
use crate::types::{AudioFormat, RemoteJob};

/// Descriptor file inside the job directory.
pub const INPUT_FILE: &str = "input.jsonl";
/// Subprocess log inside the job directory.
pub const LOG_FILE: &str = "logs.txt";
/// Directory the generation command writes audio to.
pub const AUDIO_DIR: &str = "audios";

/// Runs the generation command for a job and post-processes its output.
pub struct JobRunner {
    config: Arc<WorkerConfig>,
    scorer: Arc<dyn CandidateScorer>,
}

impl JobRunner {
    pub fn new(config: Arc<WorkerConfig>) -> Self {
        Self::with_scorer(config, Arc::new(KeywordScorer))
    }

    pub fn with_scorer(config: Arc<WorkerConfig>, scorer: Arc<dyn CandidateScorer>) -> Self {
        Self { config, scorer }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Command line for a job: `<cmd> <model> <input> <job_dir> <extra..> [mode flag]`.
    pub fn generation_command(&self, job: &RemoteJob, input_path: &Path) -> CommandSpec {
        let mut parts = self.config.generate_command.iter();
        let program = parts.next().cloned().unwrap_or_else(|| "bash".to_string());

        let mut spec = CommandSpec::new(program)
            .args(parts.cloned())
            .arg(self.config.model_name.clone())
            .arg(input_path.to_string_lossy())
            .arg(job.job_dir.to_string_lossy())
            .args(self.config.extra_args.iter().cloned());
        if let Some(flag) = job.mode.command_flag() {
            spec = spec.arg(flag);
        }
        spec.cwd = Some(self.config.workdir.clone());
        spec.path_prefix = self.config.env_bin.clone();
        spec
    }

    /// Runs the job to a final artifact path.
    pub async fn run(&self, job: &RemoteJob) -> Result<PathBuf> {
        let input_path = job.job_dir.join(INPUT_FILE);
        let log_path = job.job_dir.join(LOG_FILE);

        let descriptor =
            JobDescriptor::build(&job.id, &job.request, job.mode, job.prompt_audio.as_deref());
        tokio::fs::write(&input_path, descriptor.to_json_line()?).await?;

        let spec = self.generation_command(job, &input_path);
        let status = run_logged(&spec, &log_path, self.config.job_timeout, "job").await?;
        if !status.success() {
            return Err(DaemonError::generation_failed(format!(
                "generation command failed with {}",
                describe_exit(status)
            )));
        }

        let candidates = collect_candidates(&job.job_dir.join(AUDIO_DIR)).await?;
        let chosen = select_candidate(&candidates, job.mode, self.scorer.as_ref())
            .ok_or_else(|| {
                DaemonError::generation_failed(format!(
                    "no audio output in {}",
                    job.job_dir.join(AUDIO_DIR).display()
                ))
            })?;
        info!(
            job_id = %job.id,
            mode = job.mode.as_str(),
            candidates = candidates.len(),
            chosen = %chosen.display(),
            "selected output audio"
        );

        let plan = PostProcessPlan::new(
            &chosen,
            &job.id,
            job.request.format,
            job.request.duration_sec,
            &self.config,
        );
        plan.run(&self.config.ffmpeg, &log_path).await
    }
}

/// Audio files (`.flac`, `.wav`) directly inside `dir`, sorted by path.
pub async fn collect_candidates(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_audio = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(AudioFormat::from_extension)
            .is_some();
        if is_audio && entry.file_type().await?.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
