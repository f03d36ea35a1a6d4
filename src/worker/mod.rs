//! GPU job worker.
//!
//! Accepts generation requests over HTTP, runs the external generation
//! command for each in its own job directory with bounded concurrency,
//! and serves the finished artifact for download.

pub mod descriptor;
pub mod postprocess;
pub mod process;
pub mod registry;
pub mod runner;
pub mod select;
pub mod server;

use std::sync::Arc;

use tracing::info;

pub use descriptor::JobDescriptor;
pub use postprocess::{fade_start, PostProcessPlan};
pub use process::{run_logged, CommandSpec};
pub use registry::{JobRegistry, ReferenceAudio};
pub use runner::JobRunner;
pub use select::{select_candidate, CandidateScorer, KeywordScorer};
pub use server::router;

use crate::config::WorkerConfig;
use crate::error::Result;

/// Creates the jobs directory and a registry backed by the configured command.
pub async fn build_registry(config: WorkerConfig) -> Result<Arc<JobRegistry>> {
    let jobs_dir = config.effective_jobs_dir();
    tokio::fs::create_dir_all(&jobs_dir).await?;
    info!(
        jobs_dir = %jobs_dir.display(),
        slots = config.slots,
        model = %config.model_name,
        timeout_secs = config.job_timeout.as_secs(),
        "worker registry ready"
    );

    let slots = config.slots;
    let runner = JobRunner::new(Arc::new(config));
    Ok(Arc::new(JobRegistry::new(runner, jobs_dir, slots)))
}
