//! Client for the job worker's HTTP protocol.
//!
//! `POST /v1/jobs` -> `{jobId, status}`, `GET /v1/jobs/{id}` ->
//! [`JobView`], `GET /v1/jobs/{id}/audio` -> artifact bytes.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{DaemonError, ErrorCode, Result};
use crate::types::{GenerationRequest, JobStatus, JobView};

/// Shortest pause between two status calls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Per-call timeout of a status request: `min(30, max(5, total))` seconds.
pub fn status_call_timeout(total: Duration) -> Duration {
    total.clamp(Duration::from_secs(5), Duration::from_secs(30))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    job_id: Option<String>,
}

/// Async client for one worker.
#[derive(Debug, Clone)]
pub struct RemoteJobClient {
    base_url: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl RemoteJobClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .user_agent(format!("songgen-daemon/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DaemonError::with_source(ErrorCode::Internal, "failed to build HTTP client", e)
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submits a job and returns its id.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<String> {
        let response = self
            .http
            .post(self.url("/v1/jobs"))
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                DaemonError::with_source(ErrorCode::Submission, format!("submit failed: {}", e), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DaemonError::submission(format!(
                "worker rejected job ({}): {}",
                status, body
            )));
        }

        let body: SubmitResponse = response.json().await.map_err(|e| {
            DaemonError::with_source(
                ErrorCode::Submission,
                format!("invalid submit response: {}", e),
                e,
            )
        })?;
        let job_id = body
            .job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DaemonError::submission("submit response is missing jobId"))?;
        debug!(job_id = %job_id, "job submitted");
        Ok(job_id)
    }

    /// Reads the current state of a job with the given per-call timeout.
    pub async fn status(&self, job_id: &str, timeout: Duration) -> Result<JobView> {
        let response = self
            .http
            .get(self.url(&format!("/v1/jobs/{}", job_id)))
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Polls until the job is terminal or `total` elapses.
    ///
    /// Status-call failures are logged and retried until the deadline.
    pub async fn poll_until_done(
        &self,
        job_id: &str,
        total: Duration,
        interval: Duration,
    ) -> Result<JobView> {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let call_timeout = status_call_timeout(total);
        let deadline = Instant::now() + total;
        let mut last_status: Option<JobStatus> = None;

        loop {
            match self.status(job_id, call_timeout).await {
                Ok(view) if view.status.is_terminal() => return Ok(view),
                Ok(view) => last_status = Some(view.status),
                Err(e) => warn!(job_id, error = %e, "status poll failed"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DaemonError::upstream_timeout(format!(
                    "job timeout after {}s (job_id={}, last_status={})",
                    total.as_secs_f64(),
                    job_id,
                    last_status.map(|s| s.as_str()).unwrap_or("unknown")
                )));
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }

    /// Downloads the artifact of a succeeded job.
    pub async fn download_artifact(&self, job_id: &str) -> Result<Vec<u8>> {
        let download_error = |e: reqwest::Error| {
            DaemonError::with_source(
                ErrorCode::Download,
                format!("download of job {} failed: {}", job_id, e),
                e,
            )
        };
        let bytes = self
            .http
            .get(self.url(&format!("/v1/jobs/{}/audio", job_id)))
            .timeout(self.request_timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(download_error)?
            .bytes()
            .await
            .map_err(download_error)?;
        Ok(bytes.to_vec())
    }

    /// Submits, waits for and downloads one job.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        total: Duration,
        interval: Duration,
    ) -> Result<Vec<u8>> {
        let started = Instant::now();
        let job_id = self.submit(request).await?;
        let view = self.poll_until_done(&job_id, total, interval).await?;
        if view.status == JobStatus::Failed {
            return Err(DaemonError::generation_failed(format!(
                "remote job {} failed: {}",
                job_id,
                view.error.as_deref().unwrap_or("unknown error")
            )));
        }

        let bytes = self.download_artifact(&job_id).await?;
        info!(
            job_id = %job_id,
            size_bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "remote job finished"
        );
        Ok(bytes)
    }
}
