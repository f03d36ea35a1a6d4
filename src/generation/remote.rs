//! Generation on the GPU job worker.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{GeneratedAudio, Generator};
use crate::audio::read_wav_info;
use crate::client::RemoteJobClient;
use crate::types::{AudioFormat, GenerationRequest};
use crate::error::Result;

/// Sample rate assumed when the artifact header cannot be read.
pub const FALLBACK_SAMPLE_RATE: u32 = 48_000;
pub const REMOTE_MODEL_NAME: &str = "songgen_full_new";

/// Runs each request as one remote job and downloads the result.
pub struct RemoteGenerator {
    client: RemoteJobClient,
    total_timeout: Duration,
    poll_interval: Duration,
}

impl RemoteGenerator {
    pub fn new(client: RemoteJobClient, total_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            client,
            total_timeout,
            poll_interval,
        }
    }

    /// Worker request for `request`. Artifacts are always fetched as WAV so
    /// their duration can be read from the header; the mode flags are passed
    /// through and the worker picks the matching stem.
    pub fn job_request(request: &GenerationRequest) -> GenerationRequest {
        GenerationRequest {
            format: AudioFormat::Wav,
            ..request.clone()
        }
    }
}

#[async_trait]
impl Generator for RemoteGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio> {
        let job = Self::job_request(request);
        let bytes = self
            .client
            .run(&job, self.total_timeout, self.poll_interval)
            .await?;

        let (duration_sec, sample_rate) = match read_wav_info(&bytes) {
            Ok(info) => (info.duration_sec, info.sample_rate),
            Err(e) => {
                warn!(error = %e, "could not read artifact header; using requested duration");
                (request.duration_sec as f64, FALLBACK_SAMPLE_RATE)
            }
        };
        info!(
            worker = %self.client.base_url(),
            duration_sec,
            sample_rate,
            size_bytes = bytes.len(),
            "remote generation finished"
        );

        Ok(GeneratedAudio {
            bytes,
            format: AudioFormat::Wav,
            duration_sec,
            sample_rate,
            model_name: REMOTE_MODEL_NAME.to_string(),
        })
    }

    fn name(&self) -> &str {
        REMOTE_MODEL_NAME
    }
}
