//! Single-clip generation backends for the segmented generator.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::audio::Waveform;
use crate::error::{DaemonError, ErrorCode, Result};

/// Sample rate assumed when the clip service does not report one.
pub const DEFAULT_CLIP_SAMPLE_RATE: u32 = 32_000;
pub const DEFAULT_TOKENS_PER_SECOND: f64 = 50.0;
const CLIP_TIMEOUT: Duration = Duration::from_secs(300);

/// Produces one clip of at most a model-specific length.
#[async_trait]
pub trait ClipSource: Send + Sync {
    async fn generate_clip(&self, prompt: &str, duration_sec: f64) -> Result<Waveform>;

    /// Label recorded as the track's model name.
    fn model_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ClipRequest<'a> {
    prompt: &'a str,
    duration_sec: f64,
    tokens_per_second: f64,
}

/// Clip payload: base64 of little-endian f32 samples, channel-major.
#[derive(Debug, Deserialize)]
pub struct ClipResponse {
    pub waveform: String,
    #[serde(default)]
    pub shape: Vec<i64>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

impl ClipResponse {
    /// Decodes the payload into a planar waveform.
    ///
    /// `shape` is `[channels, frames]`, `[frames]` or empty (mono); a
    /// negative frame count means "whatever is left".
    pub fn into_waveform(self) -> Result<Waveform> {
        let raw = STANDARD.decode(self.waveform.as_bytes()).map_err(|e| {
            DaemonError::with_source(ErrorCode::GenerationFailed, "clip waveform is not base64", e)
        })?;
        if raw.len() % 4 != 0 {
            return Err(DaemonError::generation_failed(format!(
                "clip waveform has {} bytes, not a whole number of f32 samples",
                raw.len()
            )));
        }
        let samples: Vec<f32> = raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let channel_count = match self.shape.as_slice() {
            [channels, _] if *channels > 0 => *channels as usize,
            _ => 1,
        };
        if samples.is_empty() || samples.len() % channel_count != 0 {
            return Err(DaemonError::generation_failed(format!(
                "clip waveform of {} samples does not match shape {:?}",
                samples.len(),
                self.shape
            )));
        }

        let frames = samples.len() / channel_count;
        let channels = samples.chunks_exact(frames).map(<[f32]>::to_vec).collect();
        Waveform::new(
            self.sample_rate.unwrap_or(DEFAULT_CLIP_SAMPLE_RATE),
            channels,
        )
    }
}

/// Clip service reached over HTTP at `{base}/generate_clip`.
pub struct HttpClipSource {
    base_url: String,
    http: reqwest::Client,
    tokens_per_second: f64,
    model_name: String,
}

impl HttpClipSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(CLIP_TIMEOUT)
            .build()
            .map_err(|e| {
                DaemonError::with_source(ErrorCode::Internal, "failed to build HTTP client", e)
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            tokens_per_second: DEFAULT_TOKENS_PER_SECOND,
            model_name: "musicgen_remote".to_string(),
        })
    }
}

#[async_trait]
impl ClipSource for HttpClipSource {
    async fn generate_clip(&self, prompt: &str, duration_sec: f64) -> Result<Waveform> {
        debug!(duration_sec, "requesting clip");
        let body = ClipRequest {
            prompt,
            duration_sec,
            tokens_per_second: self.tokens_per_second,
        };
        let response = self
            .http
            .post(format!("{}/generate_clip", self.base_url))
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                error!(error = %e, "clip generation request failed");
                DaemonError::with_source(
                    ErrorCode::GenerationFailed,
                    format!("clip generation failed: {}", e),
                    e,
                )
            })?;
        let payload: ClipResponse = response.json().await.map_err(|e| {
            DaemonError::with_source(
                ErrorCode::GenerationFailed,
                format!("invalid clip response: {}", e),
                e,
            )
        })?;
        payload.into_waveform()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
