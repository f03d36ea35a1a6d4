//! Audio generation backends and the artifacts they produce.
//!
//! A [`Generator`] turns a [`GenerationRequest`] into encoded audio. Two
//! implementations exist:
//! - [`RemoteGenerator`]: one job on the GPU worker
//! - [`SegmentedGenerator`]: crossfaded clips from a short-clip model

pub mod enrich;
pub mod remote;
pub mod segmented;
pub mod storage;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::client::{HttpClipSource, RemoteJobClient};
use crate::config::{GeneratorBackend, ServiceConfig};
use crate::error::{DaemonError, Result};
use crate::types::{AudioFormat, GenerationRequest};

pub use enrich::{Enricher, FallbackEnricher, FALLBACK_TITLE};
pub use remote::RemoteGenerator;
pub use segmented::SegmentedGenerator;
pub use storage::{ArtifactStore, StoredArtifact};

/// Encoded output of one generation.
#[derive(Debug, Clone)]
pub struct GeneratedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
    pub duration_sec: f64,
    pub sample_rate: u32,
    pub model_name: String,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio>;

    /// Backend label for logs.
    fn name(&self) -> &str;
}

/// Builds the generator selected by `config.backend`.
pub fn build_generator(config: &ServiceConfig) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match config.backend {
        GeneratorBackend::Remote => {
            let client = RemoteJobClient::new(&config.remote_url, config.request_timeout)?;
            Arc::new(RemoteGenerator::new(
                client,
                config.total_timeout,
                config.poll_interval,
            ))
        }
        GeneratorBackend::Segmented => {
            let url = config.clip_url.as_deref().ok_or_else(|| {
                DaemonError::validation("segmented backend needs a clip service URL")
            })?;
            Arc::new(SegmentedGenerator::new(
                HttpClipSource::new(url)?,
                config.segment,
            ))
        }
    };
    info!(backend = config.backend.as_str(), generator = generator.name(), "generator ready");
    Ok(generator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_backend_is_default() {
        let generator = build_generator(&ServiceConfig::default()).unwrap();
        assert_eq!(generator.name(), remote::REMOTE_MODEL_NAME);
    }

    #[test]
    fn segmented_backend_requires_clip_url() {
        let config = ServiceConfig {
            backend: GeneratorBackend::Segmented,
            ..ServiceConfig::default()
        };
        assert!(build_generator(&config).is_err());

        let config = ServiceConfig {
            backend: GeneratorBackend::Segmented,
            clip_url: Some("http://127.0.0.1:9".into()),
            ..ServiceConfig::default()
        };
        assert_eq!(build_generator(&config).unwrap().name(), "musicgen_remote");
    }
}
