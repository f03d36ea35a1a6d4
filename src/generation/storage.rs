//! Generated artifact storage.
//!
//! Files land under `<static_dir>/generated/` and are served by the task API
//! at `/static/generated/<file>`.

use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{content_sha256, AudioFormat};

pub const GENERATED_DIR: &str = "generated";

/// Where an artifact was written and how to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    pub file_name: String,
    pub storage_path: String,
    pub public_url: String,
    pub size_bytes: i64,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    static_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(static_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
        }
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    /// Writes `bytes` to a fresh `<prefix>_<uuid>.<ext>` file.
    pub async fn save(
        &self,
        bytes: &[u8],
        prefix: &str,
        format: AudioFormat,
    ) -> Result<StoredArtifact> {
        let dir = self.static_dir.join(GENERATED_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!(
            "{}_{}.{}",
            prefix,
            Uuid::new_v4().simple(),
            format.extension()
        );
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "artifact stored");

        Ok(StoredArtifact {
            public_url: format!("/static/{}/{}", GENERATED_DIR, file_name),
            storage_path: path.to_string_lossy().into_owned(),
            size_bytes: bytes.len() as i64,
            sha256: content_sha256(bytes),
            file_name,
        })
    }
}
