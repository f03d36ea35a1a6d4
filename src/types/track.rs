//! Domain records the generation pipeline attaches its output to.
//!
//! A [`Session`] is the parent conversation, a [`Message`] is the
//! placeholder reply created at submission, and a [`Track`] is the
//! persisted music file produced by a finished pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Artist recorded on generated tracks.
pub const GENERATED_ARTIST: &str = "AI Composer";

/// A conversation the generated tracks belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub owner_id: Option<String>,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One request/reply exchange inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub user_text: String,
    pub reply_text: String,
    pub track_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A generated audio file stored by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub owner_id: Option<String>,
    pub session_id: Option<String>,
    pub title: String,
    pub artist: String,

    /// File name inside the artifact directory.
    pub file_name: String,

    /// Full filesystem path of the stored file.
    pub storage_path: String,

    /// URL path the file is served under.
    pub public_url: String,

    pub size_bytes: i64,

    /// Container extension ("wav" or "flac").
    pub format: String,

    pub duration_sec: f64,
    pub sample_rate: u32,

    /// Hex SHA-256 of the stored bytes.
    pub sha256: String,

    pub cover_path: Option<String>,

    /// Generator that produced the audio.
    pub model_name: String,

    /// Always "generated" for pipeline output.
    pub source: String,

    pub created_at: DateTime<Utc>,
}

/// Computes the hex SHA-256 of `bytes`.
pub fn content_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
