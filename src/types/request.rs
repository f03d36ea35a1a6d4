//! Generation request value object.
//!
//! A [`GenerationRequest`] is both the body the worker accepts on
//! `POST /v1/jobs` and the input the local segmented generator consumes.
//! It is never persisted on its own; tasks store it as their input snapshot.

use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, Result};

/// Longest duration the worker accepts, in seconds.
pub const MAX_DURATION_SEC: u32 = 600;

/// Output container of a generated track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    #[default]
    Flac,
}

impl AudioFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
        }
    }

    /// ffmpeg audio codec producing this container.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "pcm_s16le",
            AudioFormat::Flac => "flac",
        }
    }

    /// Parses a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            _ => None,
        }
    }
}

/// Which stems the generation command should produce.
///
/// The wire format carries three booleans; at most one may be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationMode {
    /// Full song with vocals.
    Song,
    /// Backing track only.
    Instrumental,
    /// A cappella vocals only.
    VocalOnly,
    /// Mix plus separated stems.
    Separate,
}

impl GenerationMode {
    /// Collapses the three request flags into a mode.
    pub fn from_flags(instrumental: bool, vocal_only: bool, separate: bool) -> Result<Self> {
        match (instrumental, vocal_only, separate) {
            (false, false, false) => Ok(GenerationMode::Song),
            (true, false, false) => Ok(GenerationMode::Instrumental),
            (false, true, false) => Ok(GenerationMode::VocalOnly),
            (false, false, true) => Ok(GenerationMode::Separate),
            _ => Err(DaemonError::validation(
                "instrumental, vocalOnly and separate are mutually exclusive",
            )),
        }
    }

    /// Flag passed to the generation command, if any.
    pub fn command_flag(&self) -> Option<&'static str> {
        match self {
            GenerationMode::Song => None,
            GenerationMode::Instrumental => Some("--bgm"),
            GenerationMode::VocalOnly => Some("--vocal"),
            GenerationMode::Separate => Some("--separate"),
        }
    }

    /// True when the output contains singing and therefore needs lyrics.
    pub fn has_vocals(&self) -> bool {
        !matches!(self, GenerationMode::Instrumental)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Song => "song",
            GenerationMode::Instrumental => "instrumental",
            GenerationMode::VocalOnly => "vocal_only",
            GenerationMode::Separate => "separate",
        }
    }
}

/// A request for one generated track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Free-text description of the music.
    #[serde(default)]
    pub prompt: String,

    /// Comma-separated style tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    /// Target duration in seconds (1-600).
    #[serde(default = "default_duration")]
    pub duration_sec: u32,

    #[serde(default)]
    pub format: AudioFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default)]
    pub separate: bool,

    #[serde(default = "default_instrumental")]
    pub instrumental: bool,

    #[serde(default)]
    pub vocal_only: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
}

fn default_duration() -> u32 {
    30
}

fn default_instrumental() -> bool {
    true
}

impl GenerationRequest {
    /// Creates an instrumental request with default settings.
    pub fn new(prompt: impl Into<String>, duration_sec: u32) -> Self {
        Self {
            prompt: prompt.into(),
            style: None,
            duration_sec,
            format: AudioFormat::default(),
            seed: None,
            separate: false,
            instrumental: true,
            vocal_only: false,
            lyrics: None,
        }
    }

    /// Validates the request and returns its generation mode.
    ///
    /// Runs before any job directory or task record is created.
    pub fn validate(&self) -> Result<GenerationMode> {
        let mode = GenerationMode::from_flags(self.instrumental, self.vocal_only, self.separate)?;

        if !(1..=MAX_DURATION_SEC).contains(&self.duration_sec) {
            return Err(DaemonError::validation(format!(
                "durationSec must be between 1 and {}, got {}",
                MAX_DURATION_SEC, self.duration_sec
            )));
        }

        if mode.has_vocals() && self.prompt.trim().is_empty() && self.lyrics_text().is_none() {
            return Err(DaemonError::validation(
                "a vocal request needs a prompt or lyrics",
            ));
        }

        Ok(mode)
    }

    /// Lyrics with surrounding whitespace removed, `None` when blank.
    pub fn lyrics_text(&self) -> Option<&str> {
        self.lyrics
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Style tags with surrounding whitespace removed, `None` when blank.
    pub fn style_text(&self) -> Option<&str> {
        self.style
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_minimal_json() {
        let req: GenerationRequest = serde_json::from_str(r#"{"prompt":"rainy night piano"}"#).unwrap();
        assert_eq!(req.duration_sec, 30);
        assert!(req.instrumental);
        assert_eq!(req.format, AudioFormat::Flac);
        assert_eq!(req.validate().unwrap(), GenerationMode::Instrumental);
    }

    #[test]
    fn camel_case_wire_names() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"prompt":"x","durationSec":90,"vocalOnly":true,"instrumental":false,"format":"wav"}"#,
        )
        .unwrap();
        assert_eq!(req.duration_sec, 90);
        assert_eq!(req.format, AudioFormat::Wav);
        assert_eq!(req.validate().unwrap(), GenerationMode::VocalOnly);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let parsed = serde_json::from_str::<GenerationRequest>(r#"{"prompt":"x","format":"mp3"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn instrumental_and_vocal_only_conflict() {
        let mut req = GenerationRequest::new("x", 30);
        req.vocal_only = true;
        let err = req.validate().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Validation);
    }

    #[test]
    fn separate_conflicts_with_instrumental() {
        let mut req = GenerationRequest::new("x", 30);
        req.separate = true;
        assert!(req.validate().is_err());
    }

    #[test]
    fn vocal_request_needs_prompt_or_lyrics() {
        let mut req = GenerationRequest::new("   ", 30);
        req.instrumental = false;
        assert!(req.validate().is_err());

        req.lyrics = Some("[verse] hello".to_string());
        assert_eq!(req.validate().unwrap(), GenerationMode::Song);
    }

    #[test]
    fn duration_bounds() {
        assert!(GenerationRequest::new("x", 0).validate().is_err());
        assert!(GenerationRequest::new("x", 600).validate().is_ok());
        assert!(GenerationRequest::new("x", 601).validate().is_err());
    }

    #[test]
    fn mode_command_flags() {
        assert_eq!(GenerationMode::Song.command_flag(), None);
        assert_eq!(GenerationMode::Instrumental.command_flag(), Some("--bgm"));
        assert_eq!(GenerationMode::VocalOnly.command_flag(), Some("--vocal"));
        assert_eq!(GenerationMode::Separate.command_flag(), Some("--separate"));
    }
}
