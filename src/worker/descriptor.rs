//! Input descriptor handed to the generation command.
//!
//! The command reads one JSON object per line from `input.jsonl`. Several
//! versions of the command read different field names, so the descriptor
//! carries the same information under each of them.

use std::path::Path;

use serde::Serialize;

use crate::lyrics::{default_instrumental_description, has_outro, normalize_lyrics, outro_tag};
use crate::types::{GenerationMode, GenerationRequest};

const INSTRUMENTAL_TYPE_INFO: &str = "purely instrumental, no vocals, no singing, no lyrics";
const VOCAL_ONLY_TYPE_INFO: &str = "vocal only, a cappella";
const VOCAL_TYPE_INFO: &str = "vocal";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFields {
    pub description: String,
    pub type_info: String,
}

/// One line of `input.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDescriptor {
    pub idx: String,
    pub gt_lyric: String,
    pub descriptions: String,
    pub prompt: String,
    pub style: String,
    pub duration_sec: u32,
    pub seed: Option<u64>,
    pub separate: bool,
    pub text: TextFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_audio_path: Option<String>,
}

impl JobDescriptor {
    /// Translates a validated request into the command's input format.
    pub fn build(
        idx: &str,
        request: &GenerationRequest,
        mode: GenerationMode,
        prompt_audio: Option<&Path>,
    ) -> Self {
        let prompt = request.prompt.trim().to_string();
        let style = request.style_text().unwrap_or_default().to_string();
        let duration = request.duration_sec;

        let description = if prompt.is_empty() {
            default_instrumental_description(duration)
        } else if mode == GenerationMode::Instrumental && !has_outro(&prompt) {
            format!("{} ; {}", prompt, outro_tag(duration))
        } else {
            prompt.clone()
        };

        let type_info = match mode {
            GenerationMode::Instrumental if style.is_empty() => INSTRUMENTAL_TYPE_INFO.to_string(),
            GenerationMode::Instrumental => format!("{}, {}", style, INSTRUMENTAL_TYPE_INFO),
            GenerationMode::VocalOnly if style.is_empty() => VOCAL_ONLY_TYPE_INFO.to_string(),
            _ if style.is_empty() => VOCAL_TYPE_INFO.to_string(),
            _ => style.clone(),
        };

        let gt_lyric = if mode.has_vocals() {
            let raw = request.lyrics_text().unwrap_or(&prompt);
            normalize_lyrics(raw, duration)
        } else {
            String::new()
        };

        Self {
            idx: idx.to_string(),
            gt_lyric,
            descriptions: type_info.clone(),
            prompt,
            style,
            duration_sec: duration,
            seed: request.seed,
            separate: request.separate,
            text: TextFields {
                description,
                type_info,
            },
            prompt_audio_path: prompt_audio.map(|p| p.to_string_lossy().into_owned()),
        }
    }

    /// Serializes the descriptor as a single JSON line.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
