//! Re-encode, trim and fade of the selected artifact with ffmpeg.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use super::process::{describe_exit, run_logged, CommandSpec};
use crate::config::WorkerConfig;
use crate::error::{DaemonError, Result};
use crate::types::AudioFormat;

const FFMPEG_TIMEOUT: Duration = Duration::from_secs(300);

/// Where a fade-out of `fade_seconds` starts for a track of `duration_sec`.
///
/// Anchored at the target duration so only the tail fades.
pub fn fade_start(duration_sec: f64, fade_seconds: f64) -> f64 {
    (duration_sec - fade_seconds).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeOut {
    pub start: f64,
    pub duration: f64,
}

/// What to do with the selected candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessPlan {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: AudioFormat,
    pub trim_to: Option<f64>,
    pub fade: Option<FadeOut>,
}

impl PostProcessPlan {
    /// Builds the plan for `input`, writing next to it as `<job_id>.<ext>`.
    pub fn new(
        input: &Path,
        job_id: &str,
        format: AudioFormat,
        duration_sec: u32,
        config: &WorkerConfig,
    ) -> Self {
        let duration = duration_sec as f64;
        let dir = input.parent().unwrap_or_else(|| Path::new("."));
        let mut output = dir.join(format!("{}.{}", job_id, format.extension()));
        if output == input {
            output = dir.join(format!("{}_post.{}", job_id, format.extension()));
        }

        let trim_to = config.trim_to_duration.then_some(duration);
        let fade = (config.fade_out && config.fade_out_seconds > 0.0).then(|| FadeOut {
            start: fade_start(duration, config.fade_out_seconds),
            duration: config.fade_out_seconds,
        });

        Self {
            input: input.to_path_buf(),
            output,
            format,
            trim_to,
            fade,
        }
    }

    fn input_format(&self) -> Option<AudioFormat> {
        self.input
            .extension()
            .and_then(|e| e.to_str())
            .and_then(AudioFormat::from_extension)
    }

    /// True when the candidate can be served as-is.
    pub fn is_noop(&self) -> bool {
        self.input_format() == Some(self.format) && self.trim_to.is_none() && self.fade.is_none()
    }

    /// ffmpeg arguments implementing the plan.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            self.input.to_string_lossy().into_owned(),
        ];
        if let Some(t) = self.trim_to {
            args.push("-t".to_string());
            args.push(format!("{}", t));
        }
        if let Some(fade) = self.fade {
            args.push("-af".to_string());
            args.push(format!(
                "afade=t=out:st={:.3}:d={:.3}",
                fade.start, fade.duration
            ));
        }
        args.push("-c:a".to_string());
        args.push(self.format.ffmpeg_codec().to_string());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }

    /// Runs the plan and returns the final artifact path.
    pub async fn run(&self, ffmpeg: &str, log_path: &Path) -> Result<PathBuf> {
        if self.is_noop() {
            return Ok(self.input.clone());
        }

        let spec = CommandSpec::new(ffmpeg).args(self.ffmpeg_args());
        let status = run_logged(&spec, log_path, FFMPEG_TIMEOUT, "ffmpeg").await?;
        if !status.success() {
            return Err(DaemonError::post_process_failed(format!(
                "ffmpeg failed with {}",
                describe_exit(status)
            )));
        }
        if !tokio::fs::try_exists(&self.output).await.unwrap_or(false) {
            return Err(DaemonError::post_process_failed(format!(
                "ffmpeg produced no output at {}",
                self.output.display()
            )));
        }

        info!(
            input = %self.input.display(),
            output = %self.output.display(),
            trim = ?self.trim_to,
            fade = ?self.fade,
            "post-processed audio"
        );
        Ok(self.output.clone())
    }
}
