//! Runtime configuration.
//!
//! [`WorkerConfig`] drives the GPU job worker and [`ServiceConfig`] drives
//! the task API and orchestrator. Both load from `SONGGEN_*` environment
//! variables and fall back to defaults for unset or unparsable values.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which generator the orchestrator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    /// One job on the remote worker.
    #[default]
    Remote,
    /// Several clips from a clip backend, stitched locally.
    Segmented,
}

impl GeneratorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorBackend::Remote => "remote",
            GeneratorBackend::Segmented => "segmented",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "remote" | "songgen" => Some(GeneratorBackend::Remote),
            "segmented" | "local" => Some(GeneratorBackend::Segmented),
            _ => None,
        }
    }
}

impl std::fmt::Display for GeneratorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of the job worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Listen address.
    pub bind: String,

    /// Parent of the per-job directories.
    /// If None, uses the platform-specific data directory.
    pub jobs_dir: Option<PathBuf>,

    /// Working directory the generation command runs in.
    pub workdir: PathBuf,

    /// Checkpoint name passed as the first command argument.
    pub model_name: String,

    /// Program and leading arguments of the generation command.
    pub generate_command: Vec<String>,

    /// Arguments appended after the job paths.
    pub extra_args: Vec<String>,

    /// Directory prepended to PATH for the command.
    pub env_bin: Option<PathBuf>,

    /// Number of jobs that may run at once (one per GPU).
    pub slots: usize,

    /// Hard wall-clock limit per generation command.
    pub job_timeout: Duration,

    /// ffmpeg binary used for post-processing.
    pub ffmpeg: String,

    pub trim_to_duration: bool,
    pub fade_out: bool,
    pub fade_out_seconds: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8001".to_string(),
            jobs_dir: None,
            workdir: PathBuf::from("."),
            model_name: "ckpt/songgeneration_base".to_string(),
            generate_command: vec!["bash".to_string(), "generate.sh".to_string()],
            extra_args: vec!["--low_mem".to_string(), "--not_use_flash_attn".to_string()],
            env_bin: None,
            slots: 1,
            job_timeout: Duration::from_secs(15 * 60),
            ffmpeg: "ffmpeg".to_string(),
            trim_to_duration: true,
            fade_out: true,
            fade_out_seconds: 4.0,
        }
    }
}

impl WorkerConfig {
    /// Creates a WorkerConfig from environment variables.
    ///
    /// Reads `SONGGEN_WORKER_BIND`, `SONGGEN_JOBS_DIR`, `SONGGEN_WORKDIR`,
    /// `SONGGEN_MODEL_NAME`, `SONGGEN_GENERATE_CMD`, `SONGGEN_EXTRA_ARGS`,
    /// `SONGGEN_ENV_BIN`, `SONGGEN_WORKER_SLOTS`, `SONGGEN_JOB_TIMEOUT_SEC`,
    /// `SONGGEN_FFMPEG`, `SONGGEN_TRIM_TO_DURATION`, `SONGGEN_FADE_OUT` and
    /// `SONGGEN_FADE_OUT_SECONDS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind) = var("SONGGEN_WORKER_BIND") {
            config.bind = bind;
        }
        if let Some(path) = var("SONGGEN_JOBS_DIR") {
            config.jobs_dir = Some(PathBuf::from(path));
        }
        if let Some(path) = var("SONGGEN_WORKDIR") {
            config.workdir = PathBuf::from(path);
        }
        if let Some(name) = var("SONGGEN_MODEL_NAME") {
            config.model_name = name;
        }
        if let Some(cmd) = var("SONGGEN_GENERATE_CMD") {
            let parts = split_words(&cmd);
            if !parts.is_empty() {
                config.generate_command = parts;
            }
        }
        if let Some(args) = var("SONGGEN_EXTRA_ARGS") {
            config.extra_args = split_words(&args);
        }
        if let Some(path) = var("SONGGEN_ENV_BIN").filter(|s| !s.trim().is_empty()) {
            config.env_bin = Some(PathBuf::from(path));
        }
        if let Some(slots) = parse_var::<usize>(&var, "SONGGEN_WORKER_SLOTS") {
            if slots > 0 {
                config.slots = slots;
            }
        }
        if let Some(secs) = parse_var::<u64>(&var, "SONGGEN_JOB_TIMEOUT_SEC") {
            if secs > 0 {
                config.job_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(ffmpeg) = var("SONGGEN_FFMPEG") {
            config.ffmpeg = ffmpeg;
        }
        if let Some(flag) = var("SONGGEN_TRIM_TO_DURATION").and_then(|v| parse_bool(&v)) {
            config.trim_to_duration = flag;
        }
        if let Some(flag) = var("SONGGEN_FADE_OUT").and_then(|v| parse_bool(&v)) {
            config.fade_out = flag;
        }
        if let Some(secs) = parse_var::<f64>(&var, "SONGGEN_FADE_OUT_SECONDS") {
            if secs >= 0.0 {
                config.fade_out_seconds = secs;
            }
        }

        config
    }

    /// Returns the effective jobs directory, using platform defaults if not specified.
    pub fn effective_jobs_dir(&self) -> PathBuf {
        self.jobs_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("jobs"))
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.generate_command.is_empty() {
            return Some("generate command must not be empty".to_string());
        }
        if self.slots == 0 {
            return Some("slots must be > 0".to_string());
        }
        if self.job_timeout.is_zero() {
            return Some("job timeout must be > 0".to_string());
        }
        None
    }
}

/// Segment sizes for the stitched generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentConfig {
    /// Longest clip the clip backend produces in one call.
    pub max_clip_sec: f64,
    /// Preferred clip length when stitching.
    pub chunk_sec: f64,
    /// Crossfade length between clips.
    pub overlap_sec: f64,
    pub min_duration_sec: u32,
    pub max_duration_sec: u32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_clip_sec: 28.0,
            chunk_sec: 25.0,
            overlap_sec: 2.0,
            min_duration_sec: 5,
            max_duration_sec: 120,
        }
    }
}

/// Configuration of the task API and orchestrator.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address.
    pub bind: String,

    /// sqlx SQLite URL. If None, a file in the platform data directory.
    pub database_url: Option<String>,

    /// Root of stored artifacts, served under `/static`.
    pub static_dir: Option<PathBuf>,

    pub backend: GeneratorBackend,

    /// Base URL of the job worker.
    pub remote_url: String,

    pub poll_interval: Duration,

    /// Ceiling on waiting for one remote job.
    pub total_timeout: Duration,

    /// Per-call timeout of worker requests.
    pub request_timeout: Duration,

    /// Added to `total_timeout` before a processing task counts as stale.
    pub stale_grace: Duration,

    /// Base URL of the clip backend used by the segmented generator.
    pub clip_url: Option<String>,

    pub segment: SegmentConfig,

    /// Duration used when a request omits one.
    pub default_duration_sec: u32,

    /// Cap on user lyrics after sanitizing.
    pub max_lyrics_chars: usize,

    /// Bound on each title/cover enrichment call.
    pub enrich_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            database_url: None,
            static_dir: None,
            backend: GeneratorBackend::default(),
            remote_url: "http://127.0.0.1:8001".to_string(),
            poll_interval: Duration::from_secs(2),
            total_timeout: Duration::from_secs(900),
            request_timeout: Duration::from_secs(60),
            stale_grace: Duration::from_secs(300),
            clip_url: None,
            segment: SegmentConfig::default(),
            default_duration_sec: 120,
            max_lyrics_chars: 1200,
            enrich_timeout: Duration::from_secs(20),
        }
    }
}

impl ServiceConfig {
    /// Creates a ServiceConfig from environment variables.
    ///
    /// Reads `SONGGEN_BIND`, `SONGGEN_DATABASE_URL`, `SONGGEN_STATIC_DIR`,
    /// `SONGGEN_BACKEND`, `SONGGEN_REMOTE_URL`, `SONGGEN_POLL_INTERVAL`,
    /// `SONGGEN_TOTAL_TIMEOUT`, `SONGGEN_REQUEST_TIMEOUT`,
    /// `SONGGEN_STALE_GRACE_SEC`, `SONGGEN_CLIP_URL`,
    /// `SONGGEN_DEFAULT_DURATION`, `SONGGEN_MAX_LYRICS_CHARS` and
    /// `SONGGEN_ENRICH_TIMEOUT_SEC`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind) = var("SONGGEN_BIND") {
            config.bind = bind;
        }
        if let Some(url) = var("SONGGEN_DATABASE_URL") {
            config.database_url = Some(url);
        }
        if let Some(path) = var("SONGGEN_STATIC_DIR") {
            config.static_dir = Some(PathBuf::from(path));
        }
        if let Some(backend) = var("SONGGEN_BACKEND").and_then(|v| GeneratorBackend::parse(&v)) {
            config.backend = backend;
        }
        if let Some(url) = var("SONGGEN_REMOTE_URL") {
            config.remote_url = url.trim_end_matches('/').to_string();
        }
        if let Some(d) = parse_secs(&var, "SONGGEN_POLL_INTERVAL") {
            config.poll_interval = d;
        }
        if let Some(d) = parse_secs(&var, "SONGGEN_TOTAL_TIMEOUT") {
            config.total_timeout = d;
        }
        if let Some(d) = parse_secs(&var, "SONGGEN_REQUEST_TIMEOUT") {
            config.request_timeout = d;
        }
        if let Some(d) = parse_secs(&var, "SONGGEN_STALE_GRACE_SEC") {
            config.stale_grace = d;
        }
        if let Some(url) = var("SONGGEN_CLIP_URL").filter(|s| !s.trim().is_empty()) {
            config.clip_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(secs) = parse_var::<u32>(&var, "SONGGEN_DEFAULT_DURATION") {
            if secs > 0 {
                config.default_duration_sec = secs;
            }
        }
        if let Some(chars) = parse_var::<usize>(&var, "SONGGEN_MAX_LYRICS_CHARS") {
            config.max_lyrics_chars = chars;
        }
        if let Some(d) = parse_secs(&var, "SONGGEN_ENRICH_TIMEOUT_SEC") {
            config.enrich_timeout = d;
        }

        config
    }

    /// Age after which a `processing` task is considered abandoned.
    pub fn stale_after(&self) -> Duration {
        self.total_timeout + self.stale_grace
    }

    /// Returns the effective database URL, using platform defaults if not specified.
    pub fn effective_database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}?mode=rwc",
                default_data_dir().join("songgen.db").display()
            ),
        }
    }

    /// Returns the effective artifact directory, using platform defaults if not specified.
    pub fn effective_static_dir(&self) -> PathBuf {
        self.static_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("static"))
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.backend == GeneratorBackend::Segmented && self.clip_url.is_none() {
            return Some("segmented backend needs SONGGEN_CLIP_URL".to_string());
        }
        if self.total_timeout.is_zero() {
            return Some("total timeout must be > 0".to_string());
        }
        let seg = &self.segment;
        if seg.overlap_sec * 2.0 >= seg.chunk_sec.min(seg.max_clip_sec) {
            return Some(format!(
                "overlap {}s too long for {}s clips",
                seg.overlap_sec, seg.chunk_sec
            ));
        }
        None
    }
}

fn parse_var<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.trim().parse::<T>().ok())
}

/// Parses fractional seconds; non-positive values are ignored.
fn parse_secs(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    parse_var::<f64>(var, key)
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_words(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Returns the platform-specific data directory.
///
/// - macOS: ~/Library/Application Support/songgen
/// - Linux: ~/.local/share/songgen
/// - Windows: C:\Users\<user>\AppData\Roaming\songgen\data
pub fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "songgen") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from("./data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn worker_defaults() {
        let config = WorkerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.slots, 1);
        assert_eq!(config.job_timeout, Duration::from_secs(900));
        assert_eq!(config.generate_command, vec!["bash", "generate.sh"]);
        assert!(config.trim_to_duration);
        assert!(config.fade_out);
        assert_eq!(config.fade_out_seconds, 4.0);
        assert!(config.validate().is_none());
    }

    #[test]
    fn worker_overrides() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("SONGGEN_WORKER_SLOTS", "2"),
            ("SONGGEN_GENERATE_CMD", "sh run.sh"),
            ("SONGGEN_EXTRA_ARGS", ""),
            ("SONGGEN_FADE_OUT", "off"),
            ("SONGGEN_JOB_TIMEOUT_SEC", "abc"),
        ]));
        assert_eq!(config.slots, 2);
        assert_eq!(config.generate_command, vec!["sh", "run.sh"]);
        assert!(config.extra_args.is_empty());
        assert!(!config.fade_out);
        assert_eq!(config.job_timeout, Duration::from_secs(900));
    }

    #[test]
    fn zero_slots_are_ignored() {
        let config = WorkerConfig::from_lookup(lookup(&[("SONGGEN_WORKER_SLOTS", "0")]));
        assert_eq!(config.slots, 1);
    }

    #[test]
    fn service_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[]));
        assert_eq!(config.backend, GeneratorBackend::Remote);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.stale_after(), Duration::from_secs(1200));
        assert_eq!(config.default_duration_sec, 120);
        assert!(config.validate().is_none());
    }

    #[test]
    fn service_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("SONGGEN_BACKEND", "segmented"),
            ("SONGGEN_CLIP_URL", "http://gpu:9000/"),
            ("SONGGEN_POLL_INTERVAL", "0.5"),
            ("SONGGEN_REMOTE_URL", "http://gpu:8001/"),
        ]));
        assert_eq!(config.backend, GeneratorBackend::Segmented);
        assert_eq!(config.clip_url.as_deref(), Some("http://gpu:9000"));
        assert_eq!(config.remote_url, "http://gpu:8001");
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert!(config.validate().is_none());
    }

    #[test]
    fn segmented_backend_needs_clip_url() {
        let config = ServiceConfig::from_lookup(lookup(&[("SONGGEN_BACKEND", "local")]));
        assert!(config.validate().is_some());
    }

    #[test]
    fn effective_paths() {
        let config = ServiceConfig::default();
        assert!(config.effective_database_url().starts_with("sqlite://"));
        assert!(!config.effective_static_dir().as_os_str().is_empty());
        assert!(!WorkerConfig::default().effective_jobs_dir().as_os_str().is_empty());
    }

    #[test]
    fn backend_parsing() {
        assert_eq!(GeneratorBackend::parse("REMOTE"), Some(GeneratorBackend::Remote));
        assert_eq!(GeneratorBackend::parse("segmented"), Some(GeneratorBackend::Segmented));
        assert_eq!(GeneratorBackend::parse("onnx"), None);
    }
}
