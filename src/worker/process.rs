//! Subprocess execution with an append-only log and a hard timeout.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{DaemonError, ErrorCode, Result};

/// A command line plus the environment it runs in.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Directory put in front of PATH.
    pub path_prefix: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            path_prefix: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Command line as logged.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs `spec` with stdout and stderr appended to `log_path`.
///
/// The child is killed when `timeout` elapses; that case fails with
/// `UPSTREAM_TIMEOUT` and a message of the form "{label} timeout after {n}s".
/// A non-zero exit is returned as an `ExitStatus` for the caller to judge.
pub async fn run_logged(
    spec: &CommandSpec,
    log_path: &Path,
    timeout: Duration,
    label: &str,
) -> Result<ExitStatus> {
    let mut log = OpenOptions::new().create(true).append(true).open(log_path)?;
    let cwd = spec
        .cwd
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string());
    writeln!(log, "\n===== RUN {} =====", Utc::now().to_rfc3339())?;
    writeln!(log, "CWD: {}", cwd)?;
    writeln!(log, "CMD: {}", spec.display())?;
    log.flush()?;

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log))
        .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }
    if let Some(prefix) = &spec.path_prefix {
        let current = std::env::var_os("PATH").unwrap_or_default();
        let paths = std::iter::once(prefix.clone()).chain(std::env::split_paths(&current));
        let joined = std::env::join_paths(paths)
            .map_err(|e| DaemonError::with_source(ErrorCode::Internal, "invalid PATH entry", e))?;
        command.env("PATH", joined);
    }

    debug!(cmd = %spec.display(), cwd = %cwd, "spawning");
    let mut child = command.spawn().map_err(|e| {
        DaemonError::with_source(
            ErrorCode::Io,
            format!("failed to start {}: {}", spec.program, e),
            e,
        )
    })?;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => Ok(status?),
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, cmd = %spec.program, "failed to kill timed out process");
            }
            Err(DaemonError::upstream_timeout(format!(
                "{} timeout after {}s",
                label,
                timeout.as_secs_f64()
            )))
        }
    }
}

/// Short description of an exit status for error messages.
pub fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn output_is_appended_to_log() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("logs.txt");
        let spec = CommandSpec::new("sh").args(["-c", "echo hello-from-child"]);

        let status = run_logged(&spec, &log, Duration::from_secs(10), "job").await.unwrap();
        assert!(status.success());

        run_logged(&spec, &log, Duration::from_secs(10), "job").await.unwrap();
        let text = std::fs::read_to_string(&log).unwrap();
        assert_eq!(text.matches("===== RUN").count(), 2);
        assert!(text.contains("CMD: sh -c echo hello-from-child"));
        assert_eq!(text.matches("hello-from-child\n").count(), 2);
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let dir = tempdir().unwrap();
        let spec = CommandSpec::new("sh").args(["-c", "exit 3"]);
        let status = run_logged(&spec, &dir.path().join("log"), Duration::from_secs(10), "job")
            .await
            .unwrap();
        assert_eq!(describe_exit(status), "exit code 3");
    }

    #[tokio::test]
    async fn timeout_kills_child() {
        let dir = tempdir().unwrap();
        let spec = CommandSpec::new("sh").args(["-c", "sleep 30"]);
        let started = std::time::Instant::now();
        let err = run_logged(&spec, &dir.path().join("log"), Duration::from_millis(200), "job")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UpstreamTimeout);
        assert_eq!(err.message, "job timeout after 0.2s");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let dir = tempdir().unwrap();
        let spec = CommandSpec::new("definitely-not-a-real-binary-4711");
        let err = run_logged(&spec, &dir.path().join("log"), Duration::from_secs(1), "job")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Io);
    }

    #[tokio::test]
    async fn path_prefix_is_visible_to_child() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("log");
        let mut spec = CommandSpec::new("sh").args(["-c", "echo \"$PATH\""]);
        spec.path_prefix = Some(PathBuf::from("/opt/songgen-env/bin"));
        run_logged(&spec, &log, Duration::from_secs(10), "job").await.unwrap();
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("/opt/songgen-env/bin:"));
    }
}
