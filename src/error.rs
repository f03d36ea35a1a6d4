//! Error types for songgen-daemon.
//!
//! Every component reports failures as a [`DaemonError`] tagged with an
//! [`ErrorCode`]. The code decides how the error surfaces over HTTP and
//! whether the orchestrator treats it as a dropped storage connection.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error codes shared by the worker, the client and the task service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed request or mutually exclusive flags.
    /// Trigger: instrumental and vocal-only both set, segment too short to crossfade.
    Validation,

    /// Unknown task or job id, or a task of another type.
    NotFound,

    /// Resource exists but is not in the right state.
    /// Trigger: downloading the audio of a job that has not succeeded.
    Conflict,

    /// External command or polling deadline exceeded.
    UpstreamTimeout,

    /// Storage link dropped (closed pool, I/O failure, timed out acquire).
    Connection,

    /// Storage rejected the operation for a reason other than connectivity.
    Storage,

    /// A parent record the result attaches to was deleted mid-flight.
    FatalReference,

    /// The worker did not accept a job submission.
    Submission,

    /// Fetching a finished artifact from the worker failed.
    Download,

    /// Generation ran but did not produce usable audio.
    GenerationFailed,

    /// ffmpeg re-encode, trim or fade failed.
    PostProcessFailed,

    /// Local filesystem failure.
    Io,

    /// Anything else.
    Internal,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            ErrorCode::Connection => "CONNECTION",
            ErrorCode::Storage => "STORAGE",
            ErrorCode::FatalReference => "FATAL_REFERENCE",
            ErrorCode::Submission => "SUBMISSION",
            ErrorCode::Download => "DOWNLOAD",
            ErrorCode::GenerationFailed => "GENERATION_FAILED",
            ErrorCode::PostProcessFailed => "POST_PROCESS_FAILED",
            ErrorCode::Io => "IO",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "Request failed validation",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::Conflict => "Resource is not in a state that allows this operation",
            ErrorCode::UpstreamTimeout => "Generation or polling exceeded its deadline",
            ErrorCode::Connection => "Storage connection was lost",
            ErrorCode::Storage => "Storage operation failed",
            ErrorCode::FatalReference => "A referenced parent record no longer exists",
            ErrorCode::Submission => "Job submission was rejected by the worker",
            ErrorCode::Download => "Artifact download from the worker failed",
            ErrorCode::GenerationFailed => "Generation did not produce audio",
            ErrorCode::PostProcessFailed => "Audio post-processing failed",
            ErrorCode::Io => "Filesystem operation failed",
            ErrorCode::Internal => "Internal error",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::Validation => {
                "Set at most one of instrumental, vocalOnly and separate, \
                 and give a vocal request a prompt or lyrics"
            }
            ErrorCode::NotFound => "Check the id and the task type it was created with",
            ErrorCode::Conflict => "Poll the job status until it reports succeeded",
            ErrorCode::UpstreamTimeout => {
                "Request a shorter duration or raise SONGGEN_JOB_TIMEOUT_SEC / SONGGEN_TOTAL_TIMEOUT"
            }
            ErrorCode::Connection => "Check that the database file is reachable and retry",
            ErrorCode::Storage => "Inspect the server logs for the failing statement",
            ErrorCode::FatalReference => "The session was deleted; start a new one",
            ErrorCode::Submission | ErrorCode::Download => {
                "Check that the worker is running and SONGGEN_REMOTE_URL points at it"
            }
            ErrorCode::GenerationFailed => "Inspect logs.txt in the job directory on the worker",
            ErrorCode::PostProcessFailed => "Check that ffmpeg is installed (SONGGEN_FFMPEG)",
            ErrorCode::Io => "Check permissions and free space of the data directories",
            ErrorCode::Internal => "Retry the request; report it if it keeps failing",
        }
    }

    /// HTTP status used when the error reaches a handler.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::Connection => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message is safe to show to a client.
    fn is_client_facing(&self) -> bool {
        matches!(
            self,
            ErrorCode::Validation
                | ErrorCode::NotFound
                | ErrorCode::Conflict
                | ErrorCode::UpstreamTimeout
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for daemon operations.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct DaemonError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DaemonError {
    /// Creates a new DaemonError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new DaemonError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", what.into()))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Creates an UPSTREAM_TIMEOUT error naming the bound that was exceeded.
    pub fn upstream_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamTimeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Connection, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Storage, message)
    }

    pub fn fatal_reference(what: impl Into<String>) -> Self {
        Self::new(ErrorCode::FatalReference, format!("{} not found", what.into()))
    }

    pub fn submission(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Submission, message)
    }

    pub fn generation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GenerationFailed, message)
    }

    pub fn post_process_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PostProcessFailed, message)
    }

    /// True for a dropped storage link, the only class the orchestrator retries.
    pub fn is_connection(&self) -> bool {
        self.code == ErrorCode::Connection
    }
}

impl From<std::io::Error> for DaemonError {
    fn from(e: std::io::Error) -> Self {
        let message = e.to_string();
        Self::with_source(ErrorCode::Io, message, e)
    }
}

impl From<serde_json::Error> for DaemonError {
    fn from(e: serde_json::Error) -> Self {
        let message = format!("invalid JSON: {}", e);
        Self::with_source(ErrorCode::Internal, message, e)
    }
}

impl From<sqlx::Error> for DaemonError {
    fn from(e: sqlx::Error) -> Self {
        let code = match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => ErrorCode::Connection,
            _ => ErrorCode::Storage,
        };
        let message = e.to_string();
        Self::with_source(code, message, e)
    }
}

impl From<reqwest::Error> for DaemonError {
    fn from(e: reqwest::Error) -> Self {
        let code = if e.is_timeout() {
            ErrorCode::UpstreamTimeout
        } else {
            ErrorCode::Internal
        };
        let message = format!("HTTP request failed: {}", e);
        Self::with_source(code, message, e)
    }
}

impl From<sqlx::migrate::MigrateError> for DaemonError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        let message = format!("migration failed: {}", e);
        Self::with_source(ErrorCode::Storage, message, e)
    }
}

impl From<hound::Error> for DaemonError {
    fn from(e: hound::Error) -> Self {
        let message = format!("WAV codec error: {}", e);
        Self::with_source(ErrorCode::GenerationFailed, message, e)
    }
}

impl IntoResponse for DaemonError {
    fn into_response(self) -> Response {
        let status = self.code.http_status();
        let client_message = if self.code.is_client_facing() {
            self.message.clone()
        } else {
            error!(code = %self.code, hint = self.code.recovery_hint(), error = %self, "request failed");
            self.code.description().to_string()
        };
        (
            status,
            Json(json!({ "error": client_message, "code": self.code.as_str() })),
        )
            .into_response()
    }
}

/// Result type alias using DaemonError.
pub type Result<T> = std::result::Result<T, DaemonError>;
