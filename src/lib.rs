//! songgen-daemon: asynchronous song generation service.
//!
//! Two processes share this library:
//! - the **task service** (`serve`): accepts generation requests, records a
//!   task per request and drives each one to completion in the background
//! - the **job worker** (`worker`): runs the GPU-bound generation command
//!   for remote jobs and serves the finished audio
//!
//! # Modules
//!
//! - [`types`]: requests, tasks, remote jobs and the records a run produces
//! - [`config`]: worker and service configuration (WorkerConfig, ServiceConfig)
//! - [`error`]: error types and codes (DaemonError, ErrorCode)
//! - [`audio`]: waveforms, WAV codec and the segment stitcher
//! - [`lyrics`]: lyric structure, sanitizing and style tags
//! - [`worker`]: job registry, command runner and worker HTTP surface
//! - [`client`]: remote job and clip clients
//! - [`store`], [`tasks`]: persisted task registry
//! - [`generation`], [`orchestrator`]: generators and the background pipeline
//! - [`api`]: task-facing HTTP surface
//!
//! # Example
//!
//! ```rust,ignore
//! use songgen_daemon::client::RemoteJobClient;
//! use songgen_daemon::types::GenerationRequest;
//! use std::time::Duration;
//!
//! let client = RemoteJobClient::new("http://127.0.0.1:8001", Duration::from_secs(60))?;
//! let request = GenerationRequest::new("rainy night piano", 60);
//! let wav = client
//!     .run(&request, Duration::from_secs(900), Duration::from_secs(2))
//!     .await?;
//! ```

pub mod api;
pub mod audio;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod generation;
pub mod lyrics;
pub mod orchestrator;
pub mod store;
pub mod tasks;
pub mod types;
pub mod worker;

// Re-export commonly used types at crate root for convenience
pub use config::{GeneratorBackend, ServiceConfig, WorkerConfig};
pub use error::{DaemonError, ErrorCode, Result};
pub use types::{GenerationRequest, JobStatus, RemoteJob, Task, TaskStatus, TaskType, Track};
