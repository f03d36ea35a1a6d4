//! Core types for songgen-daemon.
//!
//! - [`GenerationRequest`]: what to generate, shared by both generators
//! - [`RemoteJob`]: a worker-side GPU run
//! - [`Task`]: a client-visible asynchronous task
//! - [`Track`], [`Session`], [`Message`]: records the pipeline writes

mod job;
mod request;
mod task;
mod track;

pub use job::{JobStatus, JobView, RemoteJob};
pub use request::{AudioFormat, GenerationMode, GenerationRequest, MAX_DURATION_SEC};
pub use task::{NewTask, Task, TaskStatus, TaskType};
pub use track::{content_sha256, Message, Session, Track, GENERATED_ARTIST};
