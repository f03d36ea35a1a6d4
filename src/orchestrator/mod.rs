//! Background generation orchestrator.
//!
//! [`submit_generation`] records a task and a placeholder message and then
//! spawns [`Pipeline::run`], which generates the audio, stores it, attaches
//! it to the conversation and completes the task. Storage writes that follow
//! the long generation step survive a dropped connection through
//! [`with_reconnect_retry`], and any failure is handed to [`recovery`].

pub mod connection;
pub mod pipeline;
pub mod recovery;
pub mod submit;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ensure_connection, with_reconnect_retry};
pub use pipeline::{completion_reply, prepare_request, Pipeline, PipelineJob, PipelineSettings};
pub use submit::{submit_generation, Submission, Submitted, PLACEHOLDER_REPLY, QUEUED_MESSAGE};
