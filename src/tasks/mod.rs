//! Client-visible asynchronous tasks.

pub mod registry;

pub use registry::{TaskRegistry, STALE_TASK_MESSAGE};
