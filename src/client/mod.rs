//! Outbound clients: the job worker protocol and single-clip backends.

pub mod clip;
pub mod remote;

pub use clip::{ClipSource, HttpClipSource};
pub use remote::{status_call_timeout, RemoteJobClient};
