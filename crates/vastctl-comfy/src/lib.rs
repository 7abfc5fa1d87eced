//! vastctl Comfy
//!
//! A client for the ComfyUI HTTP API on a remote instance. The API only
//! listens on the instance's loopback interface, so every request is a
//! `curl` invocation run through a [`RemoteShell`](vastctl_remote::RemoteShell).

mod client;
mod error;
mod history;
mod queue;
mod run;
#[cfg(test)]
mod testing;

pub use client::{COMFY_INPUT_DIRS, ComfyClient, DEFAULT_COMFY_URL};
pub use error::ComfyError;
pub use queue::{CancelOutcome, JobState, QueueStatus, QueuedJob};
pub use run::{API_OUTPUT_PATH, RunRequest, RunSummary, UI_OUTPUT_PATH};
