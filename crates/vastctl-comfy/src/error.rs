use std::path::PathBuf;

use vastctl_remote::RemoteError;
use vastctl_workflow::WorkflowError;

/// Errors that can occur while driving ComfyUI.
#[derive(Debug, thiserror::Error)]
pub enum ComfyError {
  #[error(transparent)]
  Remote(#[from] RemoteError),

  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  #[error("local image not found: {}", .0.display())]
  ImageNotFound(PathBuf),

  #[error("invalid JSON from {what}: {source}")]
  InvalidJson {
    what: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to encode request: {0}")]
  Encode(#[source] serde_json::Error),

  #[error("no workflow history found, run a workflow in ComfyUI first")]
  EmptyHistory,

  #[error("unexpected response from {what}: {detail}")]
  UnexpectedResponse { what: String, detail: String },

  #[error("failed to get prompt id from response: {0}")]
  MissingPromptId(String),

  #[error("job {0} not found in queue or history")]
  JobNotFound(String),

  #[error("job {0} has already finished and cannot be cancelled")]
  JobFinished(String),
}
