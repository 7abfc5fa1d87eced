use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("invalid workflow json: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("node not found: {0}")]
  NodeNotFound(String),

  #[error("invalid link entry: {message}")]
  InvalidLink { message: String },
}
