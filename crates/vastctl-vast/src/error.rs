/// Errors that can occur while talking to the Vast.ai API.
#[derive(Debug, thiserror::Error)]
pub enum VastError {
  #[error("VAST_API_KEY is not set")]
  MissingApiKey,

  #[error("invalid API base URL: {0}")]
  InvalidBaseUrl(#[from] url::ParseError),

  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("API returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("instance {0} not found in your instances list")]
  InstanceNotFound(String),

  #[error(transparent)]
  Unavailable(#[from] SshUnavailable),
}

/// Why an instance cannot be reached over SSH yet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SshUnavailable {
  #[error("instance is not running (status: {0})")]
  NotRunning(String),

  #[error("instance has no SSH host or port yet")]
  MissingSshInfo,

  #[error("SSH port {port} plus offset {offset} is out of range")]
  PortOverflow { port: u16, offset: u16 },
}
