use vastctl_remote::RemoteError;
use vastctl_vast::VastError;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
  #[error(transparent)]
  Vast(#[from] VastError),

  #[error(transparent)]
  Remote(#[from] RemoteError),

  /// The status script ran but printed no `STATUS:` line.
  #[error("unexpected status script output: {0}")]
  UnexpectedOutput(String),
}
