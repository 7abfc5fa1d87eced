use std::path::PathBuf;

use crate::classify::SshFailure;

/// Errors that can occur while talking to a remote instance.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
  /// The private key to authenticate with does not exist.
  #[error("ssh key not found at {}", .0.display())]
  KeyNotFound(PathBuf),

  /// No home directory to look for keys in.
  #[error("could not determine home directory")]
  NoHomeDir,

  /// The ssh/scp client could not be started.
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The client did not finish within the command timeout.
  #[error("ssh command timed out after {seconds}s")]
  Timeout { seconds: u64 },

  /// The client failed to connect or authenticate.
  #[error("ssh connection failed ({failure}): {stderr}")]
  Connection { failure: SshFailure, stderr: String },

  /// The remote command ran but exited non-zero.
  #[error("remote command '{command}' exited with {exit_code}: {stderr}")]
  CommandFailed {
    command: String,
    exit_code: i32,
    stderr: String,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl RemoteError {
  /// Coarse category for reporting, `None` for non-connection errors.
  pub fn ssh_failure(&self) -> Option<SshFailure> {
    match self {
      Self::Connection { failure, .. } => Some(*failure),
      Self::Timeout { .. } => Some(SshFailure::Timeout),
      _ => None,
    }
  }
}
