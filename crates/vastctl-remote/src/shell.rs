use std::path::Path;

use async_trait::async_trait;

use crate::error::RemoteError;

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  pub stdout: String,
  pub stderr: String,
  pub exit_code: i32,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.exit_code == 0
  }

  /// Turn a non-zero exit into [`RemoteError::CommandFailed`].
  pub fn check(self, command: &str) -> Result<Self, RemoteError> {
    if self.success() {
      Ok(self)
    } else {
      Err(RemoteError::CommandFailed {
        command: command.to_string(),
        exit_code: self.exit_code,
        stderr: self.stderr.trim().to_string(),
      })
    }
  }
}

/// A shell on a remote instance.
#[async_trait]
pub trait RemoteShell: Send + Sync {
  /// Run a command and capture its output.
  ///
  /// A non-zero exit from the command itself is returned as output, not as
  /// an error. Errors are reserved for failing to reach the instance.
  async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError>;

  /// Run a command with `input` written to its stdin.
  async fn exec_with_stdin(&self, command: &str, input: &[u8])
  -> Result<CommandOutput, RemoteError>;

  /// Copy a local file to an absolute path on the instance.
  async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), RemoteError>;
}
