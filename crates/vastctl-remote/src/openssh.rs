use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::classify::classify_ssh_failure;
use crate::error::RemoteError;
use crate::shell::{CommandOutput, RemoteShell};

/// Exit status OpenSSH uses for its own failures.
const SSH_CLIENT_FAILURE: i32 = 255;

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
  pub host: String,
  pub port: u16,
  pub user: String,
  pub key_path: PathBuf,
  pub connect_timeout: Duration,
}

impl SshTarget {
  /// Target `root@host:port`, authenticating with `key_path`.
  pub fn new(host: impl Into<String>, port: u16, key_path: impl Into<PathBuf>) -> Self {
    Self {
      host: host.into(),
      port,
      user: "root".to_string(),
      key_path: key_path.into(),
      connect_timeout: Duration::from_secs(30),
    }
  }

  pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
    self.connect_timeout = timeout;
    self
  }

  fn destination(&self) -> String {
    format!("{}@{}", self.user, self.host)
  }
}

/// [`RemoteShell`] backed by the system `ssh` and `scp` binaries.
///
/// Host keys are neither checked nor recorded; instances are short-lived and
/// reuse addresses.
#[derive(Debug, Clone)]
pub struct OpenSshShell {
  target: SshTarget,
  command_timeout: Duration,
}

impl OpenSshShell {
  /// Fails if the key file does not exist.
  pub fn new(target: SshTarget) -> Result<Self, RemoteError> {
    if !target.key_path.exists() {
      return Err(RemoteError::KeyNotFound(target.key_path));
    }

    Ok(Self::new_unchecked(target))
  }

  fn new_unchecked(target: SshTarget) -> Self {
    Self {
      target,
      command_timeout: Duration::from_secs(60),
    }
  }

  /// Upper bound on a whole command, including connecting.
  pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
    self.command_timeout = timeout;
    self
  }

  pub fn target(&self) -> &SshTarget {
    &self.target
  }

  fn common_options(&self) -> Vec<String> {
    vec![
      "-i".to_string(),
      self.target.key_path.display().to_string(),
      "-o".to_string(),
      "BatchMode=yes".to_string(),
      "-o".to_string(),
      "StrictHostKeyChecking=no".to_string(),
      "-o".to_string(),
      "UserKnownHostsFile=/dev/null".to_string(),
      "-o".to_string(),
      "LogLevel=ERROR".to_string(),
      "-o".to_string(),
      format!("ConnectTimeout={}", self.target.connect_timeout.as_secs().max(1)),
    ]
  }

  fn ssh_args(&self, command: &str) -> Vec<String> {
    let mut args = self.common_options();
    args.push("-p".to_string());
    args.push(self.target.port.to_string());
    args.push(self.target.destination());
    args.push(command.to_string());
    args
  }

  fn scp_args(&self, local_path: &Path, remote_path: &str) -> Vec<String> {
    let mut args = self.common_options();
    args.push("-P".to_string());
    args.push(self.target.port.to_string());
    args.push(local_path.display().to_string());
    args.push(format!("{}:{}", self.target.destination(), remote_path));
    args
  }

  async fn run(
    &self,
    program: &str,
    args: &[String],
    input: Option<&[u8]>,
  ) -> Result<Output, RemoteError> {
    let mut child = Command::new(program)
      .args(args)
      .stdin(if input.is_some() {
        Stdio::piped()
      } else {
        Stdio::null()
      })
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|source| RemoteError::Spawn {
        program: program.to_string(),
        source,
      })?;

    let pending = async {
      if let Some(input) = input
        && let Some(mut stdin) = child.stdin.take()
      {
        stdin.write_all(input).await?;
        stdin.shutdown().await?;
      }
      child.wait_with_output().await
    };

    match tokio::time::timeout(self.command_timeout, pending).await {
      Ok(output) => Ok(output?),
      Err(_) => Err(RemoteError::Timeout {
        seconds: self.command_timeout.as_secs(),
      }),
    }
  }

  fn into_command_output(output: Output) -> Result<CommandOutput, RemoteError> {
    let output = CommandOutput {
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
      exit_code: output.status.code().unwrap_or(-1),
    };

    if output.exit_code == SSH_CLIENT_FAILURE {
      let failure = classify_ssh_failure(&output.stderr);
      warn!(%failure, stderr = %output.stderr.trim(), "ssh connection failed");
      return Err(RemoteError::Connection {
        failure,
        stderr: output.stderr.trim().to_string(),
      });
    }

    Ok(output)
  }
}

#[async_trait]
impl RemoteShell for OpenSshShell {
  #[instrument(skip(self, command), fields(host = %self.target.host, port = self.target.port))]
  async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError> {
    debug!(command, "running remote command");
    let output = self.run("ssh", &self.ssh_args(command), None).await?;
    Self::into_command_output(output)
  }

  #[instrument(
    skip(self, command, input),
    fields(host = %self.target.host, port = self.target.port, bytes = input.len())
  )]
  async fn exec_with_stdin(
    &self,
    command: &str,
    input: &[u8],
  ) -> Result<CommandOutput, RemoteError> {
    debug!(command, "running remote command with stdin");
    let output = self.run("ssh", &self.ssh_args(command), Some(input)).await?;
    Self::into_command_output(output)
  }

  #[instrument(skip(self), fields(host = %self.target.host, port = self.target.port))]
  async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), RemoteError> {
    let output = self
      .run("scp", &self.scp_args(local_path, remote_path), None)
      .await?;
    let output = Self::into_command_output(output)?;

    output
      .check(&format!("scp {} {}", local_path.display(), remote_path))
      .map(|_| ())
  }
}
