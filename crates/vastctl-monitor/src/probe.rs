use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use vastctl_remote::{
  OpenSshShell, RemoteError, RemoteShell, SshFailure, SshTarget, classify_ssh_failure,
};
use vastctl_vast::{Instance, SshEndpoint, VastClient};

use crate::error::MonitorError;
use crate::script::STATUS_SCRIPT;
use crate::status::{InstanceStatus, StatusReport, parse_status_output};

/// Where instance records come from.
#[async_trait]
pub trait InstanceSource: Send + Sync {
  async fn instance(&self, instance_id: &str) -> Result<Option<Instance>, MonitorError>;
}

#[async_trait]
impl InstanceSource for VastClient {
  async fn instance(&self, instance_id: &str) -> Result<Option<Instance>, MonitorError> {
    Ok(VastClient::instance(self, instance_id).await?)
  }
}

/// Runs the status check against an SSH endpoint.
#[async_trait]
pub trait StatusProbe: Send + Sync {
  /// SSH problems come back as reports with an `SSH_*` status. An error
  /// means the script's output could not be interpreted.
  async fn probe(&self, endpoint: &SshEndpoint) -> Result<StatusReport, MonitorError>;
}

/// [`StatusProbe`] running [`STATUS_SCRIPT`] through `ssh ... bash -s`.
#[derive(Debug, Clone)]
pub struct SshStatusProbe {
  key_path: PathBuf,
  connect_timeout: Duration,
  command_timeout: Duration,
}

impl SshStatusProbe {
  pub fn new(key_path: impl Into<PathBuf>) -> Self {
    Self {
      key_path: key_path.into(),
      connect_timeout: Duration::from_secs(30),
      command_timeout: Duration::from_secs(30),
    }
  }
}

#[async_trait]
impl StatusProbe for SshStatusProbe {
  async fn probe(&self, endpoint: &SshEndpoint) -> Result<StatusReport, MonitorError> {
    let target = SshTarget::new(&endpoint.host, endpoint.port, &self.key_path)
      .with_connect_timeout(self.connect_timeout);

    let shell = match OpenSshShell::new(target) {
      Ok(shell) => shell.with_command_timeout(self.command_timeout),
      Err(err) => return Ok(report_for_error(&err)),
    };

    match shell.exec_with_stdin("bash -s", STATUS_SCRIPT.as_bytes()).await {
      Ok(output) if output.success() => interpret_output(&output.stdout),
      Ok(output) => {
        let failure = classify_ssh_failure(&output.stderr);
        warn!(exit_code = output.exit_code, %failure, "status script failed");
        Ok(StatusReport::from_ssh_failure(failure, output.stderr.trim()))
      }
      Err(err) => Ok(report_for_error(&err)),
    }
  }
}

/// Turn script stdout into a report, rejecting output with no status line.
pub(crate) fn interpret_output(stdout: &str) -> Result<StatusReport, MonitorError> {
  let stdout = stdout.trim();
  if !stdout.contains("STATUS:") {
    return Err(MonitorError::UnexpectedOutput(stdout.to_string()));
  }
  Ok(parse_status_output(stdout))
}

fn report_for_error(err: &RemoteError) -> StatusReport {
  debug!(error = %err, "status probe could not run");
  match err {
    RemoteError::KeyNotFound(path) => StatusReport::with_status(
      InstanceStatus::SshError,
      format!("SSH key not found at {}", path.display()),
    ),
    RemoteError::Spawn { .. } => {
      StatusReport::with_status(InstanceStatus::SshError, "SSH client not installed")
    }
    RemoteError::Timeout { .. } => {
      StatusReport::from_ssh_failure(SshFailure::Timeout, "SSH connection timeout")
    }
    RemoteError::Connection { failure, stderr } => {
      let detail = match failure {
        SshFailure::NotReady => "SSH service not available".to_string(),
        SshFailure::AuthFailed => "SSH key not authorized".to_string(),
        SshFailure::Timeout => "Connection timeout".to_string(),
        SshFailure::Other => stderr.clone(),
      };
      StatusReport::from_ssh_failure(*failure, detail)
    }
    other => StatusReport::with_status(InstanceStatus::SshError, other.to_string()),
  }
}
