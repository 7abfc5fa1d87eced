use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use vastctl_vast::{SshEndpoint, SshUnavailable};

use crate::error::MonitorError;
use crate::probe::{InstanceSource, StatusProbe};
use crate::status::{InstanceStatus, StatusReport};

/// The API reports the SSH port one below the one that answers.
const MONITOR_PORT_OFFSET: u16 = 1;

/// Progress notifications from a monitoring run.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
  InstanceLookupFailed(String),
  InstanceNotFound,
  WaitingForSsh(SshUnavailable),
  Connecting(SshEndpoint),
  UnexpectedOutput(String),
  Status(StatusReport),
  Sleeping(Duration),
}

/// Receives [`MonitorEvent`]s as they happen.
pub trait ReportSink: Send + Sync {
  fn report(&self, event: &MonitorEvent);
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
  Ready(StatusReport),
  Failed(StatusReport),
  TimedOut,
  Cancelled,
}

/// Polls an instance until it is ready, fails, or the wait runs out.
#[derive(Debug, Clone)]
pub struct Monitor {
  pub max_wait: Duration,
  pub poll_interval: Duration,
}

impl Default for Monitor {
  fn default() -> Self {
    Self {
      max_wait: Duration::from_secs(60 * 60),
      poll_interval: Duration::from_secs(10),
    }
  }
}

impl Monitor {
  pub fn new(max_wait: Duration, poll_interval: Duration) -> Self {
    Self {
      max_wait,
      poll_interval,
    }
  }

  #[instrument(skip(self, source, probe, sink, cancel))]
  pub async fn run(
    &self,
    instance_id: &str,
    source: &dyn InstanceSource,
    probe: &dyn StatusProbe,
    sink: &dyn ReportSink,
    cancel: &CancellationToken,
  ) -> MonitorOutcome {
    info!(
      max_wait_secs = self.max_wait.as_secs(),
      poll_interval_secs = self.poll_interval.as_secs(),
      "starting monitor"
    );
    // A wait too long to represent never expires
    let deadline = Instant::now().checked_add(self.max_wait);

    while deadline.is_none_or(|deadline| Instant::now() < deadline) {
      let round = tokio::select! {
        _ = cancel.cancelled() => return MonitorOutcome::Cancelled,
        round = self.round(instance_id, source, probe, sink) => round,
      };

      match round {
        Some(report) if report.status == InstanceStatus::Ready => {
          info!("instance is ready");
          return MonitorOutcome::Ready(report);
        }
        Some(report) if report.status == InstanceStatus::Error => {
          warn!(details = %report.details, "instance reported an error");
          return MonitorOutcome::Failed(report);
        }
        _ => {}
      }

      sink.report(&MonitorEvent::Sleeping(self.poll_interval));
      tokio::select! {
        _ = cancel.cancelled() => return MonitorOutcome::Cancelled,
        _ = sleep(self.poll_interval) => {}
      }
    }

    warn!("timed out waiting for instance");
    MonitorOutcome::TimedOut
  }

  /// One check. `None` means there was nothing to report this round.
  async fn round(
    &self,
    instance_id: &str,
    source: &dyn InstanceSource,
    probe: &dyn StatusProbe,
    sink: &dyn ReportSink,
  ) -> Option<StatusReport> {
    let instance = match source.instance(instance_id).await {
      Ok(Some(instance)) => instance,
      Ok(None) => {
        sink.report(&MonitorEvent::InstanceNotFound);
        return None;
      }
      Err(err) => {
        sink.report(&MonitorEvent::InstanceLookupFailed(err.to_string()));
        return None;
      }
    };

    let endpoint = match instance.ssh_endpoint(MONITOR_PORT_OFFSET) {
      Ok(endpoint) => endpoint,
      Err(reason) => {
        sink.report(&MonitorEvent::WaitingForSsh(reason));
        return None;
      }
    };

    sink.report(&MonitorEvent::Connecting(endpoint.clone()));
    match probe.probe(&endpoint).await {
      Ok(report) => {
        sink.report(&MonitorEvent::Status(report.clone()));
        Some(report)
      }
      Err(MonitorError::UnexpectedOutput(output)) => {
        sink.report(&MonitorEvent::UnexpectedOutput(output));
        None
      }
      Err(err) => {
        sink.report(&MonitorEvent::UnexpectedOutput(err.to_string()));
        None
      }
    }
  }
}
