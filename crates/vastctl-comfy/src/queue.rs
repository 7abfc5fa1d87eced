use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of `/queue`.
///
/// Each item is ComfyUI's `[number, prompt_id, prompt, extra, outputs]`
/// tuple; only the prompt id is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
  #[serde(default)]
  pub queue_running: Vec<Value>,
  #[serde(default)]
  pub queue_pending: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
  Running,
  Pending,
}

/// A job's place in the queue. Running jobs sit at position 0, pending
/// jobs count from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedJob {
  pub job_id: String,
  pub state: JobState,
  pub position: usize,
}

/// What `cancel_job` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
  /// The running job was interrupted. `confirmed` is false when it was
  /// still listed as running after the verification window.
  Interrupted { confirmed: bool },
  /// The pending job was removed from the queue.
  Removed { position: usize },
}

fn item_job_id(item: &Value) -> Option<&str> {
  item
    .as_array()
    .filter(|fields| fields.len() >= 2)
    .and_then(|fields| fields[1].as_str())
}

impl QueueStatus {
  pub fn running(&self) -> Vec<QueuedJob> {
    self
      .queue_running
      .iter()
      .filter_map(item_job_id)
      .map(|job_id| QueuedJob {
        job_id: job_id.to_string(),
        state: JobState::Running,
        position: 0,
      })
      .collect()
  }

  pub fn pending(&self) -> Vec<QueuedJob> {
    self
      .queue_pending
      .iter()
      .enumerate()
      .filter_map(|(index, item)| {
        item_job_id(item).map(|job_id| QueuedJob {
          job_id: job_id.to_string(),
          state: JobState::Pending,
          position: index + 1,
        })
      })
      .collect()
  }

  pub fn is_running(&self, job_id: &str) -> bool {
    self
      .queue_running
      .iter()
      .any(|item| item_job_id(item) == Some(job_id))
  }

  /// Locate a job, checking running jobs first.
  pub fn find(&self, job_id: &str) -> Option<QueuedJob> {
    self
      .running()
      .into_iter()
      .chain(self.pending())
      .find(|job| job.job_id == job_id)
  }

  pub fn total(&self) -> usize {
    self.queue_running.len() + self.queue_pending.len()
  }
}
