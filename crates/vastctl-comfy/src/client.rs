use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use vastctl_prompt::load_prompt;
use vastctl_remote::{CommandOutput, RemoteShell, quote};
use vastctl_workflow::ApiPrompt;

use crate::error::ComfyError;
use crate::history::FirstEntry;
use crate::queue::{CancelOutcome, JobState, QueueStatus, QueuedJob};

/// ComfyUI as seen from the instance itself.
pub const DEFAULT_COMFY_URL: &str = "http://127.0.0.1:8188";

/// Where ComfyUI installs usually keep their input directory, in order.
pub const COMFY_INPUT_DIRS: &[&str] = &[
  "/workspace/ComfyUI/input",
  "/root/ComfyUI/input",
  "/ComfyUI/input",
];

const JSON_POST: &str = "curl -s -X POST -H 'Content-Type: application/json' -d @-";

/// Client for the ComfyUI API of one instance.
pub struct ComfyClient<S> {
  shell: S,
  base_url: String,
  cancel_poll_interval: Duration,
  cancel_poll_attempts: u32,
}

impl<S: RemoteShell> ComfyClient<S> {
  pub fn new(shell: S) -> Self {
    Self {
      shell,
      base_url: DEFAULT_COMFY_URL.to_string(),
      cancel_poll_interval: Duration::from_secs(2),
      cancel_poll_attempts: 10,
    }
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into().trim_end_matches('/').to_string();
    self
  }

  /// How often, and how many times, to check that an interrupted job left
  /// the running queue.
  pub fn with_cancel_polling(mut self, interval: Duration, attempts: u32) -> Self {
    self.cancel_poll_interval = interval;
    self.cancel_poll_attempts = attempts;
    self
  }

  pub fn shell(&self) -> &S {
    &self.shell
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  async fn get(&self, path: &str) -> Result<CommandOutput, ComfyError> {
    let command = format!("curl -s -X GET {}", quote(&self.url(path)));
    Ok(self.shell.exec(&command).await?)
  }

  async fn post_json(&self, path: &str, body: &Value) -> Result<CommandOutput, ComfyError> {
    let command = format!("{} {}", JSON_POST, quote(&self.url(path)));
    let payload = serde_json::to_vec(body).map_err(ComfyError::Encode)?;
    Ok(self.shell.exec_with_stdin(&command, &payload).await?)
  }

  /// Upload a local image into ComfyUI's input directory and return the
  /// file name it is stored under.
  #[instrument(skip(self))]
  pub async fn upload_image(
    &self,
    local_path: &Path,
    remote_name: Option<&str>,
  ) -> Result<String, ComfyError> {
    if !local_path.is_file() {
      return Err(ComfyError::ImageNotFound(local_path.to_path_buf()));
    }

    let file_name = match remote_name {
      Some(name) => name.to_string(),
      None => local_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ComfyError::ImageNotFound(local_path.to_path_buf()))?,
    };

    let input_dir = self.input_dir().await?;
    let remote_path = format!("{}/{}", input_dir, file_name);

    info!(local = %local_path.display(), remote = %remote_path, "uploading image");
    self.shell.upload(local_path, &remote_path).await?;

    Ok(file_name)
  }

  async fn input_dir(&self) -> Result<&'static str, ComfyError> {
    for &dir in COMFY_INPUT_DIRS {
      let output = self
        .shell
        .exec(&format!("test -d {} && echo exists", quote(dir)))
        .await?;
      if output.stdout.trim() == "exists" {
        return Ok(dir);
      }
    }

    let dir = COMFY_INPUT_DIRS[0];
    debug!(dir, "no ComfyUI input directory found, creating one");
    let command = format!("mkdir -p {}", quote(dir));
    self.shell.exec(&command).await?.check(&command)?;
    Ok(dir)
  }

  /// The whole `/history` document.
  #[instrument(skip(self))]
  pub async fn history(&self) -> Result<Value, ComfyError> {
    let output = self.get("/history").await?.check("GET /history")?;
    parse_json("/history", &output.stdout)
  }

  /// The prompt of the first `/history` entry.
  #[instrument(skip(self))]
  pub async fn latest_workflow(&self) -> Result<ApiPrompt, ComfyError> {
    let output = self.get("/history").await?.check("GET /history")?;

    let FirstEntry(entry) =
      serde_json::from_str(&output.stdout).map_err(|source| ComfyError::InvalidJson {
        what: "/history".to_string(),
        source,
      })?;
    let (prompt_id, item) = entry.ok_or(ComfyError::EmptyHistory)?;

    // History items store the prompt as [number, prompt_id, prompt, extra, outputs]
    let prompt = item
      .get("prompt")
      .and_then(|prompt| prompt.get(2))
      .cloned()
      .ok_or_else(|| ComfyError::UnexpectedResponse {
        what: format!("/history entry {}", prompt_id),
        detail: "missing prompt".to_string(),
      })?;

    info!(prompt_id = %prompt_id, "found latest workflow");
    Ok(ApiPrompt::from_value(prompt)?)
  }

  /// One history entry, or an empty object if it cannot be fetched.
  pub async fn history_item(&self, prompt_id: &str) -> Value {
    self
      .get_json_or_empty(&format!("/history/{}", prompt_id))
      .await
  }

  /// Input configuration of a node type, or an empty object if unavailable.
  pub async fn object_info(&self, node_type: &str) -> Value {
    self
      .get_json_or_empty(&format!("/object_info/{}", node_type))
      .await
  }

  async fn get_json_or_empty(&self, path: &str) -> Value {
    let output = match self.get(path).await {
      Ok(output) if output.success() => output,
      Ok(_) => return empty_object(),
      Err(err) => {
        debug!(path, error = %err, "lookup failed");
        return empty_object();
      }
    };

    parse_json(path, &output.stdout).unwrap_or_else(|err| {
      debug!(path, error = %err, "lookup returned invalid JSON");
      empty_object()
    })
  }

  #[instrument(skip(self))]
  pub async fn queue_status(&self) -> Result<QueueStatus, ComfyError> {
    let output = self.get("/queue").await?.check("GET /queue")?;
    serde_json::from_str(&output.stdout).map_err(|source| ComfyError::InvalidJson {
      what: "/queue".to_string(),
      source,
    })
  }

  pub async fn find_job(&self, job_id: &str) -> Result<Option<QueuedJob>, ComfyError> {
    Ok(self.queue_status().await?.find(job_id))
  }

  /// Queue a prompt for execution and return its prompt id.
  #[instrument(skip(self, prompt), fields(nodes = prompt.len()))]
  pub async fn queue_prompt(&self, prompt: &ApiPrompt) -> Result<String, ComfyError> {
    let client_id = Uuid::new_v4().to_string();
    let prompt = serde_json::to_value(prompt).map_err(ComfyError::Encode)?;
    let payload = json!({ "prompt": prompt, "client_id": client_id });

    let output = self
      .post_json("/prompt", &payload)
      .await?
      .check("POST /prompt")?;
    let response = parse_json("/prompt", &output.stdout)?;

    match response.get("prompt_id").and_then(Value::as_str) {
      Some(prompt_id) => {
        info!(prompt_id, "job queued");
        Ok(prompt_id.to_string())
      }
      None => Err(ComfyError::MissingPromptId(response.to_string())),
    }
  }

  /// Interrupt whatever is currently executing.
  #[instrument(skip(self))]
  pub async fn interrupt(&self) -> Result<(), ComfyError> {
    let command = format!("curl -s -X POST {}", quote(&self.url("/interrupt")));
    self.shell.exec(&command).await?.check("POST /interrupt")?;
    Ok(())
  }

  /// Remove pending jobs from the queue.
  #[instrument(skip(self))]
  pub async fn delete_from_queue(&self, job_ids: &[String]) -> Result<(), ComfyError> {
    self
      .post_json("/queue", &json!({ "delete": job_ids }))
      .await?
      .check("POST /queue")?;
    Ok(())
  }

  /// Cancel a job: interrupt it if running, drop it from the queue if
  /// pending.
  #[instrument(skip(self))]
  pub async fn cancel_job(&self, job_id: &str) -> Result<CancelOutcome, ComfyError> {
    let Some(job) = self.find_job(job_id).await? else {
      let history = self.history_item(job_id).await;
      if history.as_object().is_some_and(|item| !item.is_empty()) {
        return Err(ComfyError::JobFinished(job_id.to_string()));
      }
      return Err(ComfyError::JobNotFound(job_id.to_string()));
    };

    match job.state {
      JobState::Pending => {
        self.delete_from_queue(&[job.job_id]).await?;
        info!(job_id, position = job.position, "removed pending job");
        Ok(CancelOutcome::Removed {
          position: job.position,
        })
      }
      JobState::Running => {
        self.interrupt().await?;
        let confirmed = self.wait_until_stopped(job_id).await?;
        if confirmed {
          info!(job_id, "running job cancelled");
        } else {
          warn!(job_id, "interrupt sent but job still listed as running");
        }
        Ok(CancelOutcome::Interrupted { confirmed })
      }
    }
  }

  async fn wait_until_stopped(&self, job_id: &str) -> Result<bool, ComfyError> {
    for attempt in 1..=self.cancel_poll_attempts {
      tokio::time::sleep(self.cancel_poll_interval).await;
      if !self.queue_status().await?.is_running(job_id) {
        return Ok(true);
      }
      debug!(job_id, attempt, "still cancelling");
    }
    Ok(false)
  }

  /// Read and parse a JSON file on the instance.
  pub async fn read_remote_json(&self, path: &str) -> Result<Value, ComfyError> {
    let command = format!("cat {}", quote(path));
    let output = self.shell.exec(&command).await?.check(&command)?;
    parse_json(path, &output.stdout)
  }

  /// Load a workflow file from the instance as an API prompt, converting
  /// UI-format graphs on the way.
  #[instrument(skip(self))]
  pub async fn load_workflow_file(&self, path: &str) -> Result<ApiPrompt, ComfyError> {
    let document = self.read_remote_json(path).await?;
    Ok(load_prompt(document)?)
  }

  /// Write a value as pretty JSON to a file on the instance.
  pub async fn write_remote_json<T: Serialize>(
    &self,
    path: &str,
    value: &T,
  ) -> Result<(), ComfyError> {
    let body = serde_json::to_vec_pretty(value).map_err(ComfyError::Encode)?;
    let command = format!("cat > {}", quote(path));
    self
      .shell
      .exec_with_stdin(&command, &body)
      .await?
      .check(&command)?;
    info!(path, "saved workflow");
    Ok(())
  }
}

fn empty_object() -> Value {
  Value::Object(Default::default())
}

fn parse_json(what: &str, body: &str) -> Result<Value, ComfyError> {
  serde_json::from_str(body).map_err(|source| ComfyError::InvalidJson {
    what: what.to_string(),
    source,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{ScriptedShell, failed, ok};

  fn client(shell: ScriptedShell) -> ComfyClient<ScriptedShell> {
    ComfyClient::new(shell).with_cancel_polling(Duration::ZERO, 3)
  }

  #[tokio::test]
  async fn test_upload_uses_first_existing_dir() {
    let image = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    let shell = ScriptedShell::new().on("test -d /root/ComfyUI/input", ok("exists\n"));
    let client = client(shell);

    let name = client.upload_image(image.path(), Some("cat.png")).await.unwrap();

    assert_eq!(name, "cat.png");
    let uploads = client.shell().uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].1, "/root/ComfyUI/input/cat.png");
    assert!(!client.shell().commands().iter().any(|c| c.starts_with("mkdir")));
  }

  #[tokio::test]
  async fn test_upload_creates_workspace_dir_when_none_exist() {
    let image = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
    let client = client(ScriptedShell::new());

    let name = client.upload_image(image.path(), None).await.unwrap();

    let expected_name = image.path().file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name, expected_name);
    assert!(
      client
        .shell()
        .commands()
        .contains(&"mkdir -p /workspace/ComfyUI/input".to_string())
    );
    let uploads = client.shell().uploads.lock().unwrap().clone();
    assert_eq!(
      uploads[0].1,
      format!("/workspace/ComfyUI/input/{}", expected_name)
    );
  }

  #[tokio::test]
  async fn test_upload_missing_file() {
    let client = client(ScriptedShell::new());
    let result = client
      .upload_image(Path::new("/no/such/image.png"), None)
      .await;
    assert!(matches!(result, Err(ComfyError::ImageNotFound(_))));
    assert!(client.shell().commands().is_empty());
  }

  #[tokio::test]
  async fn test_latest_workflow_takes_first_entry() {
    let history = r#"{
      "zzz": {"prompt": [1, "zzz", {"6": {"class_type": "CLIPTextEncode", "inputs": {"text": "first"}}}, {}, []]},
      "aaa": {"prompt": [0, "aaa", {"6": {"class_type": "CLIPTextEncode", "inputs": {"text": "second"}}}, {}, []]}
    }"#;
    let client = client(ScriptedShell::new().on("/history", ok(history)));

    let prompt = client.latest_workflow().await.unwrap();

    assert_eq!(prompt.get("6").unwrap().inputs["text"], json!("first"));
  }

  #[tokio::test]
  async fn test_latest_workflow_empty_history() {
    let client = client(ScriptedShell::new().on("/history", ok("{}")));
    assert!(matches!(
      client.latest_workflow().await,
      Err(ComfyError::EmptyHistory)
    ));
  }

  #[tokio::test]
  async fn test_history_item_is_empty_on_failure() {
    let client = client(
      ScriptedShell::new()
        .on("/history/bad", ok("<html>not json</html>"))
        .on("/history/down", failed("curl: (7) Failed to connect")),
    );

    assert_eq!(client.history_item("bad").await, json!({}));
    assert_eq!(client.history_item("down").await, json!({}));
  }

  #[tokio::test]
  async fn test_object_info() {
    let client = client(ScriptedShell::new().on(
      "/object_info/KSampler",
      ok(r#"{"KSampler": {"input": {"required": {}}}}"#),
    ));

    assert!(client.object_info("KSampler").await.get("KSampler").is_some());
    assert_eq!(client.object_info("Missing").await, json!({}));
  }

  #[tokio::test]
  async fn test_queue_prompt_posts_payload_on_stdin() {
    let client = client(ScriptedShell::new().on(
      "/prompt",
      ok(r#"{"prompt_id": "abc-123", "number": 4}"#),
    ));
    let prompt = ApiPrompt::from_value(json!({
      "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "hi"}}
    }))
    .unwrap();

    let prompt_id = client.queue_prompt(&prompt).await.unwrap();

    assert_eq!(prompt_id, "abc-123");
    let sent: Value = serde_json::from_str(&client.shell().stdin_for("/prompt").unwrap()).unwrap();
    assert_eq!(sent["prompt"]["6"]["inputs"]["text"], json!("hi"));
    let client_id = sent["client_id"].as_str().unwrap();
    assert!(Uuid::parse_str(client_id).is_ok());
    assert!(client.shell().commands()[0].contains("-d @-"));
  }

  #[tokio::test]
  async fn test_queue_prompt_without_prompt_id() {
    let client = client(ScriptedShell::new().on(
      "/prompt",
      ok(r#"{"error": {"type": "invalid_prompt"}}"#),
    ));

    let result = client.queue_prompt(&ApiPrompt::default()).await;
    assert!(matches!(result, Err(ComfyError::MissingPromptId(body)) if body.contains("invalid_prompt")));
  }

  #[tokio::test]
  async fn test_cancel_pending_job_deletes_it() {
    let queue = r#"{"queue_running": [], "queue_pending": [[1, "other"], [2, "job-9"]]}"#;
    let client = client(ScriptedShell::new().on("/queue", ok(queue)));

    let outcome = client.cancel_job("job-9").await.unwrap();

    assert_eq!(outcome, CancelOutcome::Removed { position: 2 });
    let sent: Value = serde_json::from_str(&client.shell().stdin_for("/queue").unwrap()).unwrap();
    assert_eq!(sent, json!({"delete": ["job-9"]}));
  }

  #[tokio::test]
  async fn test_cancel_running_job_interrupts_and_confirms() {
    let running = ok(r#"{"queue_running": [[1, "job-1"]], "queue_pending": []}"#);
    let idle = ok(r#"{"queue_running": [], "queue_pending": []}"#);
    let client = client(
      ScriptedShell::new().on_seq("-X GET http://127.0.0.1:8188/queue", vec![running.clone(), running, idle]),
    );

    let outcome = client.cancel_job("job-1").await.unwrap();

    assert_eq!(outcome, CancelOutcome::Interrupted { confirmed: true });
    assert!(client.shell().commands().iter().any(|c| c.contains("/interrupt")));
  }

  #[tokio::test]
  async fn test_cancel_running_job_unconfirmed() {
    let running = ok(r#"{"queue_running": [[1, "job-1"]], "queue_pending": []}"#);
    let client = client(ScriptedShell::new().on("/queue", running));

    let outcome = client.cancel_job("job-1").await.unwrap();
    assert_eq!(outcome, CancelOutcome::Interrupted { confirmed: false });
  }

  #[tokio::test]
  async fn test_cancel_unknown_and_finished_jobs() {
    let client = client(
      ScriptedShell::new()
        .on("/queue", ok(r#"{"queue_running": [], "queue_pending": []}"#))
        .on("/history/done", ok(r#"{"done": {"status": {}}}"#))
        .on("/history/", ok("{}")),
    );

    assert!(matches!(
      client.cancel_job("done").await,
      Err(ComfyError::JobFinished(id)) if id == "done"
    ));
    assert!(matches!(
      client.cancel_job("ghost").await,
      Err(ComfyError::JobNotFound(id)) if id == "ghost"
    ));
  }

  #[tokio::test]
  async fn test_load_workflow_file_converts_ui_graph() {
    let graph = r#"{
      "nodes": [{"id": 6, "type": "CLIPTextEncode",
        "inputs": [{"name": "text", "type": "STRING", "widget": {"name": "text"}}],
        "widgets_values": ["a cat"]}],
      "links": []
    }"#;
    let client = client(ScriptedShell::new().on("cat /workspace/wf.json", ok(graph)));

    let prompt = client.load_workflow_file("/workspace/wf.json").await.unwrap();

    let node = prompt.get("6").unwrap();
    assert_eq!(node.class_type, "CLIPTextEncode");
    assert_eq!(node.inputs["text"], json!("a cat"));
  }

  #[tokio::test]
  async fn test_read_remote_json_missing_file() {
    let client = client(ScriptedShell::new().on("cat ", failed("No such file or directory")));
    let result = client.read_remote_json("/nope.json").await;
    assert!(matches!(result, Err(ComfyError::Remote(_))));
  }

  #[tokio::test]
  async fn test_write_remote_json_quotes_path() {
    let client = client(ScriptedShell::new());

    client
      .write_remote_json("/tmp/my workflow.json", &json!({"a": 1}))
      .await
      .unwrap();

    let written = client.shell().stdin_for("cat > ").unwrap();
    assert_eq!(serde_json::from_str::<Value>(&written).unwrap(), json!({"a": 1}));
    assert_eq!(client.shell().commands()[0], "cat > '/tmp/my workflow.json'");
  }
}
