use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, instrument};
use vastctl_prompt::{AuditEntry, EditReport, PromptEdit, apply_edit, audit, load_prompt, write_back_ui};
use vastctl_remote::RemoteShell;
use vastctl_workflow::{ApiPrompt, WorkflowGraph};

use crate::client::ComfyClient;
use crate::error::ComfyError;

/// Where the edited API-format prompt is left for inspection.
pub const API_OUTPUT_PATH: &str = "/tmp/modified_workflow_api.json";

/// Where the edited UI-format graph is left, ready to load into the web UI.
pub const UI_OUTPUT_PATH: &str = "/tmp/modified_workflow_ui.json";

/// An image and prompt to push through a workflow.
#[derive(Debug, Clone)]
pub struct RunRequest {
  pub image: PathBuf,
  pub prompt_text: String,
  pub prompt_node_id: Option<String>,
  pub image_node_id: Option<String>,
}

impl RunRequest {
  pub fn new(image: impl Into<PathBuf>, prompt_text: impl Into<String>) -> Self {
    Self {
      image: image.into(),
      prompt_text: prompt_text.into(),
      prompt_node_id: None,
      image_node_id: None,
    }
  }

  pub fn with_nodes(mut self, prompt_node_id: &str, image_node_id: &str) -> Self {
    self.prompt_node_id = Some(prompt_node_id.to_string());
    self.image_node_id = Some(image_node_id.to_string());
    self
  }

  fn edit_for(&self, image_filename: &str) -> PromptEdit {
    let edit = PromptEdit::new(&self.prompt_text, image_filename);
    let prompt_node = self.prompt_node_id.as_deref().unwrap_or(&edit.prompt_node_id).to_string();
    let image_node = self.image_node_id.as_deref().unwrap_or(&edit.image_node_id).to_string();
    edit.with_nodes(&prompt_node, &image_node)
  }
}

/// Result of submitting a workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
  pub prompt_id: String,
  pub image_filename: String,
  pub edit: EditReport,
  pub audit: Vec<AuditEntry>,
}

impl<S: RemoteShell> ComfyClient<S> {
  /// Re-run the most recent workflow from history with a new image and
  /// prompt.
  #[instrument(skip(self, request), fields(image = %request.image.display()))]
  pub async fn run_workflow(&self, request: &RunRequest) -> Result<RunSummary, ComfyError> {
    let image_filename = self.upload_image(&request.image, None).await?;
    let original = self.latest_workflow().await?;

    self.submit(original, request.edit_for(&image_filename)).await
  }

  /// Run a workflow file stored on the instance with a new image and
  /// prompt.
  ///
  /// Both the edited API prompt and a matching UI graph are saved on the
  /// instance before queueing.
  #[instrument(skip(self, request), fields(image = %request.image.display()))]
  pub async fn run_workflow_from_file(
    &self,
    workflow_path: &str,
    request: &RunRequest,
  ) -> Result<RunSummary, ComfyError> {
    let image_filename = self.upload_image(&request.image, None).await?;
    let edit = request.edit_for(&image_filename);

    let document = self.read_remote_json(workflow_path).await?;
    let is_graph = document.get("nodes").is_some();
    let original = load_prompt(document.clone())?;

    let mut modified = original.clone();
    let edit_report = apply_edit(&mut modified, &edit);
    let audit = audit(&original, &modified, &edit);

    self.write_remote_json(API_OUTPUT_PATH, &modified).await?;
    if is_graph {
      let graph = WorkflowGraph::from_value(document)?;
      self
        .write_remote_json(UI_OUTPUT_PATH, &write_back_ui(&graph, &edit))
        .await?;
    }

    let prompt_id = self.queue_prompt(&modified).await?;
    info!(prompt_id = %prompt_id, "workflow submitted");

    Ok(RunSummary {
      prompt_id,
      image_filename,
      edit: edit_report,
      audit,
    })
  }

  /// Apply an edit to a UI-format workflow on the instance and save the
  /// result to `output_path` there.
  #[instrument(skip(self, edit))]
  pub async fn save_ui_workflow(
    &self,
    workflow_path: &str,
    edit: &PromptEdit,
    output_path: &str,
  ) -> Result<WorkflowGraph, ComfyError> {
    let document = self.read_remote_json(workflow_path).await?;
    let graph = write_back_ui(&WorkflowGraph::from_value(document)?, edit);
    self.write_remote_json(output_path, &graph).await?;
    Ok(graph)
  }

  async fn submit(&self, original: ApiPrompt, edit: PromptEdit) -> Result<RunSummary, ComfyError> {
    let mut modified = original.clone();
    let edit_report = apply_edit(&mut modified, &edit);
    let audit = audit(&original, &modified, &edit);

    let prompt_id = self.queue_prompt(&modified).await?;
    info!(prompt_id = %prompt_id, "workflow submitted");

    Ok(RunSummary {
      prompt_id,
      image_filename: edit.image_filename,
      edit: edit_report,
      audit,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{ScriptedShell, ok};
  use serde_json::{Value, json};
  use vastctl_prompt::{AuditHighlight, FieldChange};

  const GRAPH: &str = r#"{
    "nodes": [
      {"id": 6, "type": "CLIPTextEncode",
        "inputs": [{"name": "text", "type": "STRING", "widget": {"name": "text"}}],
        "widgets_values": ["old prompt"]},
      {"id": 62, "type": "LoadImage",
        "inputs": [{"name": "image", "type": "COMBO", "widget": {"name": "image"}}],
        "widgets_values": ["old.png", "image"]}
    ],
    "links": []
  }"#;

  fn image() -> tempfile::NamedTempFile {
    tempfile::Builder::new()
      .prefix("input")
      .suffix(".png")
      .tempfile()
      .unwrap()
  }

  #[tokio::test]
  async fn test_run_workflow_from_file() {
    let image = image();
    let shell = ScriptedShell::new()
      .on("test -d /workspace/ComfyUI/input", ok("exists"))
      .on("cat /workspace/wf.json", ok(GRAPH))
      .on("/prompt", ok(r#"{"prompt_id": "p-1"}"#));
    let client = ComfyClient::new(shell);

    let request = RunRequest::new(image.path(), "a red fox");
    let summary = client
      .run_workflow_from_file("/workspace/wf.json", &request)
      .await
      .unwrap();

    assert_eq!(summary.prompt_id, "p-1");
    assert!(matches!(summary.edit.prompt, FieldChange::Updated { .. }));
    assert_eq!(summary.audit.len(), 2);
    assert!(
      summary
        .audit
        .iter()
        .any(|entry| entry.highlight == Some(AuditHighlight::CustomPrompt))
    );

    let api: Value =
      serde_json::from_str(&client.shell().stdin_for(API_OUTPUT_PATH).unwrap()).unwrap();
    assert_eq!(api["6"]["inputs"]["text"], json!("a red fox"));

    let ui: Value =
      serde_json::from_str(&client.shell().stdin_for(UI_OUTPUT_PATH).unwrap()).unwrap();
    assert_eq!(ui["nodes"][0]["widgets_values"][0], json!("a red fox"));
    assert_eq!(ui["nodes"][1]["widgets_values"][0], json!(summary.image_filename));

    let queued: Value = serde_json::from_str(&client.shell().stdin_for("/prompt").unwrap()).unwrap();
    assert_eq!(queued["prompt"]["62"]["inputs"]["image"], json!(summary.image_filename));
  }

  #[tokio::test]
  async fn test_run_workflow_uses_latest_history() {
    let image = image();
    let history = json!({
      "h1": {"prompt": [0, "h1", {
        "10": {"class_type": "CLIPTextEncode", "inputs": {"text": "old"}},
        "11": {"class_type": "LoadImage", "inputs": {"image": "old.png"}}
      }, {}, []]}
    });
    let shell = ScriptedShell::new()
      .on("-X GET http://127.0.0.1:8188/history", ok(&history.to_string()))
      .on("/prompt", ok(r#"{"prompt_id": "p-2"}"#));
    let client = ComfyClient::new(shell);

    let request = RunRequest::new(image.path(), "night sky").with_nodes("10", "11");
    let summary = client.run_workflow(&request).await.unwrap();

    assert_eq!(summary.prompt_id, "p-2");
    let queued: Value = serde_json::from_str(&client.shell().stdin_for("/prompt").unwrap()).unwrap();
    assert_eq!(queued["prompt"]["10"]["inputs"]["text"], json!("night sky"));
    assert!(client.shell().stdin_for(API_OUTPUT_PATH).is_none());
  }

  #[tokio::test]
  async fn test_run_with_missing_nodes_still_queues() {
    let image = image();
    let history = json!({
      "h1": {"prompt": [0, "h1", {"3": {"class_type": "KSampler", "inputs": {}}}, {}, []]}
    });
    let shell = ScriptedShell::new()
      .on("/history", ok(&history.to_string()))
      .on("/prompt", ok(r#"{"prompt_id": "p-3"}"#));
    let client = ComfyClient::new(shell);

    let summary = client
      .run_workflow(&RunRequest::new(image.path(), "x"))
      .await
      .unwrap();

    assert!(matches!(summary.edit.prompt, FieldChange::NodeMissing { .. }));
    assert!(summary.audit.is_empty());
  }

  #[tokio::test]
  async fn test_save_ui_workflow() {
    let client = ComfyClient::new(ScriptedShell::new().on("cat /w.json", ok(GRAPH)));
    let edit = PromptEdit::new("new prompt", "new.png");

    let graph = client
      .save_ui_workflow("/w.json", &edit, "/tmp/out.json")
      .await
      .unwrap();

    assert_eq!(graph.node(62).unwrap().widgets_values.as_list().unwrap()[0], json!("new.png"));
    assert!(client.shell().stdin_for("cat > /tmp/out.json").is_some());
  }
}
