use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use vastctl_workflow::ApiPrompt;

/// Node holding the positive prompt in the stock image-to-video workflow.
pub const DEFAULT_PROMPT_NODE_ID: &str = "6";

/// Node holding the `LoadImage` loader in the stock image-to-video workflow.
pub const DEFAULT_IMAGE_NODE_ID: &str = "62";

/// The two values an operator swaps into a workflow before running it.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptEdit {
  pub prompt_text: String,
  pub image_filename: String,
  pub prompt_node_id: String,
  pub image_node_id: String,
}

impl PromptEdit {
  /// An edit targeting the default prompt and image nodes.
  pub fn new(prompt_text: impl Into<String>, image_filename: impl Into<String>) -> Self {
    Self {
      prompt_text: prompt_text.into(),
      image_filename: image_filename.into(),
      prompt_node_id: DEFAULT_PROMPT_NODE_ID.to_string(),
      image_node_id: DEFAULT_IMAGE_NODE_ID.to_string(),
    }
  }

  pub fn with_nodes(mut self, prompt_node_id: &str, image_node_id: &str) -> Self {
    self.prompt_node_id = prompt_node_id.to_string();
    self.image_node_id = image_node_id.to_string();
    self
  }
}

/// What happened to one edited field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FieldChange {
  Updated {
    node_id: String,
    old: Value,
    new: Value,
  },
  NodeMissing {
    node_id: String,
    available: Vec<String>,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditReport {
  pub prompt: FieldChange,
  pub image: FieldChange,
}

/// Set the prompt text and image filename on their nodes.
///
/// A missing node is reported, not treated as an error.
pub fn apply_edit(prompt: &mut ApiPrompt, edit: &PromptEdit) -> EditReport {
  info!(
    prompt_text = %edit.prompt_text,
    image = %edit.image_filename,
    "modifying workflow"
  );

  EditReport {
    prompt: set_input(prompt, &edit.prompt_node_id, "text", &edit.prompt_text),
    image: set_input(prompt, &edit.image_node_id, "image", &edit.image_filename),
  }
}

fn set_input(prompt: &mut ApiPrompt, node_id: &str, input: &str, value: &str) -> FieldChange {
  let available = prompt.node_ids();

  match prompt.get_mut(node_id) {
    Some(node) => {
      let new = Value::String(value.to_string());
      let old = node
        .inputs
        .insert(input.to_string(), new.clone())
        .unwrap_or_else(|| Value::String(String::new()));
      info!(node_id, input, old = %old, new = %new, "updated node input");
      FieldChange::Updated {
        node_id: node_id.to_string(),
        old,
        new,
      }
    }
    None => {
      warn!(node_id, input, available = ?available, "node not found in workflow");
      FieldChange::NodeMissing {
        node_id: node_id.to_string(),
        available,
      }
    }
  }
}
