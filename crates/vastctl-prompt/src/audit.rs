use serde::Serialize;
use serde_json::Value;
use vastctl_workflow::ApiPrompt;

use crate::edit::PromptEdit;

/// Marks an audit entry that matches one of the operator's own edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditHighlight {
  CustomPrompt,
  UploadedImage,
}

/// A single input whose value differs between two prompts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
  pub node_id: String,
  pub class_type: String,
  pub input: String,
  pub old: Option<Value>,
  pub new: Value,
  pub highlight: Option<AuditHighlight>,
}

/// List every changed input on nodes present in both prompts.
pub fn audit(original: &ApiPrompt, modified: &ApiPrompt, edit: &PromptEdit) -> Vec<AuditEntry> {
  let mut entries = Vec::new();

  for (node_id, modified_node) in &modified.nodes {
    let Some(original_node) = original.get(node_id) else {
      continue;
    };

    for (input, new) in &modified_node.inputs {
      let old = original_node.inputs.get(input);
      if old == Some(new) {
        continue;
      }

      let highlight = match (input.as_str(), new.as_str()) {
        ("text", Some(text)) if text == edit.prompt_text => Some(AuditHighlight::CustomPrompt),
        ("image", Some(image)) if image == edit.image_filename => {
          Some(AuditHighlight::UploadedImage)
        }
        _ => None,
      };

      entries.push(AuditEntry {
        node_id: node_id.clone(),
        class_type: modified_node.class_type.clone(),
        input: input.clone(),
        old: old.cloned(),
        new: new.clone(),
        highlight,
      });
    }
  }

  entries
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::edit::apply_edit;
  use serde_json::json;

  #[test]
  fn test_audit_lists_changes_with_highlights() {
    let original = ApiPrompt::from_value(json!({
      "6": { "class_type": "CLIPTextEncode", "inputs": { "text": "old", "clip": ["4", 1] } },
      "62": { "class_type": "LoadImage", "inputs": { "image": "a.png" } },
      "3": { "class_type": "KSampler", "inputs": { "seed": 1 } }
    }))
    .unwrap();

    let mut modified = original.clone();
    let edit = PromptEdit::new("new prompt", "b.png");
    apply_edit(&mut modified, &edit);
    modified.get_mut("3").unwrap().inputs.insert("seed".into(), json!(2));

    let entries = audit(&original, &modified, &edit);
    assert_eq!(entries.len(), 3);

    let by_input = |name: &str| entries.iter().find(|e| e.input == name).unwrap();
    assert_eq!(by_input("text").highlight, Some(AuditHighlight::CustomPrompt));
    assert_eq!(by_input("image").highlight, Some(AuditHighlight::UploadedImage));
    assert_eq!(by_input("seed").highlight, None);
    assert_eq!(by_input("seed").old, Some(json!(1)));
  }

  #[test]
  fn test_audit_ignores_new_nodes_and_unchanged_prompt() {
    let original = ApiPrompt::from_value(json!({
      "1": { "class_type": "Note", "inputs": {} }
    }))
    .unwrap();
    let mut modified = original.clone();
    modified.insert("2", vastctl_workflow::ApiNode::new("Extra"));

    let edit = PromptEdit::new("p", "i.png");
    assert!(audit(&original, &modified, &edit).is_empty());
  }
}
