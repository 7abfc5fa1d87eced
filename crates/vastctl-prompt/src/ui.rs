use serde_json::Value;
use tracing::info;
use vastctl_workflow::WorkflowGraph;

use crate::edit::PromptEdit;

/// Apply a prompt edit to a copy of the UI-format graph, so the result can
/// be dragged into the ComfyUI web interface.
///
/// Only a `CLIPTextEncode` prompt node and a `LoadImage` image node are
/// touched, and only their first positional widget value.
pub fn write_back_ui(graph: &WorkflowGraph, edit: &PromptEdit) -> WorkflowGraph {
  let mut ui_graph = graph.clone();

  for node in &mut ui_graph.nodes {
    let node_id = node.id.to_string();

    let replacement = if node_id == edit.prompt_node_id && node.node_type == "CLIPTextEncode" {
      &edit.prompt_text
    } else if node_id == edit.image_node_id && node.node_type == "LoadImage" {
      &edit.image_filename
    } else {
      continue;
    };

    if let Some(first) = node
      .widgets_values
      .as_list_mut()
      .and_then(|values| values.first_mut())
    {
      *first = Value::String(replacement.clone());
      info!(node_id = %node_id, value = %replacement, "updated ui workflow node");
    }
  }

  ui_graph
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn graph() -> WorkflowGraph {
    WorkflowGraph::from_value(json!({
      "nodes": [
        { "id": 6, "type": "CLIPTextEncode", "widgets_values": ["old"] },
        { "id": 62, "type": "LoadImage", "widgets_values": ["old.png", "image"] },
        { "id": 7, "type": "CLIPTextEncode", "widgets_values": ["negative"] }
      ]
    }))
    .unwrap()
  }

  #[test]
  fn test_write_back_updates_first_widget_value() {
    let original = graph();
    let updated = write_back_ui(&original, &PromptEdit::new("new", "new.png"));

    let widgets = |graph: &WorkflowGraph, id| graph.node(id).unwrap().widgets_values.to_value();
    assert_eq!(widgets(&updated, 6), json!(["new"]));
    assert_eq!(widgets(&updated, 62), json!(["new.png", "image"]));
    assert_eq!(widgets(&updated, 7), json!(["negative"]));
    // Input graph is left untouched
    assert_eq!(widgets(&original, 6), json!(["old"]));
  }

  #[test]
  fn test_write_back_requires_matching_type() {
    let edit = PromptEdit::new("new", "new.png").with_nodes("62", "6");
    let updated = write_back_ui(&graph(), &edit);
    assert_eq!(updated, graph());
  }

  #[test]
  fn test_write_back_leaves_keyed_widgets_alone() {
    let graph = WorkflowGraph::from_value(json!({
      "nodes": [
        { "id": 62, "type": "LoadImage", "widgets_values": { "image": "old.png" } }
      ]
    }))
    .unwrap();

    let updated = write_back_ui(&graph, &PromptEdit::new("new", "new.png"));
    assert_eq!(updated, graph);
  }
}
