use serde_json::{Value, json};
use tracing::debug;
use vastctl_workflow::{ApiNode, ApiPrompt, WidgetValues, WorkflowError, WorkflowGraph};

use crate::remap::map_widget_values;

/// Convert a UI-format graph into an API prompt.
///
/// Connected inputs become `[source_node_id, source_slot]`. A link ID that
/// is missing from the graph's link list leaves the input unset. Widget
/// values are mapped afterwards and win over a connection of the same name.
/// Keyed widget values are matched to widget inputs by name.
pub fn graph_to_prompt(graph: &WorkflowGraph) -> ApiPrompt {
  let links = graph.link_index();
  let mut prompt = ApiPrompt::default();

  for node in &graph.nodes {
    let mut api_node = ApiNode::new(node.node_type.clone());

    for input in &node.inputs {
      if let Some(link_id) = input.link
        && let Some((source_node, source_slot)) = links.source(link_id)
      {
        api_node.inputs.insert(
          input.name.clone(),
          json!([source_node.to_string(), source_slot]),
        );
      }
    }

    match &node.widgets_values {
      WidgetValues::List(values) if !values.is_empty() => {
        let widgets = map_widget_values(&node.node_type, values, &node.inputs);
        api_node.inputs.extend(widgets);
      }
      WidgetValues::Map(values) => {
        for input in node.widget_inputs() {
          if let Some(value) = values.get(&input.name) {
            api_node.inputs.insert(input.name.clone(), value.clone());
          }
        }
      }
      WidgetValues::List(_) => {}
    }

    prompt.insert(node.id.to_string(), api_node);
  }

  debug!(nodes = prompt.len(), "converted workflow graph to api prompt");
  prompt
}

/// Load a prompt from either workflow shape.
///
/// Documents with a `nodes` key are UI graphs and get converted; anything
/// else is taken to be an API prompt already.
pub fn load_prompt(document: Value) -> Result<ApiPrompt, WorkflowError> {
  if document.get("nodes").is_some() {
    let graph = WorkflowGraph::from_value(document)?;
    Ok(graph_to_prompt(&graph))
  } else {
    ApiPrompt::from_value(document)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_graph() -> WorkflowGraph {
    WorkflowGraph::from_value(json!({
      "nodes": [
        {
          "id": 4,
          "type": "CheckpointLoaderSimple",
          "inputs": [],
          "widgets_values": ["model.safetensors"]
        },
        {
          "id": 6,
          "type": "CLIPTextEncode",
          "inputs": [
            { "name": "clip", "type": "CLIP", "link": 3 },
            { "name": "text", "type": "STRING", "widget": { "name": "text" }, "link": null }
          ],
          "widgets_values": ["a cat"]
        },
        {
          "id": 9,
          "type": "SaveImage",
          "inputs": [{ "name": "images", "type": "IMAGE", "link": 99 }]
        }
      ],
      "links": [[3, 4, 1, 6, 0, "CLIP"]]
    }))
    .unwrap()
  }

  #[test]
  fn test_graph_to_prompt_links_and_widgets() {
    let prompt = graph_to_prompt(&sample_graph());

    assert_eq!(prompt.len(), 3);

    let encode = prompt.get("6").unwrap();
    assert_eq!(encode.class_type, "CLIPTextEncode");
    assert_eq!(encode.inputs["clip"], json!(["4", 1]));
    assert_eq!(encode.inputs["text"], json!("a cat"));
  }

  #[test]
  fn test_node_without_widget_inputs_gets_no_widget_values() {
    let prompt = graph_to_prompt(&sample_graph());
    // The checkpoint loader declares no widget inputs in this graph
    assert!(prompt.get("4").unwrap().inputs.is_empty());
  }

  #[test]
  fn test_dangling_link_leaves_input_unset() {
    let prompt = graph_to_prompt(&sample_graph());
    assert!(!prompt.get("9").unwrap().inputs.contains_key("images"));
  }

  #[test]
  fn test_keyed_widget_values_match_inputs_by_name() {
    let document = json!({
      "nodes": [
        {
          "id": 12,
          "type": "VHS_VideoCombine",
          "inputs": [
            { "name": "images", "type": "IMAGE", "link": 5 },
            { "name": "frame_rate", "type": "FLOAT", "widget": { "name": "frame_rate" } },
            { "name": "format", "type": "COMBO", "widget": { "name": "format" } }
          ],
          "widgets_values": {
            "frame_rate": 16,
            "format": "video/h264-mp4",
            "videopreview": { "hidden": false }
          }
        },
        { "id": 8, "type": "VAEDecode", "inputs": [] }
      ],
      "links": [[5, 8, 0, 12, 0, "IMAGE"]]
    });

    let prompt = load_prompt(document).unwrap();
    let combine = prompt.get("12").unwrap();

    assert_eq!(combine.inputs["images"], json!(["8", 0]));
    assert_eq!(combine.inputs["frame_rate"], json!(16));
    assert_eq!(combine.inputs["format"], json!("video/h264-mp4"));
    assert!(!combine.inputs.contains_key("videopreview"));
  }

  #[test]
  fn test_load_prompt_passes_api_format_through() {
    let prompt = load_prompt(json!({
      "3": { "class_type": "KSampler", "inputs": { "seed": 1 } }
    }))
    .unwrap();

    assert_eq!(prompt.get("3").unwrap().inputs["seed"], json!(1));
  }

  #[test]
  fn test_load_prompt_converts_ui_format() {
    let document = serde_json::to_value(sample_graph()).unwrap();
    let prompt = load_prompt(document).unwrap();
    assert_eq!(prompt.get("6").unwrap().inputs["text"], json!("a cat"));
  }
}
