use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
  pub id: Option<Value>,
  pub name: String,
  pub description: String,
}

/// The user-editable part of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configurable {
  /// Copied as saved, positional list or keyed object.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub widgets_values: Option<Value>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_widgets: Option<BTreeMap<String, InputWidget>>,
}

impl Configurable {
  pub fn is_empty(&self) -> bool {
    self.widgets_values.is_none() && self.input_widgets.is_none()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputWidget {
  #[serde(rename = "type")]
  pub input_type: Value,

  /// Always `null`; the value lives in `widgets_values`.
  pub current_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedNode {
  #[serde(rename = "type")]
  pub node_type: String,
  pub title: String,
  pub configurable: Configurable,
}

/// A workflow stripped down to its configurable nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedWorkflow {
  pub workflow_info: WorkflowInfo,
  pub nodes: BTreeMap<String, CleanedNode>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub links: Option<Value>,
}

/// Strip UI clutter from a raw workflow document.
///
/// Works on any workflow shape: missing keys are treated as empty and nodes
/// without configurable values are dropped. The workflow name is left blank
/// for the caller to fill in.
pub fn clean_workflow(document: &Value) -> CleanedWorkflow {
  let mut nodes = BTreeMap::new();

  for node in array_at(document, "nodes") {
    let node_id = id_key(node.get("id").unwrap_or(&Value::Null));
    let node_type = node
      .get("type")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string();
    let title = match node.get("title").and_then(Value::as_str) {
      Some(title) => title.to_string(),
      None => format!("{}_{}", node_type, node_id),
    };

    let configurable = extract_configurable(node);
    if configurable.is_empty() {
      continue;
    }

    nodes.insert(
      node_id,
      CleanedNode {
        node_type,
        title,
        configurable,
      },
    );
  }

  CleanedWorkflow {
    workflow_info: WorkflowInfo {
      id: document.get("id").cloned(),
      name: String::new(),
      description: "Auto-generated configuration template".to_string(),
    },
    nodes,
    links: document.get("links").cloned(),
  }
}

fn extract_configurable(node: &Value) -> Configurable {
  let widgets_values = node
    .get("widgets_values")
    .filter(|value| has_content(value))
    .cloned();

  let mut input_widgets = BTreeMap::new();
  for input in array_at(node, "inputs") {
    let Some(widget_name) = input
      .get("widget")
      .and_then(|w| w.get("name"))
      .and_then(Value::as_str)
    else {
      continue;
    };

    input_widgets.insert(
      widget_name.to_string(),
      InputWidget {
        input_type: input.get("type").cloned().unwrap_or(Value::Null),
        current_value: Value::Null,
      },
    );
  }

  Configurable {
    widgets_values,
    input_widgets: (!input_widgets.is_empty()).then_some(input_widgets),
  }
}

fn has_content(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Array(values) => !values.is_empty(),
    Value::Object(values) => !values.is_empty(),
    Value::String(s) => !s.is_empty(),
    _ => true,
  }
}

fn array_at<'a>(value: &'a Value, key: &str) -> &'a [Value] {
  value
    .get(key)
    .and_then(Value::as_array)
    .map(Vec::as_slice)
    .unwrap_or(&[])
}

/// Node IDs become map keys: strings as-is, anything else by its JSON text.
fn id_key(id: &Value) -> String {
  match id {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}
