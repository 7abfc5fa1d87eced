use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WorkflowError;

/// A workflow in the shape accepted by ComfyUI's `/prompt` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiPrompt {
  pub nodes: BTreeMap<String, ApiNode>,
}

/// One node of an API prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiNode {
  pub class_type: String,

  /// Named inputs. Connections are encoded as `[source_node_id, slot]`.
  #[serde(default)]
  pub inputs: Map<String, Value>,

  /// `_meta` and similar keys returned by the history endpoint.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl ApiNode {
  pub fn new(class_type: impl Into<String>) -> Self {
    Self {
      class_type: class_type.into(),
      inputs: Map::new(),
      extra: Map::new(),
    }
  }
}

impl ApiPrompt {
  pub fn from_value(value: Value) -> Result<Self, WorkflowError> {
    Ok(serde_json::from_value(value)?)
  }

  pub fn get(&self, node_id: &str) -> Option<&ApiNode> {
    self.nodes.get(node_id)
  }

  pub fn get_mut(&mut self, node_id: &str) -> Option<&mut ApiNode> {
    self.nodes.get_mut(node_id)
  }

  pub fn insert(&mut self, node_id: impl Into<String>, node: ApiNode) {
    self.nodes.insert(node_id.into(), node);
  }

  pub fn node_ids(&self) -> Vec<String> {
    self.nodes.keys().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
