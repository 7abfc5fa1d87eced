use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::WorkflowError;
use crate::link::{Link, LinkIndex};

/// A workflow as saved by the ComfyUI web UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<Value>,

  #[serde(default)]
  pub nodes: Vec<GraphNode>,

  #[serde(default)]
  pub links: Vec<Link>,

  /// Layout, groups, version info and anything else the UI stores.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl WorkflowGraph {
  /// Parse a UI-format workflow document.
  pub fn from_json(content: &str) -> Result<Self, WorkflowError> {
    Ok(serde_json::from_str(content)?)
  }

  /// Parse a UI-format workflow from an already decoded JSON value.
  pub fn from_value(value: Value) -> Result<Self, WorkflowError> {
    Ok(serde_json::from_value(value)?)
  }

  pub fn to_json_pretty(&self) -> Result<String, WorkflowError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Get a node by its numeric ID.
  pub fn node(&self, id: i64) -> Option<&GraphNode> {
    self.nodes.iter().find(|n| n.id == id)
  }

  pub fn node_mut(&mut self, id: i64) -> Option<&mut GraphNode> {
    self.nodes.iter_mut().find(|n| n.id == id)
  }

  /// Build the link lookup used to resolve node connections.
  pub fn link_index(&self) -> LinkIndex {
    LinkIndex::new(&self.links)
  }
}

/// A single node record in a UI-format workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
  pub id: i64,

  #[serde(rename = "type")]
  pub node_type: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,

  #[serde(default)]
  pub inputs: Vec<NodeInput>,

  #[serde(
    default,
    deserialize_with = "null_as_default",
    skip_serializing_if = "WidgetValues::is_empty_list"
  )]
  pub widgets_values: WidgetValues,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl GraphNode {
  /// Title shown in the UI, or `"{type}_{id}"` when the node has none.
  pub fn display_title(&self) -> String {
    match &self.title {
      Some(title) => title.clone(),
      None => format!("{}_{}", self.node_type, self.id),
    }
  }

  /// Inputs that are edited through a widget rather than a connection.
  pub fn widget_inputs(&self) -> impl Iterator<Item = &NodeInput> {
    self.inputs.iter().filter(|input| input.is_widget())
  }
}

/// User-editable values of a node.
///
/// Core nodes store them in widget order. Some custom nodes, such as the
/// VideoHelperSuite ones, save a name-keyed object instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WidgetValues {
  List(Vec<Value>),
  Map(Map<String, Value>),
}

impl Default for WidgetValues {
  fn default() -> Self {
    Self::List(Vec::new())
  }
}

impl From<Vec<Value>> for WidgetValues {
  fn from(values: Vec<Value>) -> Self {
    Self::List(values)
  }
}

impl WidgetValues {
  pub fn is_empty(&self) -> bool {
    match self {
      Self::List(values) => values.is_empty(),
      Self::Map(values) => values.is_empty(),
    }
  }

  fn is_empty_list(&self) -> bool {
    matches!(self, Self::List(values) if values.is_empty())
  }

  /// The positional values, `None` for the keyed shape.
  pub fn as_list(&self) -> Option<&[Value]> {
    match self {
      Self::List(values) => Some(values),
      Self::Map(_) => None,
    }
  }

  pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
    match self {
      Self::List(values) => Some(values),
      Self::Map(_) => None,
    }
  }

  pub fn to_value(&self) -> Value {
    match self {
      Self::List(values) => Value::Array(values.clone()),
      Self::Map(values) => Value::Object(values.clone()),
    }
  }

  /// Read either shape back from JSON; anything else is `None`.
  pub fn from_value(value: &Value) -> Option<Self> {
    match value {
      Value::Array(values) => Some(Self::List(values.clone())),
      Value::Object(values) => Some(Self::Map(values.clone())),
      _ => None,
    }
  }
}

fn null_as_default<'de, D>(deserializer: D) -> Result<WidgetValues, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<WidgetValues>::deserialize(deserializer)?.unwrap_or_default())
}

/// A declared input slot on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
  pub name: String,

  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub input_type: Option<Value>,

  /// ID of the incoming link, `null` when unconnected.
  #[serde(default)]
  pub link: Option<i64>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub widget: Option<WidgetRef>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl NodeInput {
  /// True when the input is backed by a widget and nothing is connected to it.
  pub fn is_widget(&self) -> bool {
    self.widget.is_some() && self.link.is_none()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetRef {
  pub name: String,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}
