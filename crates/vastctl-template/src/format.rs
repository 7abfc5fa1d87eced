use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::clean::{CleanedWorkflow, Configurable, WorkflowInfo, clean_workflow};
use crate::error::TemplateError;

const DEFAULT_GPU_NAME: &str = "RTX 5090";

/// Level of detail of a generated template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateFormat {
  Minimal,
  Detailed,
  #[default]
  UserFriendly,
}

impl FromStr for TemplateFormat {
  type Err = TemplateError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "minimal" => Ok(Self::Minimal),
      "detailed" => Ok(Self::Detailed),
      "user_friendly" | "user-friendly" => Ok(Self::UserFriendly),
      other => Err(TemplateError::UnknownFormat(other.to_string())),
    }
  }
}

impl fmt::Display for TemplateFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Minimal => "minimal",
      Self::Detailed => "detailed",
      Self::UserFriendly => "user_friendly",
    };
    f.write_str(name)
  }
}

/// Settings used when creating an instance for a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
  pub gpu_name: String,
  pub gpu_index: u32,
  pub provisioning_script: String,
  pub note: String,
}

impl InstanceConfig {
  pub fn for_workflow(workflow_name: &str) -> Self {
    Self {
      gpu_name: DEFAULT_GPU_NAME.to_string(),
      gpu_index: 0,
      provisioning_script: format!("{}.sh", workflow_name),
      note: "Instance creation settings - used when creating new instances for this workflow"
        .to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInstance {
  pub node_id: i64,
  pub title: String,
  pub parameters: Configurable,
}

/// Configurable nodes grouped by node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedTemplate {
  pub workflow_info: WorkflowInfo,
  pub instance_config: InstanceConfig,
  pub configurable_parameters: BTreeMap<String, BTreeMap<String, NodeInstance>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workflow_links: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGroup {
  pub node_type: String,
  pub node_id: i64,
  pub title: String,
  /// The node's widget values, a list or a keyed object.
  pub values: Value,
  pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalSection {
  pub original_structure: DetailedTemplate,
  pub note: String,
}

/// The flat template an operator edits by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTemplate {
  pub workflow_name: String,
  pub description: String,
  pub instance_config: InstanceConfig,
  pub parameters: BTreeMap<String, ParameterGroup>,
  #[serde(rename = "_internal")]
  pub internal: InternalSection,
}

impl UserTemplate {
  /// Distinct node types among the template's parameters.
  pub fn node_types(&self) -> BTreeSet<&str> {
    self
      .parameters
      .values()
      .map(|p| p.node_type.as_str())
      .collect()
  }
}

/// Group cleaned nodes by type under `"{id}_{title}"` keys.
///
/// Nodes whose ID is not an integer cannot be matched back onto a graph
/// and are left out.
pub fn format_detailed(cleaned: &CleanedWorkflow) -> DetailedTemplate {
  let mut configurable_parameters: BTreeMap<String, BTreeMap<String, NodeInstance>> =
    BTreeMap::new();

  for (node_id, node) in &cleaned.nodes {
    let Ok(numeric_id) = node_id.parse::<i64>() else {
      warn!(node_id = %node_id, "skipping node with non-numeric id");
      continue;
    };

    let instance_key = format!("{}_{}", node_id, node.title).replace(' ', "_");
    configurable_parameters
      .entry(node.node_type.clone())
      .or_default()
      .insert(
        instance_key,
        NodeInstance {
          node_id: numeric_id,
          title: node.title.clone(),
          parameters: node.configurable.clone(),
        },
      );
  }

  DetailedTemplate {
    workflow_info: cleaned.workflow_info.clone(),
    instance_config: InstanceConfig::for_workflow(&cleaned.workflow_info.name),
    configurable_parameters,
    workflow_links: cleaned.links.clone(),
  }
}

/// Flatten a detailed template into one entry per node.
pub fn user_friendly(detailed: &DetailedTemplate) -> UserTemplate {
  let workflow_name = detailed.workflow_info.name.clone();
  let mut parameters = BTreeMap::new();

  for (node_type, instances) in &detailed.configurable_parameters {
    for (instance_key, instance) in instances {
      if instance.parameters.is_empty() {
        continue;
      }

      parameters.insert(
        instance_key.clone(),
        ParameterGroup {
          node_type: node_type.clone(),
          node_id: instance.node_id,
          title: instance.title.clone(),
          values: instance
            .parameters
            .widgets_values
            .clone()
            .unwrap_or_else(|| Value::Array(Vec::new())),
          note: format!("Configurable parameters for {}", node_type),
        },
      );
    }
  }

  UserTemplate {
    instance_config: InstanceConfig::for_workflow(&workflow_name),
    workflow_name,
    description: "Edit the values below, then run it with `vastctl run-config`".to_string(),
    parameters,
    internal: InternalSection {
      original_structure: detailed.clone(),
      note: "This section is used internally for workflow reconstruction".to_string(),
    },
  }
}

/// Build a template of the requested format from a raw workflow document.
pub fn analyze(
  document: &Value,
  workflow_name: &str,
  format: TemplateFormat,
) -> Result<Value, TemplateError> {
  let mut cleaned = clean_workflow(document);
  cleaned.workflow_info.name = workflow_name.to_string();

  let value = match format {
    TemplateFormat::Minimal => serde_json::to_value(&cleaned)?,
    TemplateFormat::Detailed => serde_json::to_value(format_detailed(&cleaned))?,
    TemplateFormat::UserFriendly => {
      serde_json::to_value(user_friendly(&format_detailed(&cleaned)))?
    }
  };

  Ok(value)
}
