use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use vastctl_workflow::{WidgetValues, WorkflowGraph};

use crate::error::TemplateError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeChange {
  pub node_id: i64,
  pub node_type: String,
  pub old: WidgetValues,
  pub new: WidgetValues,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
  pub changed: Vec<NodeChange>,
  pub missing: Vec<i64>,
}

/// Name of the workflow an edited template was generated from.
pub fn template_workflow_name(template: &Value) -> Result<&str, TemplateError> {
  template
    .get("workflow_name")
    .and_then(Value::as_str)
    .filter(|name| !name.is_empty())
    .ok_or(TemplateError::MissingField("workflow_name"))
}

/// Copy edited template values back onto a workflow graph.
///
/// `template` is an edited user-friendly template. Entries without a
/// `node_id` or with no `values` are ignored, and a node's widget values are
/// only replaced when they actually differ. `values` may be a list or, for
/// nodes that save keyed widgets, an object.
pub fn apply_template(graph: &mut WorkflowGraph, template: &Value) -> ApplyReport {
  let mut report = ApplyReport::default();

  let Some(parameters) = template.get("parameters").and_then(Value::as_object) else {
    return report;
  };

  for entry in parameters.values() {
    let node_id = entry.get("node_id").and_then(Value::as_i64).unwrap_or(0);
    let values = entry
      .get("values")
      .and_then(WidgetValues::from_value)
      .unwrap_or_default();

    if node_id == 0 || values.is_empty() {
      continue;
    }

    let Some(node) = graph.node_mut(node_id) else {
      warn!(node_id, "template node not found in workflow");
      report.missing.push(node_id);
      continue;
    };

    if node.widgets_values == values {
      continue;
    }

    info!(
      node_id,
      node_type = %node.node_type,
      old = ?node.widgets_values,
      new = ?values,
      "applying template values"
    );

    let old = std::mem::replace(&mut node.widgets_values, values.clone());
    report.changed.push(NodeChange {
      node_id,
      node_type: node.node_type.clone(),
      old,
      new: values,
    });
  }

  report
}
