use serde_json::{Map, Value};
use tracing::warn;
use vastctl_workflow::NodeInput;

/// Map a node's positional widget values onto its named widget inputs.
///
/// Only inputs that declare a widget and have no incoming link take part.
/// When there are no more values than inputs the mapping is by index.
/// When the value list is longer, some values are UI-only extras (for
/// example the "control after generate" choice that follows a seed), so the
/// walk skips one value whenever the value under the cursor looks wrong for
/// the input it would be assigned to.
pub fn map_widget_values(
  node_type: &str,
  widget_values: &[Value],
  inputs: &[NodeInput],
) -> Map<String, Value> {
  let widget_inputs: Vec<&NodeInput> = inputs.iter().filter(|i| i.is_widget()).collect();
  let mut mapped = Map::new();

  if widget_values.len() <= widget_inputs.len() {
    for (input, value) in widget_inputs.iter().zip(widget_values) {
      mapped.insert(input.name.clone(), value.clone());
    }
    return mapped;
  }

  let input_names: Vec<&str> = widget_inputs.iter().map(|i| i.name.as_str()).collect();
  warn!(
    node_type,
    value_count = widget_values.len(),
    input_count = widget_inputs.len(),
    values = ?widget_values,
    inputs = ?input_names,
    "more widget values than widget inputs, guessing alignment"
  );

  let mut cursor = 0;
  for input in widget_inputs {
    if cursor >= widget_values.len() {
      break;
    }

    let mut value = &widget_values[cursor];
    if value_looks_wrong(&input.name, value) {
      cursor += 1;
      if cursor < widget_values.len() {
        value = &widget_values[cursor];
      }
    }

    mapped.insert(input.name.clone(), value.clone());
    cursor += 1;
  }

  mapped
}

/// Known cases where a UI-only value sits where a real input is expected.
fn value_looks_wrong(input_name: &str, value: &Value) -> bool {
  match input_name {
    "steps" => matches!(value.as_str(), Some("randomize" | "fixed")),
    "start_at_step" => matches!(value.as_str(), Some("beta" | "euler" | "simple")),
    "sampler_name" => value.is_number(),
    "return_with_leftover_noise" => value.as_f64().is_some_and(|n| n > 1.0),
    _ => false,
  }
}
