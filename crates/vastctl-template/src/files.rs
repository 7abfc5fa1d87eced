use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

/// Default output name ComfyUI puts into fresh `LoadImage` nodes.
pub const PLACEHOLDER_IMAGE: &str = "ComfyUI_00100.png";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Local files a template refers to by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileReferences {
  pub images: BTreeSet<String>,
  pub texts: BTreeSet<String>,
}

/// Find image and text file names anywhere in a template, except under
/// `_internal`.
pub fn scan_file_references(template: &Value) -> FileReferences {
  let mut refs = FileReferences::default();

  match template {
    Value::Object(map) => {
      for (key, value) in map {
        if key != "_internal" {
          scan_value(value, &mut refs);
        }
      }
    }
    other => scan_value(other, &mut refs),
  }

  refs
}

fn scan_value(value: &Value, refs: &mut FileReferences) {
  match value {
    Value::String(s) => {
      let extension = s.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
      match extension.as_deref() {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => {
          if s != PLACEHOLDER_IMAGE {
            refs.images.insert(s.clone());
          }
        }
        Some("txt") => {
          refs.texts.insert(s.clone());
        }
        _ => {}
      }
    }
    Value::Array(items) => items.iter().for_each(|item| scan_value(item, refs)),
    Value::Object(map) => map.values().for_each(|item| scan_value(item, refs)),
    _ => {}
  }
}

/// Replace string values naming a loaded `.txt` file with its contents.
pub fn substitute_text(value: &Value, contents: &HashMap<String, String>) -> Value {
  match value {
    Value::String(s) if s.ends_with(".txt") => match contents.get(s) {
      Some(text) => Value::String(text.clone()),
      None => value.clone(),
    },
    Value::Array(items) => Value::Array(
      items
        .iter()
        .map(|item| substitute_text(item, contents))
        .collect(),
    ),
    Value::Object(map) => Value::Object(
      map
        .iter()
        .map(|(k, v)| (k.clone(), substitute_text(v, contents)))
        .collect(),
    ),
    other => other.clone(),
  }
}
