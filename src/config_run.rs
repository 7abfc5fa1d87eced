use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::info;
use vastctl_prompt::graph_to_prompt;
use vastctl_template::{
  ApplyReport, apply_template, scan_file_references, substitute_text, template_workflow_name,
};
use vastctl_workflow::{ApiPrompt, WorkflowGraph};

/// A config template resolved against the local templates directory, ready
/// to be sent to an instance.
#[derive(Debug)]
pub struct PreparedRun {
  pub workflow_name: String,
  pub applied: ApplyReport,
  /// `(file name, local path)` for every image the config refers to.
  pub images: Vec<(String, PathBuf)>,
  pub texts: Vec<String>,
  pub prompt: ApiPrompt,
}

/// Use `config_file` as given if it exists, otherwise look in
/// `<templates>/configs`.
pub fn resolve_config_path(config_file: &Path, templates_dir: &Path) -> PathBuf {
  if config_file.exists() {
    return config_file.to_path_buf();
  }
  templates_dir.join("configs").join(config_file)
}

fn read_json(path: &Path) -> Result<Value> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load a config, check its referenced files exist, substitute text files
/// and apply it to its workflow.
///
/// Images are looked up in `<templates>/images`, text files in
/// `<templates>/prompts` and the workflow in
/// `<templates>/workflows/<workflow_name>.json`.
pub fn prepare(config_path: &Path, templates_dir: &Path) -> Result<PreparedRun> {
  let config = read_json(config_path)?;
  let workflow_name = template_workflow_name(&config)
    .context("no workflow_name found in config")?
    .to_string();

  let refs = scan_file_references(&config);

  let images_dir = templates_dir.join("images");
  let missing: Vec<&str> = refs
    .images
    .iter()
    .filter(|name| !images_dir.join(name).is_file())
    .map(String::as_str)
    .collect();
  if !missing.is_empty() {
    bail!(
      "missing image file(s) in {}: {}",
      images_dir.display(),
      missing.join(", ")
    );
  }

  let prompts_dir = templates_dir.join("prompts");
  let mut texts = HashMap::new();
  let mut missing = Vec::new();
  for name in &refs.texts {
    match std::fs::read_to_string(prompts_dir.join(name)) {
      Ok(content) => {
        texts.insert(name.clone(), content.trim().to_string());
      }
      Err(_) => missing.push(name.as_str()),
    }
  }
  if !missing.is_empty() {
    bail!(
      "missing text file(s) in {}: {}",
      prompts_dir.display(),
      missing.join(", ")
    );
  }

  let config = substitute_text(&config, &texts);

  let workflow_path = templates_dir
    .join("workflows")
    .join(format!("{}.json", workflow_name));
  let mut graph = WorkflowGraph::from_value(read_json(&workflow_path)?)
    .with_context(|| format!("invalid workflow {}", workflow_path.display()))?;

  let applied = apply_template(&mut graph, &config);
  info!(
    changed = applied.changed.len(),
    missing = applied.missing.len(),
    "applied configuration"
  );

  Ok(PreparedRun {
    prompt: graph_to_prompt(&graph),
    workflow_name,
    applied,
    images: refs
      .images
      .iter()
      .map(|name| (name.clone(), images_dir.join(name)))
      .collect(),
    texts: refs.texts.into_iter().collect(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn templates() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for sub in ["configs", "images", "prompts", "workflows"] {
      std::fs::create_dir(dir.path().join(sub)).unwrap();
    }

    let workflow = json!({
      "nodes": [
        {"id": 6, "type": "CLIPTextEncode",
          "inputs": [{"name": "text", "type": "STRING", "widget": {"name": "text"}}],
          "widgets_values": ["old prompt"]},
        {"id": 62, "type": "LoadImage",
          "inputs": [{"name": "image", "type": "COMBO", "widget": {"name": "image"}}],
          "widgets_values": ["ComfyUI_00100.png", "image"]}
      ],
      "links": []
    });
    std::fs::write(dir.path().join("workflows/wan2.json"), workflow.to_string()).unwrap();
    std::fs::write(dir.path().join("images/fox.png"), b"png").unwrap();
    std::fs::write(dir.path().join("prompts/fox.txt"), "a fox in snow\n").unwrap();
    dir
  }

  fn write_config(dir: &Path, config: Value) -> PathBuf {
    let path = dir.join("configs/wan2-user_friendly.json");
    std::fs::write(&path, config.to_string()).unwrap();
    path
  }

  #[test]
  fn test_prepare_applies_config_with_text_and_images() {
    let dir = templates();
    let config = write_config(
      dir.path(),
      json!({
        "workflow_name": "wan2",
        "parameters": {
          "6_CLIPTextEncode_6": {"node_id": 6, "values": ["fox.txt"]},
          "62_LoadImage_62": {"node_id": 62, "values": ["fox.png", "image"]}
        },
        "_internal": {"values": ["ignored.png"]}
      }),
    );

    let run = prepare(&config, dir.path()).unwrap();

    assert_eq!(run.workflow_name, "wan2");
    assert_eq!(run.applied.changed.len(), 2);
    assert_eq!(run.images, vec![("fox.png".to_string(), dir.path().join("images/fox.png"))]);
    assert_eq!(run.texts, vec!["fox.txt".to_string()]);
    assert_eq!(run.prompt.get("6").unwrap().inputs["text"], json!("a fox in snow"));
    assert_eq!(run.prompt.get("62").unwrap().inputs["image"], json!("fox.png"));
  }

  #[test]
  fn test_prepare_reports_missing_images() {
    let dir = templates();
    let config = write_config(
      dir.path(),
      json!({
        "workflow_name": "wan2",
        "parameters": {"62_LoadImage_62": {"node_id": 62, "values": ["absent.jpg"]}}
      }),
    );

    let err = prepare(&config, dir.path()).unwrap_err();
    assert!(err.to_string().contains("absent.jpg"));
  }

  #[test]
  fn test_prepare_requires_workflow_name() {
    let dir = templates();
    let config = write_config(dir.path(), json!({"parameters": {}}));

    let err = prepare(&config, dir.path()).unwrap_err();
    assert!(err.to_string().contains("workflow_name"));
  }

  #[test]
  fn test_resolve_config_path_falls_back_to_configs_dir() {
    let dir = templates();
    let resolved = resolve_config_path(Path::new("wan2-user_friendly.json"), dir.path());
    assert_eq!(resolved, dir.path().join("configs/wan2-user_friendly.json"));
  }
}
