use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Image the ComfyUI instances boot from.
pub const COMFY_IMAGE: &str = "vastai/comfy:@vastai-automatic-tag";

/// Where bare provisioning script names are fetched from.
pub const DEFAULT_PROVISIONING_BASE: &str =
  "https://raw.githubusercontent.com/jiso007/vastai/refs/heads/main/TEMPLATES/provisioning_scripts/";

const PORTAL_CONFIG: &str = "localhost:1111:11111:/:Instance Portal|localhost:8188:18188:/:ComfyUI|localhost:8080:18080:/:Jupyter|localhost:8080:8080:/terminals/1:Jupyter Terminal|localhost:8384:18384:/:Syncthing";

const COMFYUI_ARGS: &str =
  "--disable-auto-launch --port 8188 --listen 0.0.0.0 --enable-cors-header --use-sage-attention";

/// Target state for a stop or start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
  Running,
  Stopped,
}

impl InstanceState {
  /// Whether an instance reporting `actual_status` is already in this state.
  pub fn is_reached_by(&self, actual_status: &str) -> bool {
    match self {
      Self::Running => actual_status == "running",
      Self::Stopped => matches!(actual_status, "stopped" | "exited"),
    }
  }
}

impl fmt::Display for InstanceState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Running => f.write_str("running"),
      Self::Stopped => f.write_str("stopped"),
    }
  }
}

/// Body of a `PUT /asks/{offer_id}/` rental request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateInstanceRequest {
  pub image: String,
  /// Disk in GB.
  pub disk: u32,
  pub env: BTreeMap<String, String>,
  pub runtype: String,
  pub onstart: String,
  pub docker_options: String,
}

impl CreateInstanceRequest {
  /// A ComfyUI instance with the portal, Jupyter and Syncthing exposed,
  /// provisioned by `provisioning_script`.
  ///
  /// A script given as a bare file name is resolved against
  /// [`DEFAULT_PROVISIONING_BASE`].
  pub fn comfy(provisioning_script: &str) -> Self {
    let script_url = if provisioning_script.contains("://") {
      provisioning_script.to_string()
    } else {
      format!("{}{}", DEFAULT_PROVISIONING_BASE, provisioning_script)
    };

    let env = [
      ("OPEN_BUTTON_PORT", "1111"),
      ("OPEN_BUTTON_TOKEN", "1"),
      ("JUPYTER_DIR", "/"),
      ("DATA_DIRECTORY", "/workspace/"),
      ("PORTAL_CONFIG", PORTAL_CONFIG),
      ("PROVISIONING_SCRIPT", script_url.as_str()),
      ("COMFYUI_ARGS", COMFYUI_ARGS),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect();

    Self {
      image: COMFY_IMAGE.to_string(),
      disk: 100,
      env,
      runtype: "jupyter".to_string(),
      onstart: "entrypoint.sh".to_string(),
      docker_options: "-p 1111:1111 -p 8080:8080 -p 8188:8188".to_string(),
    }
  }

  pub fn with_disk(mut self, disk: u32) -> Self {
    self.disk = disk;
    self
  }
}

/// Response to a rental request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedInstance {
  #[serde(default)]
  pub success: Option<bool>,

  /// ID of the new instance.
  #[serde(default)]
  pub new_contract: Option<Value>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl CreatedInstance {
  pub fn instance_id(&self) -> Option<String> {
    match self.new_contract.as_ref()? {
      Value::String(id) => Some(id.clone()),
      Value::Null => None,
      other => Some(other.to_string()),
    }
  }
}
