use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SshUnavailable;

/// Container port ComfyUI listens on.
pub const COMFY_PORT: u64 = 8188;

/// Container port Jupyter listens on.
pub const JUPYTER_PORT: u64 = 8080;

const URL_FIELDS: &[&str] = &["url", "tunnel_url", "web_url", "portal_url", "public_url"];

/// One entry of the `/instances/` listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
  pub id: Value,
  #[serde(default)]
  pub actual_status: Option<String>,
  #[serde(default)]
  pub ssh_host: Option<String>,
  #[serde(default)]
  pub ssh_port: Option<u16>,
  #[serde(default)]
  pub public_ipaddr: Option<String>,
  #[serde(default)]
  pub label: Option<String>,
  #[serde(default)]
  pub ports: Option<Value>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshEndpoint {
  pub host: String,
  pub port: u16,
}

impl Instance {
  /// The id as the API user sees it, whether it came as a number or string.
  pub fn id_string(&self) -> String {
    match &self.id {
      Value::String(s) => s.clone(),
      other => other.to_string(),
    }
  }

  pub fn status(&self) -> &str {
    self.actual_status.as_deref().unwrap_or("unknown")
  }

  pub fn is_running(&self) -> bool {
    self.status() == "running"
  }

  /// SSH host and port, with `port_offset` added to the reported port.
  pub fn ssh_endpoint(&self, port_offset: u16) -> Result<SshEndpoint, SshUnavailable> {
    if !self.is_running() {
      return Err(SshUnavailable::NotRunning(self.status().to_string()));
    }

    let (Some(host), Some(port)) = (self.ssh_host.as_deref(), self.ssh_port) else {
      return Err(SshUnavailable::MissingSshInfo);
    };
    if host.is_empty() {
      return Err(SshUnavailable::MissingSshInfo);
    }

    let port = port
      .checked_add(port_offset)
      .ok_or(SshUnavailable::PortOverflow {
        port,
        offset: port_offset,
      })?;

    Ok(SshEndpoint {
      host: host.to_string(),
      port,
    })
  }

  /// Services reachable on a mapped public port, keyed by name.
  pub fn direct_portal_urls(&self) -> BTreeMap<String, String> {
    let mut urls = BTreeMap::new();

    let host = self
      .public_ipaddr
      .as_deref()
      .map(str::trim)
      .filter(|ip| !ip.is_empty())
      .or(self.ssh_host.as_deref());
    let Some(host) = host else {
      return urls;
    };
    let Some(mappings) = self.ports.as_ref().and_then(Value::as_array) else {
      return urls;
    };

    for mapping in mappings.iter().filter_map(Value::as_object) {
      let internal = port_field(mapping, "PrivatePort", "internal_port");
      let external = port_field(mapping, "PublicPort", "external_port");

      let service = match internal {
        Some(COMFY_PORT) => "ComfyUI",
        Some(JUPYTER_PORT) => "Jupyter",
        _ => continue,
      };
      if let Some(external) = external {
        urls.insert(service.to_string(), format!("http://{}:{}", host, external));
      }
    }

    urls
  }

  /// Any URL-looking fields the API returned for the instance.
  pub fn url_fields(&self) -> Vec<(&'static str, String)> {
    URL_FIELDS
      .iter()
      .filter_map(|&field| match self.extra.get(field) {
        Some(Value::String(url)) if !url.is_empty() => Some((field, url.clone())),
        _ => None,
      })
      .collect()
  }
}

/// Ports show up as numbers or numeric strings depending on the endpoint.
fn port_field(mapping: &Map<String, Value>, primary: &str, fallback: &str) -> Option<u64> {
  let parse = |value: &Value| match value {
    Value::Number(n) => n.as_u64(),
    Value::String(s) => s.parse().ok(),
    _ => None,
  };

  mapping
    .get(primary)
    .and_then(parse)
    .filter(|port| *port != 0)
    .or_else(|| mapping.get(fallback).and_then(parse))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn parse(value: Value) -> Instance {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_ssh_endpoint_applies_offset() {
    let instance = parse(json!({
      "id": 123, "actual_status": "running", "ssh_host": "ssh5.vast.ai", "ssh_port": 22000
    }));

    assert_eq!(
      instance.ssh_endpoint(1).unwrap(),
      SshEndpoint {
        host: "ssh5.vast.ai".to_string(),
        port: 22001
      }
    );
    assert_eq!(instance.ssh_endpoint(0).unwrap().port, 22000);
  }

  #[test]
  fn test_ssh_endpoint_requires_running() {
    let instance = parse(json!({
      "id": 1, "actual_status": "loading", "ssh_host": "h", "ssh_port": 2
    }));
    assert_eq!(
      instance.ssh_endpoint(1),
      Err(SshUnavailable::NotRunning("loading".to_string()))
    );

    let no_status = parse(json!({ "id": 1 }));
    assert_eq!(
      no_status.ssh_endpoint(0),
      Err(SshUnavailable::NotRunning("unknown".to_string()))
    );
  }

  #[test]
  fn test_ssh_endpoint_requires_host_and_port() {
    let instance = parse(json!({ "id": 1, "actual_status": "running", "ssh_host": "h" }));
    assert_eq!(instance.ssh_endpoint(1), Err(SshUnavailable::MissingSshInfo));
  }

  #[test]
  fn test_ssh_endpoint_port_overflow() {
    let instance = parse(json!({
      "id": 1, "actual_status": "running", "ssh_host": "h", "ssh_port": 65535
    }));
    assert!(matches!(
      instance.ssh_endpoint(1),
      Err(SshUnavailable::PortOverflow { .. })
    ));
  }

  #[test]
  fn test_direct_portal_urls() {
    let instance = parse(json!({
      "id": 7,
      "actual_status": "running",
      "ssh_host": "ssh1.vast.ai",
      "public_ipaddr": "203.0.113.9\n",
      "ports": [
        { "PrivatePort": 8188, "PublicPort": 40188 },
        { "internal_port": "8080", "external_port": "40080" },
        { "PrivatePort": 22, "PublicPort": 40022 },
        "not a mapping"
      ]
    }));

    let urls = instance.direct_portal_urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls["ComfyUI"], "http://203.0.113.9:40188");
    assert_eq!(urls["Jupyter"], "http://203.0.113.9:40080");
  }

  #[test]
  fn test_portal_urls_fall_back_to_ssh_host() {
    let instance = parse(json!({
      "id": 7,
      "ssh_host": "ssh1.vast.ai",
      "ports": [{ "PrivatePort": 8188, "PublicPort": 1234 }, { "PrivatePort": 8080 }]
    }));

    let urls = instance.direct_portal_urls();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls["ComfyUI"], "http://ssh1.vast.ai:1234");
  }

  #[test]
  fn test_portal_urls_without_ports() {
    let instance = parse(json!({ "id": 7, "ssh_host": "h" }));
    assert!(instance.direct_portal_urls().is_empty());
  }

  #[test]
  fn test_id_string_and_extra_fields() {
    let numeric = parse(json!({ "id": 26003629, "gpu_name": "RTX 5090", "tunnel_url": "https://x.trycloudflare.com" }));
    assert_eq!(numeric.id_string(), "26003629");
    assert_eq!(numeric.extra["gpu_name"], json!("RTX 5090"));
    assert_eq!(
      numeric.url_fields(),
      vec![("tunnel_url", "https://x.trycloudflare.com".to_string())]
    );

    let text = parse(json!({ "id": "abc" }));
    assert_eq!(text.id_string(), "abc");
  }
}
