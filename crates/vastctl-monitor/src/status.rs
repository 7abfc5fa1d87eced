use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use vastctl_remote::SshFailure;

/// Boot state of an instance, as reported by the status script or derived
/// from a failed SSH attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
  Ready,
  StartingApp,
  Downloading,
  Provisioning,
  Initializing,
  Error,
  SshError,
  SshNotReady,
  SshAuthError,
  ConnectionError,
  Unknown,
}

impl InstanceStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Ready => "READY",
      Self::StartingApp => "STARTING_APP",
      Self::Downloading => "DOWNLOADING",
      Self::Provisioning => "PROVISIONING",
      Self::Initializing => "INITIALIZING",
      Self::Error => "ERROR",
      Self::SshError => "SSH_ERROR",
      Self::SshNotReady => "SSH_NOT_READY",
      Self::SshAuthError => "SSH_AUTH_ERROR",
      Self::ConnectionError => "CONNECTION_ERROR",
      Self::Unknown => "UNKNOWN",
    }
  }

  pub fn glyph(&self) -> &'static str {
    match self {
      Self::Ready => "✅",
      Self::StartingApp => "🚀",
      Self::Downloading => "⬇️",
      Self::Provisioning => "⚙️",
      Self::Initializing => "🔄",
      Self::Error => "❌",
      Self::SshError => "🔑",
      Self::SshNotReady => "⏳",
      Self::SshAuthError => "🔐",
      Self::ConnectionError => "🌐",
      Self::Unknown => "❓",
    }
  }
}

impl fmt::Display for InstanceStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for InstanceStatus {
  type Err = std::convert::Infallible;

  /// Unrecognised tokens parse as [`InstanceStatus::Unknown`].
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let status = match s.trim() {
      "READY" => Self::Ready,
      "STARTING_APP" => Self::StartingApp,
      "DOWNLOADING" => Self::Downloading,
      "PROVISIONING" => Self::Provisioning,
      "INITIALIZING" => Self::Initializing,
      "ERROR" => Self::Error,
      "SSH_ERROR" => Self::SshError,
      "SSH_NOT_READY" => Self::SshNotReady,
      "SSH_AUTH_ERROR" => Self::SshAuthError,
      "CONNECTION_ERROR" => Self::ConnectionError,
      _ => Self::Unknown,
    };
    Ok(status)
  }
}

/// One round of status information about an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
  pub status: InstanceStatus,
  pub details: String,
  /// `(service, url)` pairs, one per service, in first-seen order.
  pub tunnel_urls: Vec<(String, String)>,
  pub last_log: Vec<String>,
  pub current_download: Vec<String>,
  pub error_details: Vec<String>,
}

impl Default for StatusReport {
  fn default() -> Self {
    Self {
      status: InstanceStatus::Unknown,
      details: String::new(),
      tunnel_urls: Vec::new(),
      last_log: Vec::new(),
      current_download: Vec::new(),
      error_details: Vec::new(),
    }
  }
}

#[derive(Clone, Copy)]
enum Section {
  TunnelUrls,
  LastLog,
  CurrentDownload,
  ErrorDetails,
}

/// Parse the status script's output.
pub fn parse_status_output(output: &str) -> StatusReport {
  let mut report = StatusReport::default();
  let mut section = None;

  for line in output.lines() {
    if let Some(status) = line.strip_prefix("STATUS:") {
      report.status = status.parse().unwrap_or(InstanceStatus::Unknown);
    } else if let Some(details) = line.strip_prefix("DETAILS:") {
      report.details = details.trim().to_string();
    } else if line.starts_with("TUNNEL_URLS:") {
      section = Some(Section::TunnelUrls);
    } else if line.starts_with("LAST_LOG:") {
      section = Some(Section::LastLog);
    } else if line.starts_with("CURRENT_DOWNLOAD:") {
      section = Some(Section::CurrentDownload);
    } else if line.starts_with("ERROR_DETAILS:") {
      section = Some(Section::ErrorDetails);
    } else if let Some(section) = section {
      match section {
        Section::TunnelUrls => {
          if let Some((service, url)) = line.split_once(": ") {
            report.set_tunnel_url(service, url);
          }
        }
        Section::LastLog => push_indented(&mut report.last_log, line),
        Section::CurrentDownload => push_indented(&mut report.current_download, line),
        Section::ErrorDetails => push_indented(&mut report.error_details, line),
      }
    }
  }

  report
}

fn push_indented(lines: &mut Vec<String>, line: &str) {
  if let Some(body) = line.strip_prefix("  ") {
    lines.push(body.to_string());
  }
}

impl StatusReport {
  /// Report for a round where the status script could not be run.
  pub fn from_ssh_failure(failure: SshFailure, detail: impl Into<String>) -> Self {
    let status = match failure {
      SshFailure::NotReady | SshFailure::Timeout => InstanceStatus::SshNotReady,
      SshFailure::AuthFailed => InstanceStatus::SshAuthError,
      SshFailure::Other => InstanceStatus::SshError,
    };

    Self {
      status,
      details: detail.into(),
      ..Default::default()
    }
  }

  pub fn with_status(status: InstanceStatus, detail: impl Into<String>) -> Self {
    Self {
      status,
      details: detail.into(),
      ..Default::default()
    }
  }

  /// Later lines for a service replace earlier ones; a restarted tunnel
  /// logs a fresh URL after the stale one.
  fn set_tunnel_url(&mut self, service: &str, url: &str) {
    match self.tunnel_urls.iter_mut().find(|(name, _)| name == service) {
      Some((_, existing)) => *existing = url.to_string(),
      None => self
        .tunnel_urls
        .push((service.to_string(), url.to_string())),
    }
  }

  pub fn tunnel_url(&self, service: &str) -> Option<&str> {
    self
      .tunnel_urls
      .iter()
      .find(|(name, _)| name == service)
      .map(|(_, url)| url.as_str())
  }

  /// Human-readable report for the terminal.
  pub fn render(&self, instance_id: &str) -> String {
    let mut out = format!(
      "{} Instance {} - Status: {}\n   {}\n",
      self.status.glyph(),
      instance_id,
      self.status,
      self.details
    );

    if self.status == InstanceStatus::Downloading && !self.current_download.is_empty() {
      out.push_str("\n📦 Current Download Progress:\n");
      for line in self.current_download.iter().filter(|l| !l.trim().is_empty()) {
        out.push_str(&format!("   {}\n", line));
      }
    }

    if !self.tunnel_urls.is_empty() {
      out.push_str("\n🌐 Portal URLs:\n");
      for (service, url) in &self.tunnel_urls {
        out.push_str(&format!("   {}: {}\n", service, url));
      }
    }

    let recent: Vec<&String> = self
      .last_log
      .iter()
      .skip(self.last_log.len().saturating_sub(3))
      .filter(|l| !l.trim().is_empty())
      .collect();
    if !recent.is_empty() {
      out.push_str("\n📝 Recent Activity:\n");
      for line in recent {
        out.push_str(&format!("   {}\n", line));
      }
    }

    if !self.error_details.is_empty() {
      out.push_str("\n⚠️ Error Details:\n");
      for line in &self.error_details {
        out.push_str(&format!("   {}\n", line));
      }
    }

    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const READY_OUTPUT: &str = "STATUS: READY
DETAILS: ComfyUI is fully loaded and running
TUNNEL_URLS:
ComfyUI: https://abc.trycloudflare.com
Portal: https://def.trycloudflare.com
LAST_LOG:
  Starting server
  To see the GUI go to: http://0.0.0.0:18188
";

  #[test]
  fn test_parse_ready_output() {
    let report = parse_status_output(READY_OUTPUT);

    assert_eq!(report.status, InstanceStatus::Ready);
    assert_eq!(report.details, "ComfyUI is fully loaded and running");
    assert_eq!(report.tunnel_url("ComfyUI"), Some("https://abc.trycloudflare.com"));
    assert_eq!(report.tunnel_urls.len(), 2);
    assert_eq!(
      report.last_log,
      vec!["Starting server", "To see the GUI go to: http://0.0.0.0:18188"]
    );
  }

  #[test]
  fn test_parse_download_and_error_sections() {
    let output = "STATUS: DOWNLOADING
DETAILS: Downloading models (2 completed)
CURRENT_DOWNLOAD:
  Using HF Transfer
  Speed: 80MB/s
not indented, dropped
ERROR_DETAILS:
  Traceback (most recent call last)
";
    let report = parse_status_output(output);

    assert_eq!(report.status, InstanceStatus::Downloading);
    assert_eq!(report.current_download, vec!["Using HF Transfer", "Speed: 80MB/s"]);
    assert_eq!(report.error_details, vec!["Traceback (most recent call last)"]);
    assert!(report.last_log.is_empty());
  }

  #[test]
  fn test_parse_unknown_status_token() {
    let report = parse_status_output("STATUS: SSH_KEY_ERROR\nDETAILS: nope");
    assert_eq!(report.status, InstanceStatus::Unknown);
  }

  #[test]
  fn test_parse_without_status_line() {
    let report = parse_status_output("bash: line 1: garbage");
    assert_eq!(report, StatusReport::default());
  }

  #[test]
  fn test_tunnel_url_lines_split_once() {
    let report = parse_status_output("STATUS: STARTING_APP\nTUNNEL_URLS:\nComfyUI: https://x.io/a: b\nnocolon\n");
    assert_eq!(
      report.tunnel_urls,
      vec![("ComfyUI".to_string(), "https://x.io/a: b".to_string())]
    );
  }

  #[test]
  fn test_restarted_tunnel_keeps_latest_url() {
    let report = parse_status_output(
      "STATUS: READY
TUNNEL_URLS:
ComfyUI: https://old.trycloudflare.com
Portal: https://portal.trycloudflare.com
ComfyUI: https://new.trycloudflare.com
",
    );

    assert_eq!(report.tunnel_url("ComfyUI"), Some("https://new.trycloudflare.com"));
    assert_eq!(
      report.tunnel_urls,
      vec![
        ("ComfyUI".to_string(), "https://new.trycloudflare.com".to_string()),
        ("Portal".to_string(), "https://portal.trycloudflare.com".to_string()),
      ]
    );

    let text = report.render("7");
    assert!(!text.contains("old.trycloudflare.com"));
  }

  #[test]
  fn test_status_tokens_round_trip_through_display() {
    for status in [
      InstanceStatus::Ready,
      InstanceStatus::StartingApp,
      InstanceStatus::SshAuthError,
      InstanceStatus::ConnectionError,
    ] {
      assert_eq!(status.to_string().parse::<InstanceStatus>().unwrap(), status);
    }
  }

  #[test]
  fn test_from_ssh_failure() {
    let cases = [
      (SshFailure::NotReady, InstanceStatus::SshNotReady),
      (SshFailure::Timeout, InstanceStatus::SshNotReady),
      (SshFailure::AuthFailed, InstanceStatus::SshAuthError),
      (SshFailure::Other, InstanceStatus::SshError),
    ];
    for (failure, expected) in cases {
      let report = StatusReport::from_ssh_failure(failure, "detail");
      assert_eq!(report.status, expected);
      assert_eq!(report.details, "detail");
    }
  }

  #[test]
  fn test_render_shows_last_three_log_lines() {
    let mut report = parse_status_output(READY_OUTPUT);
    report.last_log = vec!["1", "2", "3", "4"].into_iter().map(String::from).collect();

    let text = report.render("42");

    assert!(text.starts_with("✅ Instance 42 - Status: READY"));
    assert!(text.contains("🌐 Portal URLs:\n   ComfyUI: https://abc.trycloudflare.com"));
    assert!(!text.contains("   1\n"));
    assert!(text.contains("   2\n   3\n   4\n"));
  }
}
