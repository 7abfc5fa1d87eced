use std::fmt;

/// Coarse reason an SSH connection attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SshFailure {
  /// sshd is not accepting connections yet.
  NotReady,
  /// The key was rejected.
  AuthFailed,
  /// The connection or banner exchange timed out.
  Timeout,
  Other,
}

impl fmt::Display for SshFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Self::NotReady => "not ready",
      Self::AuthFailed => "authentication failed",
      Self::Timeout => "timeout",
      Self::Other => "error",
    };
    f.write_str(text)
  }
}

/// Sort ssh client stderr into a [`SshFailure`]. First matching rule wins.
pub fn classify_ssh_failure(stderr: &str) -> SshFailure {
  let stderr = stderr.to_lowercase();
  let has = |needles: &[&str]| needles.iter().any(|n| stderr.contains(n));

  if has(&["connection refused", "no route to host"]) {
    SshFailure::NotReady
  } else if has(&["permission denied", "publickey"]) {
    SshFailure::AuthFailed
  } else if has(&["timeout", "timed out", "banner exchange"]) {
    SshFailure::Timeout
  } else {
    SshFailure::Other
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_classify_not_ready() {
    assert_eq!(
      classify_ssh_failure("ssh: connect to host 1.2.3.4 port 22: Connection refused"),
      SshFailure::NotReady
    );
    assert_eq!(
      classify_ssh_failure("connect to host x: No route to host"),
      SshFailure::NotReady
    );
  }

  #[test]
  fn test_classify_auth() {
    assert_eq!(
      classify_ssh_failure("root@1.2.3.4: Permission denied (publickey)."),
      SshFailure::AuthFailed
    );
  }

  #[test]
  fn test_classify_timeout() {
    assert_eq!(
      classify_ssh_failure("Connection timed out during banner exchange"),
      SshFailure::Timeout
    );
    assert_eq!(
      classify_ssh_failure("ssh: connect to host h port 2: Operation timed out"),
      SshFailure::Timeout
    );
  }

  #[test]
  fn test_classify_first_rule_wins() {
    // Refused wins over the timeout wording further down
    assert_eq!(
      classify_ssh_failure("Connection refused\nthen timed out"),
      SshFailure::NotReady
    );
  }

  #[test]
  fn test_classify_other() {
    assert_eq!(classify_ssh_failure("kex_exchange_identification"), SshFailure::Other);
    assert_eq!(classify_ssh_failure(""), SshFailure::Other);
  }
}
