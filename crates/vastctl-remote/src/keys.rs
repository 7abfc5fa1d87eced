use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::RemoteError;

/// Key file names tried in `~/.ssh`, in order.
pub const CANDIDATE_KEYS: &[&str] = &["id_ed25519_vastai", "id_ed25519", "id_rsa"];

/// Pick the private key to use.
///
/// An explicit path always wins. Otherwise the first existing candidate in
/// `~/.ssh` is used, falling back to `~/.ssh/id_ed25519`.
pub fn discover_key(explicit: Option<&Path>) -> Result<PathBuf, RemoteError> {
  if let Some(path) = explicit {
    return Ok(path.to_path_buf());
  }

  let ssh_dir = dirs::home_dir().ok_or(RemoteError::NoHomeDir)?.join(".ssh");
  Ok(discover_key_in(&ssh_dir))
}

/// Key discovery against a specific `.ssh` directory.
pub fn discover_key_in(ssh_dir: &Path) -> PathBuf {
  let found = CANDIDATE_KEYS
    .iter()
    .map(|name| ssh_dir.join(name))
    .find(|path| path.exists());

  match found {
    Some(path) => {
      debug!(key = %path.display(), "using discovered ssh key");
      path
    }
    None => ssh_dir.join(CANDIDATE_KEYS[1]),
  }
}
