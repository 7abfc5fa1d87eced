//! vastctl Remote
//!
//! The [`RemoteShell`] trait is the seam between the tools and a rented
//! instance: run a command, run a command with data on stdin, upload a
//! file. [`OpenSshShell`] implements it with the system `ssh` and `scp`
//! clients using key-based authentication.
//!
//! Connection failures are sorted into coarse [`SshFailure`] categories by
//! matching the client's stderr, which is only meant for human-readable
//! reporting.

mod classify;
mod error;
mod keys;
mod openssh;
mod shell;

pub use classify::{SshFailure, classify_ssh_failure};
pub use error::RemoteError;
pub use keys::{CANDIDATE_KEYS, discover_key, discover_key_in};
pub use openssh::{OpenSshShell, SshTarget};
pub use shell::{CommandOutput, RemoteShell};

/// Quote a single argument for a POSIX shell on the remote side.
pub fn quote(arg: &str) -> std::borrow::Cow<'_, str> {
  shell_words::quote(arg)
}
