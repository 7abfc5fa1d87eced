use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use vastctl_remote::{CommandOutput, RemoteError, RemoteShell};

/// In-memory shell answering commands by substring match.
///
/// Each rule holds a queue of outputs; the last one repeats once the queue
/// is down to a single entry. Unmatched commands succeed with no output.
#[derive(Default)]
pub struct ScriptedShell {
  rules: Mutex<Vec<(String, VecDeque<CommandOutput>)>>,
  pub commands: Mutex<Vec<String>>,
  pub stdin: Mutex<Vec<(String, String)>>,
  pub uploads: Mutex<Vec<(PathBuf, String)>>,
}

pub fn ok(stdout: &str) -> CommandOutput {
  CommandOutput {
    stdout: stdout.to_string(),
    stderr: String::new(),
    exit_code: 0,
  }
}

pub fn failed(stderr: &str) -> CommandOutput {
  CommandOutput {
    stdout: String::new(),
    stderr: stderr.to_string(),
    exit_code: 1,
  }
}

impl ScriptedShell {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on(self, needle: &str, output: CommandOutput) -> Self {
    self.on_seq(needle, vec![output])
  }

  pub fn on_seq(self, needle: &str, outputs: Vec<CommandOutput>) -> Self {
    self
      .rules
      .lock()
      .unwrap()
      .push((needle.to_string(), outputs.into()));
    self
  }

  pub fn commands(&self) -> Vec<String> {
    self.commands.lock().unwrap().clone()
  }

  pub fn stdin_for(&self, needle: &str) -> Option<String> {
    self
      .stdin
      .lock()
      .unwrap()
      .iter()
      .find(|(command, _)| command.contains(needle))
      .map(|(_, input)| input.clone())
  }

  fn respond(&self, command: &str) -> CommandOutput {
    self.commands.lock().unwrap().push(command.to_string());

    let mut rules = self.rules.lock().unwrap();
    for (needle, outputs) in rules.iter_mut() {
      if command.contains(needle.as_str()) {
        if outputs.len() > 1 {
          return outputs.pop_front().unwrap();
        }
        return outputs.front().cloned().unwrap_or_default();
      }
    }

    CommandOutput::default()
  }
}

#[async_trait]
impl RemoteShell for ScriptedShell {
  async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError> {
    Ok(self.respond(command))
  }

  async fn exec_with_stdin(
    &self,
    command: &str,
    input: &[u8],
  ) -> Result<CommandOutput, RemoteError> {
    self.stdin.lock().unwrap().push((
      command.to_string(),
      String::from_utf8_lossy(input).into_owned(),
    ));
    Ok(self.respond(command))
  }

  async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), RemoteError> {
    self
      .uploads
      .lock()
      .unwrap()
      .push((local_path.to_path_buf(), remote_path.to_string()));
    Ok(())
  }
}
