/*
 * Copyright (c) 2026 VR Hotspot Contributors
 *
 * Licensed under the MIT license (the "License"); you may not use this file except in compliance
 * with the License. You may obtain a copy of the License at
 *
 *   https://opensource.org/license/mit/
 *
 * Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on
 * an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
 * License for the specific language governing permissions and limitations under the License.
 */

use crate::PlatformError;
use std::io::Read;
use std::process::Command;
use std::time::Duration;

/// Captured output of a probe command. Probes are bounded: `SystemCommandRunner`
/// never blocks indefinitely, returning a stale inventory rather than hanging
/// the caller.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
  pub status_success: bool,
  pub stdout: Vec<u8>,
  pub stderr: Vec<u8>,
}

impl CommandOutput {
  pub fn stdout_utf8(&self) -> String {
    String::from_utf8_lossy(&self.stdout).into_owned()
  }

  pub fn stderr_utf8(&self) -> String {
    String::from_utf8_lossy(&self.stderr).into_owned()
  }
}

/// Seam over process execution so every probe can be driven from canned
/// output in tests.
pub trait CommandRunner: Send + Sync {
  fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, PlatformError>;
}

/// The real runner, used outside of tests. Each invocation is bounded by
/// `timeout` (probes never hang the lifecycle lock).
pub struct SystemCommandRunner {
  pub timeout: Duration,
}

impl Default for SystemCommandRunner {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(2),
    }
  }
}

impl CommandRunner for SystemCommandRunner {
  fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, PlatformError> {
    // A dedicated watchdog thread enforces `timeout` since `std::process`
    // has no native deadline on `wait()`; probes must never hang the
    // lifecycle lock on a wedged `iw`/`ip` invocation.
    let mut child = Command::new(program)
      .args(args)
      .stdout(std::process::Stdio::piped())
      .stderr(std::process::Stdio::piped())
      .spawn()
      .map_err(|source| PlatformError::Spawn {
        program: program.to_string(),
        source,
      })?;

    let deadline = std::time::Instant::now() + self.timeout;
    let status = loop {
      match child.try_wait() {
        Ok(Some(status)) => break status,
        Ok(None) if std::time::Instant::now() >= deadline => {
          let _ = child.kill();
          break child.wait().map_err(|source| PlatformError::Spawn {
            program: program.to_string(),
            source,
          })?;
        }
        Ok(None) => std::thread::sleep(Duration::from_millis(20)),
        Err(source) => {
          return Err(PlatformError::Spawn {
            program: program.to_string(),
            source,
          })
        }
      }
    };

    // The child is already reaped above; read the piped output directly
    // instead of `wait_with_output`, which would try to wait() again.
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    if let Some(mut out) = child.stdout.take() {
      let _ = out.read_to_end(&mut stdout);
    }
    if let Some(mut err) = child.stderr.take() {
      let _ = err.read_to_end(&mut stderr);
    }

    Ok(CommandOutput {
      status_success: status.success(),
      stdout,
      stderr,
    })
  }
}
