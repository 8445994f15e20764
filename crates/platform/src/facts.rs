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

use crate::{default_route_ifname, zone_firewall_active, CommandRunner};

/// Platform facts gathered once at the start of each lifecycle call.
/// Everything downstream (adapter selection, engine backend choice,
/// firewall backend choice) consumes this value rather than re-probing,
/// so a single call sees a consistent view of the host even if it
/// changes mid-attempt.
#[derive(Debug, Clone, Default)]
pub struct PlatformFacts {
  pub default_route_ifname: Option<String>,
  pub zone_firewall_active: bool,
  pub os_label: String,
}

pub fn gather_platform_facts(runner: &dyn CommandRunner) -> PlatformFacts {
  PlatformFacts {
    default_route_ifname: default_route_ifname(runner).unwrap_or(None),
    zone_firewall_active: zone_firewall_active(runner),
    os_label: os_label(),
  }
}

fn os_label() -> String {
  std::fs::read_to_string("/etc/os-release")
    .ok()
    .and_then(|content| {
      content.lines().find_map(|line| {
        line
          .strip_prefix("PRETTY_NAME=")
          .map(|v| v.trim_matches('"').to_string())
      })
    })
    .unwrap_or_else(|| "linux".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::runner::CommandOutput;

  struct StubRunner {
    route: &'static str,
    firewalld_running: bool,
  }

  impl CommandRunner for StubRunner {
    fn run(
      &self,
      program: &str,
      args: &[&str],
    ) -> Result<CommandOutput, crate::PlatformError> {
      match (program, args) {
        ("ip", ["route", "show", "default"]) => Ok(CommandOutput {
          status_success: true,
          stdout: self.route.as_bytes().to_vec(),
          stderr: Vec::new(),
        }),
        ("firewall-cmd", ["--state"]) => Ok(CommandOutput {
          status_success: self.firewalld_running,
          stdout: if self.firewalld_running {
            b"running\n".to_vec()
          } else {
            Vec::new()
          },
          stderr: Vec::new(),
        }),
        _ => Ok(CommandOutput::default()),
      }
    }
  }

  #[test]
  fn gathers_route_and_firewall_facts() {
    let runner = StubRunner {
      route: "default via 10.0.0.1 dev eth0",
      firewalld_running: true,
    };
    let facts = gather_platform_facts(&runner);
    assert_eq!(facts.default_route_ifname.as_deref(), Some("eth0"));
    assert!(facts.zone_firewall_active);
  }
}
