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

use crate::{FirewallBackend, FirewallError, FirewallProfile, FirewallToken};
use tracing::warn;
use vrhotspot_platform::CommandRunner;

/// Moves the AP interface into the configured zone, remembering whatever
/// zone it was previously a member of so `revert` can put it back.
pub struct ZoneBackend;

impl FirewallBackend for ZoneBackend {
  fn apply(
    &self,
    runner: &dyn CommandRunner,
    profile: &FirewallProfile,
  ) -> Result<FirewallToken, FirewallError> {
    let previous_zone = runner
      .run(
        "firewall-cmd",
        &["--get-zone-of-interface", &profile.ifname],
      )
      .ok()
      .filter(|out| out.status_success)
      .map(|out| out.stdout_utf8().trim().to_string())
      .filter(|z| !z.is_empty());

    let out = runner
      .run(
        "firewall-cmd",
        &[
          "--zone",
          &profile.zone,
          "--change-interface",
          &profile.ifname,
        ],
      )
      .map_err(|e| FirewallError::ApplyFailed(e.to_string()))?;
    if !out.status_success {
      return Err(FirewallError::ApplyFailed(out.stderr_utf8()));
    }

    if profile.enable_masquerade {
      let _ = runner.run(
        "firewall-cmd",
        &["--zone", &profile.zone, "--add-masquerade"],
      );
    }

    Ok(FirewallToken::Zone {
      ifname: profile.ifname.clone(),
      previous_zone,
    })
  }

  fn revert(&self, runner: &dyn CommandRunner, token: FirewallToken) -> Vec<String> {
    let (ifname, previous_zone) = match token {
      FirewallToken::Zone { ifname, previous_zone } => (ifname, previous_zone),
      _ => return vec!["revert called with mismatched firewall token".to_string()],
    };
    let mut warnings = Vec::new();
    let target_zone = previous_zone.unwrap_or_else(|| "public".to_string());
    match runner.run(
      "firewall-cmd",
      &["--zone", &target_zone, "--change-interface", &ifname],
    ) {
      Ok(out) if out.status_success => {}
      Ok(out) => {
        warn!(ifname = %ifname, "failed to restore previous zone membership");
        warnings.push(format!("firewall_revert_incomplete: {}", out.stderr_utf8()));
      }
      Err(e) => warnings.push(format!("firewall_revert_incomplete: {e}")),
    }
    warnings
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use vrhotspot_platform::runner::CommandOutput;

  struct FakeRunner {
    existing_zone: &'static str,
  }

  impl CommandRunner for FakeRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, vrhotspot_platform::PlatformError> {
      match (program, args) {
        ("firewall-cmd", ["--get-zone-of-interface", _]) => Ok(CommandOutput {
          status_success: true,
          stdout: self.existing_zone.as_bytes().to_vec(),
          stderr: Vec::new(),
        }),
        _ => Ok(CommandOutput {
          status_success: true,
          stdout: Vec::new(),
          stderr: Vec::new(),
        }),
      }
    }
  }

  #[test]
  fn apply_remembers_previous_zone() {
    let backend = ZoneBackend;
    let runner = FakeRunner { existing_zone: "home" };
    let profile = FirewallProfile {
      ifname: "wlan0".to_string(),
      uplink_ifname: None,
      enable_masquerade: true,
      enable_forward: true,
      zone: "trusted".to_string(),
    };
    let token = backend.apply(&runner, &profile).unwrap();
    match token {
      FirewallToken::Zone { previous_zone, .. } => {
        assert_eq!(previous_zone.as_deref(), Some("home"));
      }
      _ => panic!("expected zone token"),
    }
  }

  #[test]
  fn revert_falls_back_to_public_when_no_prior_zone_known() {
    let backend = ZoneBackend;
    let runner = FakeRunner { existing_zone: "" };
    let warnings = backend.revert(
      &runner,
      FirewallToken::Zone {
        ifname: "wlan0".to_string(),
        previous_zone: None,
      },
    );
    assert!(warnings.is_empty());
  }
}
