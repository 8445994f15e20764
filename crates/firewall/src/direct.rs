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

use crate::{unique_tag, FirewallBackend, FirewallError, FirewallProfile, FirewallToken, TaggedRule};
use tracing::warn;
use vrhotspot_platform::CommandRunner;

/// Applies tagged iptables rules directly, independent of any zone
/// manager. `revert` only ever deletes rules carrying its own tag.
pub struct DirectBackend;

impl FirewallBackend for DirectBackend {
  fn apply(
    &self,
    runner: &dyn CommandRunner,
    profile: &FirewallProfile,
  ) -> Result<FirewallToken, FirewallError> {
    let tag = unique_tag(&profile.ifname);
    let mut rules = Vec::new();

    if profile.enable_masquerade {
      if let Some(uplink) = &profile.uplink_ifname {
        let apply_args = vec![
          "-t".to_string(),
          "nat".to_string(),
          "-A".to_string(),
          "POSTROUTING".to_string(),
          "-o".to_string(),
          uplink.clone(),
          "-j".to_string(),
          "MASQUERADE".to_string(),
          "-m".to_string(),
          "comment".to_string(),
          "--comment".to_string(),
          tag.clone(),
        ];
        let mut delete_args = apply_args.clone();
        delete_args[2] = "-D".to_string();
        rules.push(apply_rule(runner, "nat", apply_args, delete_args)?);
      }
    }

    if profile.enable_forward {
      if let Some(uplink) = profile.uplink_ifname.clone() {
        for (src, dst) in [
          (profile.ifname.clone(), uplink.clone()),
          (uplink, profile.ifname.clone()),
        ] {
          let apply_args = vec![
            "-A".to_string(),
            "FORWARD".to_string(),
            "-i".to_string(),
            src,
            "-o".to_string(),
            dst,
            "-j".to_string(),
            "ACCEPT".to_string(),
            "-m".to_string(),
            "comment".to_string(),
            "--comment".to_string(),
            tag.clone(),
          ];
          let mut delete_args = apply_args.clone();
          delete_args[0] = "-D".to_string();
          rules.push(apply_rule(runner, "filter", apply_args, delete_args)?);
        }
      }
    }

    Ok(FirewallToken::Direct { rules })
  }

  fn revert(&self, runner: &dyn CommandRunner, token: FirewallToken) -> Vec<String> {
    let rules = match token {
      FirewallToken::Direct { rules } => rules,
      _ => return vec!["revert called with mismatched firewall token".to_string()],
    };
    let mut warnings = Vec::new();
    // Reverse order: undo forward rules before the masquerade rule they depend on.
    for rule in rules.into_iter().rev() {
      let args: Vec<&str> = rule.delete_args.iter().map(String::as_str).collect();
      match runner.run("iptables", &args) {
        Ok(out) if out.status_success => {}
        Ok(_) | Err(_) => {
          // Idempotent: a rule already gone is not a failure worth surfacing
          // loudly, but is worth a warning since it means state drifted.
          warn!(table = rule.table, "tagged rule missing during revert");
          warnings.push(format!("firewall_revert_incomplete: {}", rule.table));
        }
      }
    }
    warnings
  }
}

fn apply_rule(
  runner: &dyn CommandRunner,
  table: &'static str,
  apply_args: Vec<String>,
  delete_args: Vec<String>,
) -> Result<TaggedRule, FirewallError> {
  if rule_exists(runner, &apply_args) {
    return Ok(TaggedRule {
      table,
      apply_args,
      delete_args,
    });
  }
  let args: Vec<&str> = apply_args.iter().map(String::as_str).collect();
  let out = runner
    .run("iptables", &args)
    .map_err(|e| FirewallError::ApplyFailed(e.to_string()))?;
  if !out.status_success {
    return Err(FirewallError::ApplyFailed(out.stderr_utf8()));
  }
  Ok(TaggedRule {
    table,
    apply_args,
    delete_args,
  })
}

/// `iptables -C` with the same args as the would-be `-A`: succeeds only if
/// an identical rule is already installed. Run before every insert so
/// `apply` is safe to call repeatedly against a tagged rule set it already
/// owns.
fn rule_exists(runner: &dyn CommandRunner, apply_args: &[String]) -> bool {
  let mut check_args = apply_args.to_vec();
  let Some(insert_pos) = check_args.iter().position(|a| a == "-A") else {
    return false;
  };
  check_args[insert_pos] = "-C".to_string();
  let args: Vec<&str> = check_args.iter().map(String::as_str).collect();
  runner
    .run("iptables", &args)
    .map(|out| out.status_success)
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use vrhotspot_platform::runner::CommandOutput;

  struct OkRunner;
  impl CommandRunner for OkRunner {
    fn run(&self, _program: &str, _args: &[&str]) -> Result<CommandOutput, vrhotspot_platform::PlatformError> {
      Ok(CommandOutput {
        status_success: true,
        stdout: Vec::new(),
        stderr: Vec::new(),
      })
    }
  }

  fn profile() -> FirewallProfile {
    FirewallProfile {
      ifname: "wlan0".to_string(),
      uplink_ifname: Some("eth0".to_string()),
      enable_masquerade: true,
      enable_forward: true,
      zone: "trusted".to_string(),
    }
  }

  #[test]
  fn apply_records_masquerade_and_both_forward_rules() {
    let backend = DirectBackend;
    let token = backend.apply(&OkRunner, &profile()).unwrap();
    match token {
      FirewallToken::Direct { rules } => assert_eq!(rules.len(), 3),
      _ => panic!("expected direct token"),
    }
  }

  #[test]
  fn apply_is_idempotent_and_skips_insert_when_rule_already_present() {
    use std::cell::RefCell;
    use std::collections::HashSet;

    struct StatefulRunner {
      installed: RefCell<HashSet<Vec<String>>>,
    }
    impl CommandRunner for StatefulRunner {
      fn run(&self, _program: &str, args: &[&str]) -> Result<CommandOutput, vrhotspot_platform::PlatformError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        if let Some(pos) = args.iter().position(|a| a == "-C") {
          let mut probe = args.clone();
          probe[pos] = "-A".to_string();
          let present = self.installed.borrow().contains(&probe);
          return Ok(CommandOutput {
            status_success: present,
            stdout: Vec::new(),
            stderr: Vec::new(),
          });
        }
        self.installed.borrow_mut().insert(args);
        Ok(CommandOutput {
          status_success: true,
          stdout: Vec::new(),
          stderr: Vec::new(),
        })
      }
    }

    let runner = StatefulRunner {
      installed: RefCell::new(HashSet::new()),
    };
    let backend = DirectBackend;
    let first = backend.apply(&runner, &profile()).unwrap();
    let second = backend.apply(&runner, &profile()).unwrap();
    match (first, second) {
      (FirewallToken::Direct { rules: a }, FirewallToken::Direct { rules: b }) => {
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 3);
      }
      _ => panic!("expected direct tokens"),
    }
    assert_eq!(runner.installed.borrow().len(), 3);
  }

  #[test]
  fn revert_is_idempotent_against_already_missing_rules() {
    struct MissingRunner;
    impl CommandRunner for MissingRunner {
      fn run(&self, _program: &str, _args: &[&str]) -> Result<CommandOutput, vrhotspot_platform::PlatformError> {
        Ok(CommandOutput {
          status_success: false,
          stdout: Vec::new(),
          stderr: b"Bad rule (does a matching rule exist in that chain?)".to_vec(),
        })
      }
    }
    let backend = DirectBackend;
    let token = backend.apply(&OkRunner, &profile()).unwrap();
    let warnings = backend.revert(&MissingRunner, token);
    assert_eq!(warnings.len(), 3);
  }
}
