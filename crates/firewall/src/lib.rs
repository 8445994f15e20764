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

//! Applies and reverts the forwarding/NAT rules an access point needs,
//! through one of two backends depending on what's already managing the
//! host firewall.

mod direct;
mod zone;

pub use direct::DirectBackend;
pub use zone::ZoneBackend;

use thiserror::Error;
use vrhotspot_platform::CommandRunner;

#[derive(Debug, Clone)]
pub struct FirewallProfile {
  pub ifname: String,
  pub uplink_ifname: Option<String>,
  pub enable_masquerade: bool,
  pub enable_forward: bool,
  pub zone: String,
}

#[derive(Debug, Clone)]
pub struct TaggedRule {
  pub table: &'static str,
  pub apply_args: Vec<String>,
  pub delete_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum FirewallToken {
  Zone {
    ifname: String,
    previous_zone: Option<String>,
  },
  Direct {
    rules: Vec<TaggedRule>,
  },
  Skipped,
}

#[derive(Debug, Error)]
pub enum FirewallError {
  #[error("failed to apply firewall rule: {0}")]
  ApplyFailed(String),
}

pub trait FirewallBackend {
  fn apply(
    &self,
    runner: &dyn CommandRunner,
    profile: &FirewallProfile,
  ) -> Result<FirewallToken, FirewallError>;

  /// Best-effort, idempotent. Never panics; collects failures into the
  /// returned warning list instead.
  fn revert(&self, runner: &dyn CommandRunner, token: FirewallToken) -> Vec<String>;
}

/// Direct-6GHz + zone-managed firewall already owning the zone means NAT
/// hooks would fight the zone manager's own forwarding rules for the same
/// interface; skip them.
pub fn should_skip_nat_hooks(zone_firewall_active: bool, is_direct_6ghz_backend: bool) -> bool {
  zone_firewall_active && is_direct_6ghz_backend
}

/// Deterministic per-interface tag, not a fresh one per call: `apply` must
/// be safe to call again against rules it already installed, and a random
/// tag would make every call think it owns nothing yet.
fn unique_tag(ifname: &str) -> String {
  format!("vrhotspot-{ifname}")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn skips_nat_hooks_only_when_zone_active_and_direct_6ghz() {
    assert!(should_skip_nat_hooks(true, true));
    assert!(!should_skip_nat_hooks(true, false));
    assert!(!should_skip_nat_hooks(false, true));
  }
}
