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

//! Read-only inspectors of the host: kernel network devices, `iw`/`nl80211`
//! capability queries, regulatory domain, rfkill, default route, and
//! whether a zone-based firewall manager is active.
//!
//! Every probe goes through a `CommandRunner` so tests can substitute
//! canned `iw`/`ip` output instead of touching the real host, the same
//! seam the `hifi-wifi` reference tool uses for its `execute_commands`
//! dry-run flag.

mod facts;
mod runner;

pub mod parse;

pub use facts::{gather_platform_facts, PlatformFacts};
pub use runner::{CommandRunner, SystemCommandRunner};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("failed to run `{program}`: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },
  #[error("`{program}` exited with status {status}: {stderr}")]
  NonZeroExit {
    program: String,
    status: i32,
    stderr: String,
  },
  #[error("could not parse output of `{program}`: {reason}")]
  Unparseable { program: String, reason: String },
}

/// Raw view of one kernel network device, prior to capability scoring
/// (that step lives in `vrhotspot-adapters`).
#[derive(Debug, Clone, PartialEq)]
pub struct RawNetDevice {
  pub ifname: String,
  pub phy: String,
  pub driver: String,
  pub mac: String,
  pub is_usb: bool,
}

/// Raw PHY capability bits parsed from `iw phy <phy> info`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPhyCapabilities {
  pub supports_ap: bool,
  pub supports_2_4ghz: bool,
  pub supports_5ghz: bool,
  pub supports_6ghz: bool,
  pub supports_80mhz: bool,
  pub supports_80211ax: bool,
}

/// List the wireless network devices currently visible to the kernel.
pub fn list_net_devices(runner: &dyn CommandRunner) -> Result<Vec<RawNetDevice>, PlatformError> {
  let out = runner.run("iw", &["dev"])?;
  parse::parse_iw_dev(&out.stdout_utf8())
}

/// Query PHY radio capabilities for a given phy id (e.g. `phy0`).
pub fn phy_capabilities(
  runner: &dyn CommandRunner,
  phy: &str,
) -> Result<RawPhyCapabilities, PlatformError> {
  let out = runner.run("iw", &["phy", phy, "info"])?;
  Ok(parse::parse_iw_phy_info(&out.stdout_utf8()))
}

/// Query the regulatory domain currently in effect.
pub fn regulatory_domain(runner: &dyn CommandRunner) -> Result<String, PlatformError> {
  let out = runner.run("iw", &["reg", "get"])?;
  Ok(parse::parse_iw_reg(&out.stdout_utf8()).unwrap_or_else(|| "00".to_string()))
}

/// Whether rfkill reports the given interface as hard- or soft-blocked.
pub fn rfkill_blocked(runner: &dyn CommandRunner, ifname: &str) -> Result<bool, PlatformError> {
  let out = runner.run("rfkill", &["list"])?;
  Ok(parse::parse_rfkill_blocked(&out.stdout_utf8(), ifname))
}

/// The interface carrying the default route, if any.
pub fn default_route_ifname(runner: &dyn CommandRunner) -> Result<Option<String>, PlatformError> {
  let out = runner.run("ip", &["route", "show", "default"])?;
  Ok(parse::parse_default_route(&out.stdout_utf8()))
}

/// Whether a zone-based firewall manager (e.g. firewalld) is active right
/// now. Drives the choice between the two firewall reconciler backends.
pub fn zone_firewall_active(runner: &dyn CommandRunner) -> bool {
  runner
    .run("firewall-cmd", &["--state"])
    .map(|o| o.status_success && o.stdout_utf8().trim() == "running")
    .unwrap_or(false)
}
