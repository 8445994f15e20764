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

//! Turns platform probe output into a scored, band-annotated adapter list
//! and picks a recommended adapter.

mod score;

pub use score::score_adapter;

use thiserror::Error;
use tracing::{debug, warn};
use vrhotspot_platform::{
  list_net_devices, phy_capabilities, regulatory_domain, rfkill_blocked, CommandRunner,
};
use vrhotspot_types::{Adapter, AdapterBus, AdapterInventory};

#[derive(Debug, Error)]
pub enum AdapterError {
  #[error("no adapter named `{0}` was found")]
  NotFound(String),
  #[error("adapter `{0}` does not support AP mode")]
  NoApMode(String),
  #[error("no adapter advertises 6ghz AP support")]
  NoSixGhzApAdapter,
}

/// Read-only inventory snapshot. No retries; probe failures downgrade to a
/// `platform_probe_failed` warning rather than aborting.
pub fn snapshot(runner: &dyn CommandRunner) -> AdapterInventory {
  let raw_devices = match list_net_devices(runner) {
    Ok(devices) => devices,
    Err(e) => {
      warn!(error = %e, "platform_probe_failed while listing net devices");
      return AdapterInventory {
        adapters: Vec::new(),
        recommended_ifname: None,
        warnings: vec!["platform_probe_failed".to_string()],
      };
    }
  };

  let mut warnings = Vec::new();
  let mut adapters: Vec<Adapter> = raw_devices
    .into_iter()
    .filter_map(|raw| {
      let caps = match phy_capabilities(runner, &raw.phy) {
        Ok(c) => c,
        Err(e) => {
          warn!(phy = %raw.phy, error = %e, "platform_probe_failed reading phy capabilities");
          warnings.push("platform_probe_failed".to_string());
          return None;
        }
      };
      if rfkill_blocked(runner, &raw.phy).unwrap_or(false) {
        debug!(ifname = %raw.ifname, "adapter rfkill-blocked, excluding from inventory");
        return None;
      }
      let regdom = regulatory_domain(runner).unwrap_or_else(|_| "00".to_string());
      let bus = if raw.is_usb {
        AdapterBus::Usb
      } else {
        AdapterBus::Embedded
      };
      let mut adapter = Adapter {
        ifname: raw.ifname,
        phy: raw.phy,
        bus,
        driver: raw.driver,
        mac: raw.mac,
        supports_ap: caps.supports_ap,
        supports_2_4ghz: caps.supports_2_4ghz,
        supports_5ghz: caps.supports_5ghz,
        supports_6ghz: caps.supports_6ghz,
        supports_80mhz: caps.supports_80mhz,
        supports_80211ax: caps.supports_80211ax,
        regdom,
        score: 0,
      };
      adapter.score = score_adapter(&adapter);
      Some(adapter)
    })
    .collect();

  // Deterministic ordering: sort by score descending, stable on ifname for ties.
  adapters.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.ifname.cmp(&b.ifname)));

  let recommended_ifname = adapters.first().map(|a| a.ifname.clone());

  AdapterInventory {
    adapters,
    recommended_ifname,
    warnings,
  }
}

/// Given a requested band, return either the explicit adapter (if it
/// supports the band in AP mode) or the best alternative.
pub fn select_for(
  inventory: &AdapterInventory,
  band: &str,
  requested_ifname: Option<&str>,
) -> Result<Adapter, AdapterError> {
  if let Some(ifname) = requested_ifname {
    let adapter = inventory
      .find(ifname)
      .ok_or_else(|| AdapterError::NotFound(ifname.to_string()))?;
    if !adapter.supports_ap {
      return Err(AdapterError::NoApMode(ifname.to_string()));
    }
    if band != "recommended" && !adapter.supports_band(band) {
      if band == "6ghz" {
        return Err(AdapterError::NoSixGhzApAdapter);
      }
      // Explicit adapter lacks the requested band; spec says fall back to
      // the best alternative supporting it, so fall through.
    } else {
      return Ok(adapter.clone());
    }
  }

  if band == "6ghz" {
    return inventory
      .adapters
      .iter()
      .find(|a| a.supports_band("6ghz"))
      .cloned()
      .ok_or(AdapterError::NoSixGhzApAdapter);
  }

  let candidate = if band == "recommended" {
    inventory.recommended().cloned()
  } else {
    inventory
      .adapters
      .iter()
      .find(|a| a.supports_band(band))
      .cloned()
  };

  candidate.ok_or_else(|| AdapterError::NotFound(requested_ifname.unwrap_or("<any>").to_string()))
}
