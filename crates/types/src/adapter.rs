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

use serde::{Deserialize, Serialize};

/// The bus a Wi-Fi radio is attached to. Influences scoring: a USB radio
/// that supports 5 GHz AP mode outranks an embedded radio of equal band
/// support, since it's usually a purpose-bought VR dongle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdapterBus {
  Unknown,
  Embedded,
  Pci,
  Usb,
}

/// A single radio snapshot. Immutable once built: every inventory read
/// produces a fresh list rather than mutating adapters in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adapter {
  pub ifname: String,
  pub phy: String,
  pub bus: AdapterBus,
  pub driver: String,
  pub mac: String,

  pub supports_ap: bool,
  pub supports_2_4ghz: bool,
  pub supports_5ghz: bool,
  pub supports_6ghz: bool,
  pub supports_80mhz: bool,
  pub supports_80211ax: bool,

  pub regdom: String,

  /// Higher is more preferred. Computed once at inventory time; never
  /// mutated afterwards.
  pub score: i32,
}

impl Adapter {
  /// Whether this adapter can act as an AP on the given band.
  pub fn supports_band(&self, band: &str) -> bool {
    if !self.supports_ap {
      return false;
    }
    match band {
      "2.4ghz" => self.supports_2_4ghz,
      "5ghz" => self.supports_5ghz,
      "6ghz" => self.supports_6ghz,
      _ => false,
    }
  }
}

/// The ranked result of an inventory snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterInventory {
  pub adapters: Vec<Adapter>,
  pub recommended_ifname: Option<String>,
  pub warnings: Vec<String>,
}

impl AdapterInventory {
  pub fn recommended(&self) -> Option<&Adapter> {
    self
      .recommended_ifname
      .as_ref()
      .and_then(|name| self.adapters.iter().find(|a| &a.ifname == name))
  }

  pub fn find(&self, ifname: &str) -> Option<&Adapter> {
    self.adapters.iter().find(|a| a.ifname == ifname)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn adapter(ifname: &str, bus: AdapterBus, supports_5ghz: bool, score: i32) -> Adapter {
    Adapter {
      ifname: ifname.to_string(),
      phy: format!("phy_{ifname}"),
      bus,
      driver: "mt7921u".to_string(),
      mac: "02:00:00:00:00:01".to_string(),
      supports_ap: true,
      supports_2_4ghz: true,
      supports_5ghz,
      supports_6ghz: false,
      supports_80mhz: true,
      supports_80211ax: true,
      regdom: "US".to_string(),
      score,
    }
  }

  #[test]
  fn supports_band_requires_ap_mode() {
    let mut a = adapter("wlan0", AdapterBus::Usb, true, 10);
    a.supports_ap = false;
    assert!(!a.supports_band("5ghz"));
  }

  #[test]
  fn inventory_recommended_resolves_by_name() {
    let inv = AdapterInventory {
      adapters: vec![
        adapter("wlan0", AdapterBus::Embedded, true, 5),
        adapter("wlan1", AdapterBus::Usb, true, 9),
      ],
      recommended_ifname: Some("wlan1".to_string()),
      warnings: vec![],
    };
    assert_eq!(inv.recommended().unwrap().ifname, "wlan1");
    assert!(inv.find("wlan2").is_none());
  }
}
