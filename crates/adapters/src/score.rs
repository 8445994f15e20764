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

use vrhotspot_types::{Adapter, AdapterBus};

/// Deterministic scoring: given identical probe output this always returns
/// the same order. Weighted so the tie-break order (supports_ap >
/// supports_5ghz > bus=usb > ...) falls out of simple weight magnitudes
/// rather than a bespoke comparator.
pub fn score_adapter(adapter: &Adapter) -> i32 {
  let mut score = 0;

  if adapter.supports_ap {
    score += 1000;
  }
  if adapter.supports_6ghz {
    score += 400;
  }
  if adapter.supports_5ghz {
    score += 200;
  }
  if adapter.bus == AdapterBus::Usb {
    score += 100;
  }
  if adapter.supports_80mhz {
    score += 20;
  }
  if adapter.supports_80211ax {
    score += 10;
  }
  if adapter.supports_2_4ghz {
    score += 5;
  }

  score
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base(ifname: &str) -> Adapter {
    Adapter {
      ifname: ifname.to_string(),
      phy: "phy0".to_string(),
      bus: AdapterBus::Embedded,
      driver: "ath".to_string(),
      mac: "00:00:00:00:00:00".to_string(),
      supports_ap: true,
      supports_2_4ghz: true,
      supports_5ghz: false,
      supports_6ghz: false,
      supports_80mhz: false,
      supports_80211ax: false,
      regdom: "US".to_string(),
      score: 0,
    }
  }

  #[test]
  fn usb_5ghz_outranks_embedded_of_equal_band_support() {
    let mut usb = base("wlan1");
    usb.bus = AdapterBus::Usb;
    usb.supports_5ghz = true;

    let mut embedded = base("wlan0");
    embedded.supports_5ghz = true;

    assert!(score_adapter(&usb) > score_adapter(&embedded));
  }

  #[test]
  fn no_ap_support_scores_lowest() {
    let mut no_ap = base("wlan2");
    no_ap.supports_ap = false;
    no_ap.supports_5ghz = true;
    no_ap.bus = AdapterBus::Usb;

    let ap_only = base("wlan3");

    assert!(score_adapter(&no_ap) < score_adapter(&ap_only));
  }

  #[test]
  fn scoring_is_deterministic() {
    let a = base("wlan0");
    assert_eq!(score_adapter(&a), score_adapter(&a));
  }
}
