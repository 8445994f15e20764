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

//! Small, pure text parsers over `iw`/`ip`/`rfkill` output. Kept separate
//! from the command-running side so they can be fuzzed/tested with fixed
//! strings.

use crate::{PlatformError, RawNetDevice, RawPhyCapabilities};

pub fn parse_iw_dev(text: &str) -> Result<Vec<RawNetDevice>, PlatformError> {
  let mut devices = Vec::new();
  let mut current_phy = String::new();
  let mut current_ifname: Option<String> = None;
  let mut current_mac = String::new();

  for line in text.lines() {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix("phy#") {
      current_phy = format!("phy{rest}");
    } else if let Some(rest) = trimmed.strip_prefix("Interface ") {
      if let Some(ifname) = current_ifname.take() {
        devices.push(RawNetDevice {
          ifname,
          phy: current_phy.clone(),
          driver: String::new(),
          mac: std::mem::take(&mut current_mac),
          is_usb: false,
        });
      }
      current_ifname = Some(rest.trim().to_string());
    } else if let Some(rest) = trimmed.strip_prefix("addr ") {
      current_mac = rest.trim().to_string();
    }
  }
  if let Some(ifname) = current_ifname.take() {
    devices.push(RawNetDevice {
      ifname,
      phy: current_phy,
      driver: String::new(),
      mac: current_mac,
      is_usb: false,
    });
  }
  Ok(devices)
}

pub fn parse_iw_phy_info(text: &str) -> RawPhyCapabilities {
  let mut caps = RawPhyCapabilities::default();

  if text.contains("* AP") {
    caps.supports_ap = true;
  }
  for band_line in text.lines().filter(|l| l.trim_start().starts_with("Band ")) {
    // "Band 1:" = 2.4GHz, "Band 2:" = 5GHz, "Band 4:" = 6GHz (nl80211 band index convention).
    if band_line.contains("Band 1:") {
      caps.supports_2_4ghz = true;
    } else if band_line.contains("Band 2:") {
      caps.supports_5ghz = true;
    } else if band_line.contains("Band 4:") {
      caps.supports_6ghz = true;
    }
  }
  if text.contains("VHT Capabilities") || text.contains("80MHz") {
    caps.supports_80mhz = true;
  }
  if text.contains("HE Iftypes") || text.contains("802.11ax") {
    caps.supports_80211ax = true;
  }
  caps
}

pub fn parse_iw_reg(text: &str) -> Option<String> {
  for line in text.lines() {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix("country ") {
      let code = rest.split(|c: char| !c.is_ascii_alphanumeric()).next()?;
      if code.len() == 2 {
        return Some(code.to_uppercase());
      }
    }
  }
  None
}

pub fn parse_rfkill_blocked(text: &str, ifname: &str) -> bool {
  let mut in_block = false;
  for line in text.lines() {
    let trimmed = line.trim();
    if trimmed.contains(ifname) {
      in_block = true;
      continue;
    }
    if in_block {
      if trimmed.starts_with("Soft blocked: yes") || trimmed.starts_with("Hard blocked: yes") {
        return true;
      }
      if trimmed.is_empty() || trimmed.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
      {
        in_block = false;
      }
    }
  }
  false
}

pub fn parse_default_route(text: &str) -> Option<String> {
  let tokens: Vec<&str> = text.split_whitespace().collect();
  tokens
    .iter()
    .position(|&t| t == "dev")
    .and_then(|i| tokens.get(i + 1))
    .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  const IW_DEV: &str = "phy#0\n\tInterface wlan0\n\t\tifindex 3\n\t\taddr aa:bb:cc:dd:ee:ff\n\t\ttype managed\n";

  #[test]
  fn parses_iw_dev_interfaces() {
    let devs = parse_iw_dev(IW_DEV).unwrap();
    assert_eq!(devs.len(), 1);
    assert_eq!(devs[0].ifname, "wlan0");
    assert_eq!(devs[0].phy, "phy0");
    assert_eq!(devs[0].mac, "aa:bb:cc:dd:ee:ff");
  }

  const IW_PHY_INFO: &str = "Wiphy phy0\n\tSupported interface modes:\n\t\t * AP\n\t\t * managed\n\tBand 1:\n\tBand 2:\n\tHE Iftypes: AP\n\tVHT Capabilities\n";

  #[test]
  fn parses_phy_capabilities() {
    let caps = parse_iw_phy_info(IW_PHY_INFO);
    assert!(caps.supports_ap);
    assert!(caps.supports_2_4ghz);
    assert!(caps.supports_5ghz);
    assert!(!caps.supports_6ghz);
    assert!(caps.supports_80211ax);
    assert!(caps.supports_80mhz);
  }

  #[test]
  fn parses_reg_domain() {
    assert_eq!(parse_iw_reg("country US: DFS-FCC\n"), Some("US".to_string()));
    assert_eq!(parse_iw_reg("country 00: DFS-UNSET\n"), Some("00".to_string()));
    assert_eq!(parse_iw_reg("no data"), None);
  }

  #[test]
  fn parses_rfkill_blocked_state() {
    let text = "0: phy0: Wireless LAN\n\tSoft blocked: yes\n\tHard blocked: no\n";
    assert!(parse_rfkill_blocked(text, "phy0"));
    let text2 = "0: phy0: Wireless LAN\n\tSoft blocked: no\n\tHard blocked: no\n";
    assert!(!parse_rfkill_blocked(text2, "phy0"));
  }

  #[test]
  fn parses_default_route_device() {
    assert_eq!(
      parse_default_route("default via 192.168.1.1 dev eth0 proto dhcp metric 100"),
      Some("eth0".to_string())
    );
    assert_eq!(parse_default_route(""), None);
  }
}
