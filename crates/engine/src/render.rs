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

use crate::EnginePlan;
use vrhotspot_types::ApSecurity;

/// Renders a minimal `hostapd.conf`. Never logged verbatim elsewhere: the
/// passphrase line is the only place the real secret touches disk outside
/// the config crate's side-store.
pub fn hostapd_conf(plan: &EnginePlan) -> String {
  let hw_mode = match plan.band.as_str() {
    "2.4ghz" => "g",
    _ => "a",
  };
  let mut out = String::new();
  out.push_str(&format!("interface={}\n", plan.ifname));
  out.push_str(&format!("ssid={}\n", plan.ssid));
  out.push_str(&format!("hw_mode={hw_mode}\n"));
  out.push_str(&format!("channel={}\n", plan.channel));
  out.push_str("ieee80211n=1\n");
  if plan.channel_width_mhz >= 80 {
    out.push_str("ieee80211ac=1\n");
    out.push_str("vht_oper_chwidth=1\n");
  }
  if plan.band == "6ghz" {
    out.push_str("ieee80211ax=1\n");
    out.push_str("he_oper_chwidth=1\n");
  }
  if plan.ieee80211d && !plan.country.is_empty() {
    out.push_str(&format!("country_code={}\n", plan.country));
    out.push_str("ieee80211d=1\n");
  }
  match plan.security {
    ApSecurity::Wpa3Sae => {
      out.push_str("wpa=2\n");
      out.push_str("wpa_key_mgmt=SAE\n");
      out.push_str("ieee80211w=2\n");
      if let Some(p) = &plan.passphrase {
        out.push_str(&format!("sae_password={p}\n"));
      }
    }
    ApSecurity::Wpa2 => {
      out.push_str("wpa=2\n");
      out.push_str("wpa_key_mgmt=WPA-PSK\n");
      if let Some(p) = &plan.passphrase {
        out.push_str(&format!("wpa_passphrase={p}\n"));
      }
    }
  }
  out
}

/// Renders a minimal `dnsmasq.conf` for the orchestrator/direct backends.
/// The bridge backend never calls this: uplink DHCP serves clients.
pub fn dnsmasq_conf(plan: &EnginePlan) -> String {
  format!(
    "interface={}\nbind-interfaces\ndhcp-range={},{},12h\ndhcp-option=6,{}\n",
    plan.ifname, plan.dhcp_start_ip, plan.dhcp_end_ip, plan.dhcp_dns
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::EnginePlan;
  use std::path::PathBuf;
  use vrhotspot_types::BridgeConfig;

  fn plan() -> EnginePlan {
    EnginePlan {
      ifname: "wlan0".to_string(),
      ssid: "VR-Hotspot".to_string(),
      passphrase: Some("correcthorse".to_string()),
      security: ApSecurity::Wpa2,
      band: "5ghz".to_string(),
      channel: 36,
      channel_width_mhz: 80,
      country: "US".to_string(),
      ieee80211d: true,
      gateway_ip: "192.168.90.1".to_string(),
      dhcp_start_ip: "192.168.90.10".to_string(),
      dhcp_end_ip: "192.168.90.200".to_string(),
      dhcp_dns: "192.168.90.1".to_string(),
      bridge: BridgeConfig::default(),
      app_root: PathBuf::from("/opt/vrhotspot"),
      vendored_binaries_only: false,
    }
  }

  #[test]
  fn hostapd_conf_includes_channel_and_ssid() {
    let conf = hostapd_conf(&plan());
    assert!(conf.contains("ssid=VR-Hotspot"));
    assert!(conf.contains("channel=36"));
    assert!(conf.contains("country_code=US"));
  }

  #[test]
  fn wpa3_sae_uses_sae_password_directive() {
    let mut p = plan();
    p.security = ApSecurity::Wpa3Sae;
    let conf = hostapd_conf(&p);
    assert!(conf.contains("wpa_key_mgmt=SAE"));
    assert!(conf.contains("sae_password=correcthorse"));
    assert!(!conf.contains("wpa_passphrase="));
  }

  #[test]
  fn dnsmasq_conf_uses_configured_range() {
    let conf = dnsmasq_conf(&plan());
    assert!(conf.contains("dhcp-range=192.168.90.10,192.168.90.200,12h"));
  }
}
