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
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandPreference {
  Recommended,
  #[serde(rename = "2.4ghz")]
  Band2_4,
  #[serde(rename = "5ghz")]
  Band5,
  #[serde(rename = "6ghz")]
  Band6,
}

impl BandPreference {
  pub fn as_band_str(&self) -> &'static str {
    match self {
      BandPreference::Recommended => "recommended",
      BandPreference::Band2_4 => "2.4ghz",
      BandPreference::Band5 => "5ghz",
      BandPreference::Band6 => "6ghz",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApSecurity {
  Wpa2,
  Wpa3Sae,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QosPreset {
  Off,
  Vr,
  Balanced,
  UltraLowLatency,
  HighThroughput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
  pub bridge_mode: bool,
  pub bridge_name: String,
  pub bridge_uplink_ifname: String,
}

impl Default for BridgeConfig {
  fn default() -> Self {
    Self {
      bridge_mode: false,
      bridge_name: "br-vr".to_string(),
      bridge_uplink_ifname: String::new(),
    }
  }
}

/// The persisted, validated settings record. Never carries the passphrase
/// itself — see `vrhotspot-config::secret` for the sibling side-store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
  // Identity
  pub ssid: String,
  #[serde(default)]
  pub wpa2_passphrase_set: bool,
  #[serde(default)]
  pub wpa2_passphrase_len: usize,

  // Radio
  pub band_preference: BandPreference,
  pub ap_security: ApSecurity,
  pub country: String,
  pub channel_2g_fallback: u8,
  pub channel_5g: Option<u32>,
  pub channel_6g: Option<u32>,
  pub channel_width: u16,
  pub beacon_interval_ms: Option<u32>,
  pub dtim_period: Option<u8>,
  pub short_guard_interval: Option<bool>,
  pub tx_power_dbm: Option<i32>,
  pub channel_auto_select: bool,
  pub ieee80211d: bool,

  // Adapter
  pub ap_adapter_ifname: Option<String>,

  // Network plane
  pub lan_gateway_ip: String,
  pub dhcp_start_ip: String,
  pub dhcp_end_ip: String,
  pub dhcp_dns: String,
  pub enable_internet: bool,
  pub bridge: BridgeConfig,

  // Tuning toggles
  pub wifi_power_save_disable: bool,
  pub usb_autosuspend_disable: bool,
  pub cpu_governor_performance: bool,
  pub sysctl_tuning: bool,
  pub interrupt_coalescing: bool,
  pub tcp_low_latency: bool,
  pub memory_tuning: bool,
  pub io_scheduler_optimize: bool,
  pub cpu_affinity_mask: Option<u64>,
  pub irq_affinity_mask: Option<u64>,

  // Firewall
  pub firewall_enabled: bool,
  pub firewall_enable_masquerade: bool,
  pub firewall_enable_forward: bool,
  pub firewall_cleanup_on_stop: bool,
  pub firewall_zone: String,

  // QoS
  pub qos_preset: QosPreset,
  pub nat_accel: bool,

  // Timing
  pub ap_ready_timeout_s: f64,
  pub telemetry_enable: bool,
  pub telemetry_interval_s: f64,
  pub watchdog_enable: bool,
  pub watchdog_interval_s: f64,
  pub autostart: bool,

  // Diagnostics
  pub debug: bool,
  pub vendored_binaries_only: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      ssid: "VR-Hotspot".to_string(),
      wpa2_passphrase_set: false,
      wpa2_passphrase_len: 0,

      band_preference: BandPreference::Recommended,
      ap_security: ApSecurity::Wpa2,
      country: String::new(),
      channel_2g_fallback: 6,
      channel_5g: None,
      channel_6g: None,
      channel_width: 80,
      beacon_interval_ms: None,
      dtim_period: None,
      short_guard_interval: None,
      tx_power_dbm: None,
      channel_auto_select: true,
      ieee80211d: false,

      ap_adapter_ifname: None,

      lan_gateway_ip: "192.168.90.1".to_string(),
      dhcp_start_ip: "192.168.90.10".to_string(),
      dhcp_end_ip: "192.168.90.200".to_string(),
      dhcp_dns: "gateway".to_string(),
      enable_internet: true,
      bridge: BridgeConfig::default(),

      wifi_power_save_disable: true,
      usb_autosuspend_disable: true,
      cpu_governor_performance: false,
      sysctl_tuning: true,
      interrupt_coalescing: false,
      tcp_low_latency: true,
      memory_tuning: false,
      io_scheduler_optimize: false,
      cpu_affinity_mask: None,
      irq_affinity_mask: None,

      firewall_enabled: true,
      firewall_enable_masquerade: true,
      firewall_enable_forward: true,
      firewall_cleanup_on_stop: true,
      firewall_zone: "trusted".to_string(),

      qos_preset: QosPreset::Vr,
      nat_accel: false,

      ap_ready_timeout_s: 12.0,
      telemetry_enable: true,
      telemetry_interval_s: 2.0,
      watchdog_enable: true,
      watchdog_interval_s: 5.0,
      autostart: false,

      debug: false,
      vendored_binaries_only: false,
    }
  }
}

/// A partial update to `Config`. Every field is optional; `save()` merges
/// this over the current record before validating the full result.
///
/// `wpa2_passphrase` is intentionally out-of-band: it never lands in the
/// persisted `Config`, only in the sibling secret store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
  pub ssid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub wpa2_passphrase: Option<String>,

  pub band_preference: Option<BandPreference>,
  pub ap_security: Option<ApSecurity>,
  pub country: Option<String>,
  pub channel_2g_fallback: Option<u8>,
  pub channel_5g: Option<Option<u32>>,
  pub channel_6g: Option<Option<u32>>,
  pub channel_width: Option<u16>,
  pub beacon_interval_ms: Option<Option<u32>>,
  pub dtim_period: Option<Option<u8>>,
  pub short_guard_interval: Option<Option<bool>>,
  pub tx_power_dbm: Option<Option<i32>>,
  pub channel_auto_select: Option<bool>,
  pub ieee80211d: Option<bool>,

  pub ap_adapter_ifname: Option<Option<String>>,

  pub lan_gateway_ip: Option<String>,
  pub dhcp_start_ip: Option<String>,
  pub dhcp_end_ip: Option<String>,
  pub dhcp_dns: Option<String>,
  pub enable_internet: Option<bool>,
  pub bridge: Option<BridgeConfig>,

  pub wifi_power_save_disable: Option<bool>,
  pub usb_autosuspend_disable: Option<bool>,
  pub cpu_governor_performance: Option<bool>,
  pub sysctl_tuning: Option<bool>,
  pub interrupt_coalescing: Option<bool>,
  pub tcp_low_latency: Option<bool>,
  pub memory_tuning: Option<bool>,
  pub io_scheduler_optimize: Option<bool>,
  pub cpu_affinity_mask: Option<Option<u64>>,
  pub irq_affinity_mask: Option<Option<u64>>,

  pub firewall_enabled: Option<bool>,
  pub firewall_enable_masquerade: Option<bool>,
  pub firewall_enable_forward: Option<bool>,
  pub firewall_cleanup_on_stop: Option<bool>,
  pub firewall_zone: Option<String>,

  pub qos_preset: Option<QosPreset>,
  pub nat_accel: Option<bool>,

  pub ap_ready_timeout_s: Option<f64>,
  pub telemetry_enable: Option<bool>,
  pub telemetry_interval_s: Option<f64>,
  pub watchdog_enable: Option<bool>,
  pub watchdog_interval_s: Option<f64>,
  pub autostart: Option<bool>,

  pub debug: Option<bool>,
  pub vendored_binaries_only: Option<bool>,
}

impl Config {
  /// Merge `patch` over `self`, returning the candidate record. Does not
  /// validate — callers run `validate()` on the result.
  pub fn merged(&self, patch: &ConfigPatch) -> Config {
    let mut c = self.clone();
    macro_rules! apply {
      ($field:ident) => {
        if let Some(v) = patch.$field.clone() {
          c.$field = v;
        }
      };
    }
    apply!(ssid);
    apply!(band_preference);
    apply!(ap_security);
    apply!(country);
    apply!(channel_2g_fallback);
    apply!(channel_5g);
    apply!(channel_6g);
    apply!(channel_width);
    apply!(beacon_interval_ms);
    apply!(dtim_period);
    apply!(short_guard_interval);
    apply!(tx_power_dbm);
    apply!(channel_auto_select);
    apply!(ieee80211d);
    apply!(ap_adapter_ifname);
    apply!(lan_gateway_ip);
    apply!(dhcp_start_ip);
    apply!(dhcp_end_ip);
    apply!(dhcp_dns);
    apply!(enable_internet);
    apply!(bridge);
    apply!(wifi_power_save_disable);
    apply!(usb_autosuspend_disable);
    apply!(cpu_governor_performance);
    apply!(sysctl_tuning);
    apply!(interrupt_coalescing);
    apply!(tcp_low_latency);
    apply!(memory_tuning);
    apply!(io_scheduler_optimize);
    apply!(cpu_affinity_mask);
    apply!(irq_affinity_mask);
    apply!(firewall_enabled);
    apply!(firewall_enable_masquerade);
    apply!(firewall_enable_forward);
    apply!(firewall_cleanup_on_stop);
    apply!(firewall_zone);
    apply!(qos_preset);
    apply!(nat_accel);
    apply!(ap_ready_timeout_s);
    apply!(telemetry_enable);
    apply!(telemetry_interval_s);
    apply!(watchdog_enable);
    apply!(watchdog_interval_s);
    apply!(autostart);
    apply!(debug);
    apply!(vendored_binaries_only);

    if matches!(c.band_preference, BandPreference::Band6) {
      c.ap_security = ApSecurity::Wpa3Sae;
    }
    c.ap_ready_timeout_s = c.ap_ready_timeout_s.clamp(1.0, 30.0);
    c
  }
}

/// One invariant violation. `validate()` accumulates every failure rather
/// than stopping at the first, so a caller can report them all at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
  pub field: String,
  pub message: String,
}

impl FieldError {
  fn new(field: &str, message: impl Into<String>) -> Self {
    Self {
      field: field.to_string(),
      message: message.into(),
    }
  }
}

/// Validate every field invariant on `c`. Returns the full list of
/// violations rather than bailing on the first.
pub fn validate(c: &Config) -> Vec<FieldError> {
  let mut errs = Vec::new();

  let ssid_len = c.ssid.as_bytes().len();
  if ssid_len == 0 || ssid_len > 32 {
    errs.push(FieldError::new("ssid", "must be 1..32 octets"));
  }
  if c.ssid.chars().any(|ch| ch.is_control()) {
    errs.push(FieldError::new("ssid", "must not contain control characters"));
  }

  if c.wpa2_passphrase_set && !(8..=63).contains(&c.wpa2_passphrase_len) {
    errs.push(FieldError::new(
      "wpa2_passphrase",
      "must be 8..63 printable octets",
    ));
  }

  if matches!(c.band_preference, BandPreference::Band6) && c.ap_security != ApSecurity::Wpa3Sae {
    errs.push(FieldError::new(
      "ap_security",
      "6ghz band requires wpa3_sae",
    ));
  }

  if !(1..=14).contains(&c.channel_2g_fallback) {
    errs.push(FieldError::new(
      "channel_2g_fallback",
      "must be in 1..14",
    ));
  }

  if c.ieee80211d {
    let valid = c.country.len() == 2
      && c.country.chars().all(|ch| ch.is_ascii_uppercase())
      && c.country != "00";
    if !valid {
      errs.push(FieldError::new(
        "country",
        "must be two uppercase letters and not \"00\" when ieee80211d=1",
      ));
    }
  }

  match (
    Ipv4Addr::from_str(&c.lan_gateway_ip),
    Ipv4Addr::from_str(&c.dhcp_start_ip),
    Ipv4Addr::from_str(&c.dhcp_end_ip),
  ) {
    (Ok(gw), Ok(start), Ok(end)) => {
      if !same_slash_24(gw, start) || start == gw {
        errs.push(FieldError::new(
          "dhcp_start_ip",
          "must lie in gateway's /24 and differ from the gateway",
        ));
      }
      if !same_slash_24(gw, end) || end == gw {
        errs.push(FieldError::new(
          "dhcp_end_ip",
          "must lie in gateway's /24 and differ from the gateway",
        ));
      }
      if u32::from(start) > u32::from(end) {
        errs.push(FieldError::new(
          "dhcp_start_ip",
          "must not be greater than dhcp_end_ip",
        ));
      }
    }
    _ => errs.push(FieldError::new(
      "lan_gateway_ip",
      "gateway/dhcp range must be valid IPv4 addresses",
    )),
  }

  if !matches!(c.channel_width, 20 | 40 | 80) {
    errs.push(FieldError::new("channel_width", "must be 20, 40, or 80"));
  }

  if !(1.0..=30.0).contains(&c.ap_ready_timeout_s) {
    errs.push(FieldError::new(
      "ap_ready_timeout_s",
      "must be clamped to [1.0, 30.0]",
    ));
  }
  if c.telemetry_interval_s < 0.5 {
    errs.push(FieldError::new(
      "telemetry_interval_s",
      "must be >= 0.5",
    ));
  }
  if c.watchdog_interval_s < 0.5 {
    errs.push(FieldError::new("watchdog_interval_s", "must be >= 0.5"));
  }

  errs
}

fn same_slash_24(a: Ipv4Addr, b: Ipv4Addr) -> bool {
  let a = a.octets();
  let b = b.octets();
  a[0] == b[0] && a[1] == b[1] && a[2] == b[2]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    assert!(validate(&Config::default()).is_empty());
  }

  #[test]
  fn six_ghz_forces_wpa3() {
    let mut c = Config::default();
    c.band_preference = BandPreference::Band6;
    c.ap_security = ApSecurity::Wpa2;
    let errs = validate(&c);
    assert!(errs.iter().any(|e| e.field == "ap_security"));
  }

  #[test]
  fn merge_forces_wpa3_for_6ghz_patch() {
    let base = Config::default();
    let patch = ConfigPatch {
      band_preference: Some(BandPreference::Band6),
      ..Default::default()
    };
    let merged = base.merged(&patch);
    assert_eq!(merged.ap_security, ApSecurity::Wpa3Sae);
  }

  #[test]
  fn dhcp_range_outside_gateway_subnet_is_rejected() {
    let mut c = Config::default();
    c.dhcp_start_ip = "10.0.0.5".to_string();
    let errs = validate(&c);
    assert!(errs.iter().any(|e| e.field == "dhcp_start_ip"));
  }

  #[test]
  fn dhcp_equal_to_gateway_is_rejected() {
    let mut c = Config::default();
    c.dhcp_start_ip = c.lan_gateway_ip.clone();
    let errs = validate(&c);
    assert!(errs.iter().any(|e| e.field == "dhcp_start_ip"));
  }

  #[test]
  fn ieee80211d_requires_real_country() {
    let mut c = Config::default();
    c.ieee80211d = true;
    c.country = "00".to_string();
    let errs = validate(&c);
    assert!(errs.iter().any(|e| e.field == "country"));
  }

  #[test]
  fn ap_ready_timeout_clamped_on_merge() {
    let base = Config::default();
    let patch = ConfigPatch {
      ap_ready_timeout_s: Some(99.0),
      ..Default::default()
    };
    let merged = base.merged(&patch);
    assert_eq!(merged.ap_ready_timeout_s, 30.0);
  }
}
