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

use crate::error::ErrorDetail;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Stopped,
  Starting,
  Running,
  Stopping,
  Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
  None,
  ApReadyTimeout6Ghz,
  ApReadyTimeout5Ghz,
  DriverRejectedChannel5Ghz,
  DriverRejectedChannelNoVirt,
}

impl Default for FallbackReason {
  fn default() -> Self {
    FallbackReason::None
  }
}

/// Redacted view of the running engine: argv never carries the real
/// passphrase, and log tails are bounded copies of the engine's own ring
/// buffers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStatus {
  pub pid: Option<u32>,
  pub cmd: Vec<String>,
  pub stdout_tail: Vec<String>,
  pub stderr_tail: Vec<String>,
  pub ap_logs_tail: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySummary {
  pub client_count: usize,
  pub rssi_avg_dbm: Option<f64>,
  pub quality_score_avg: Option<f64>,
  pub loss_pct_avg: Option<f64>,
  pub tx_mbps_total: f64,
  pub rx_mbps_total: f64,
}

/// The public observable state. A single value published atomically by the
/// lifecycle worker; readers get a stable, possibly slightly stale, copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
  pub running: bool,
  pub phase: Phase,

  pub adapter: Option<String>,
  pub ap_interface: Option<String>,
  pub band: Option<String>,
  pub mode: Option<String>,
  pub channel_width_mhz: Option<u16>,

  pub selected_band: Option<String>,
  pub selected_width_mhz: Option<u16>,
  pub selected_channel: Option<u32>,
  pub selected_country: Option<String>,

  pub fallback_reason: FallbackReason,

  pub last_op: Option<String>,
  pub last_op_ts: Option<i64>,
  pub last_correlation_id: Option<String>,

  pub last_error: Option<String>,
  pub last_error_detail: Option<ErrorDetail>,

  pub engine: Option<EngineStatus>,
  pub telemetry: TelemetrySummary,
  pub warnings: Vec<String>,
  pub platform: PlatformSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSummary {
  pub os_label: String,
  pub zone_firewall_active: bool,
  pub vendored_only: bool,
}

impl Status {
  pub fn stopped() -> Self {
    Self {
      running: false,
      phase: Phase::Stopped,
      adapter: None,
      ap_interface: None,
      band: None,
      mode: None,
      channel_width_mhz: None,
      selected_band: None,
      selected_width_mhz: None,
      selected_channel: None,
      selected_country: None,
      fallback_reason: FallbackReason::None,
      last_op: None,
      last_op_ts: None,
      last_correlation_id: None,
      last_error: None,
      last_error_detail: None,
      engine: None,
      telemetry: TelemetrySummary::default(),
      warnings: Vec::new(),
      platform: PlatformSummary::default(),
    }
  }

  /// Invariant checked by property tests: `running == (phase == Running)`.
  pub fn consistent(&self) -> bool {
    self.running == matches!(self.phase, Phase::Running)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stopped_status_is_consistent() {
    let s = Status::stopped();
    assert!(s.consistent());
  }

  #[test]
  fn running_must_match_phase() {
    let mut s = Status::stopped();
    s.phase = Phase::Running;
    assert!(!s.consistent());
    s.running = true;
    assert!(s.consistent());
  }
}
