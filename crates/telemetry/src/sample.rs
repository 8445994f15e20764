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

#[derive(Debug, Clone, PartialEq)]
pub struct StationSample {
  pub mac: String,
  pub rssi_dbm: Option<f64>,
  pub tx_mbps: Option<f64>,
  pub rx_mbps: Option<f64>,
  pub loss_pct: Option<f64>,
}

/// Parses `iw dev <ifname> station dump` output into one sample per
/// connected client.
pub fn parse_station_dump(output: &str) -> Vec<StationSample> {
  let mut stations = Vec::new();
  let mut current: Option<StationSample> = None;
  let mut tx_packets = 0u64;
  let mut tx_failed = 0u64;

  for line in output.lines() {
    let trimmed = line.trim();
    if let Some(mac) = trimmed.strip_prefix("Station ") {
      if let Some(done) = current.take() {
        stations.push(finalize(done, tx_packets, tx_failed));
      }
      tx_packets = 0;
      tx_failed = 0;
      let mac = mac.split_whitespace().next().unwrap_or("").to_string();
      current = Some(StationSample {
        mac,
        rssi_dbm: None,
        tx_mbps: None,
        rx_mbps: None,
        loss_pct: None,
      });
      continue;
    }
    let Some(sample) = current.as_mut() else { continue };
    if let Some(rest) = trimmed.strip_prefix("signal:") {
      sample.rssi_dbm = rest.trim().split_whitespace().next().and_then(|s| s.parse().ok());
    } else if let Some(rest) = trimmed.strip_prefix("tx bitrate:") {
      sample.tx_mbps = rest.trim().split_whitespace().next().and_then(|s| s.parse().ok());
    } else if let Some(rest) = trimmed.strip_prefix("rx bitrate:") {
      sample.rx_mbps = rest.trim().split_whitespace().next().and_then(|s| s.parse().ok());
    } else if let Some(rest) = trimmed.strip_prefix("tx packets:") {
      tx_packets = rest.trim().parse().unwrap_or(0);
    } else if let Some(rest) = trimmed.strip_prefix("tx failed:") {
      tx_failed = rest.trim().parse().unwrap_or(0);
    }
  }
  if let Some(done) = current.take() {
    stations.push(finalize(done, tx_packets, tx_failed));
  }
  stations
}

fn finalize(mut sample: StationSample, tx_packets: u64, tx_failed: u64) -> StationSample {
  let total = tx_packets + tx_failed;
  if total > 0 {
    sample.loss_pct = Some(tx_failed as f64 / total as f64 * 100.0);
  }
  sample
}
