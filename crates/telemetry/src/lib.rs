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

//! Periodic per-station link-stat sampling, rolled into a summary the
//! status snapshot publishes, plus the supervised-restart backoff policy.

mod quality;
mod sample;
mod watchdog;

pub use quality::quality_score;
pub use sample::{parse_station_dump, StationSample};
pub use watchdog::RestartBackoff;

use tracing::warn;
use vrhotspot_platform::CommandRunner;
use vrhotspot_types::TelemetrySummary;

const LOW_SIGNAL_THRESHOLD_DBM: f64 = -75.0;
const HIGH_LOSS_THRESHOLD_PCT: f64 = 5.0;

/// Samples connected stations on `ifname` and rolls them into a summary.
/// A failed/garbled sample degrades to an empty summary with a warning
/// rather than propagating an error up through the lifecycle lock.
pub fn sample_and_summarize(ifname: &str, runner: &dyn CommandRunner) -> (TelemetrySummary, Vec<String>) {
  let output = match runner.run("iw", &["dev", ifname, "station", "dump"]) {
    Ok(out) if out.status_success => out.stdout_utf8(),
    _ => {
      warn!(ifname, "station dump probe failed");
      return (TelemetrySummary::default(), vec!["sampling_degraded".to_string()]);
    }
  };

  let stations = parse_station_dump(&output);
  summarize(&stations)
}

pub fn summarize(stations: &[StationSample]) -> (TelemetrySummary, Vec<String>) {
  let mut warnings = Vec::new();
  if stations.is_empty() {
    return (
      TelemetrySummary {
        client_count: 0,
        ..Default::default()
      },
      warnings,
    );
  }

  let rssi_values: Vec<f64> = stations.iter().filter_map(|s| s.rssi_dbm).collect();
  let loss_values: Vec<f64> = stations.iter().filter_map(|s| s.loss_pct).collect();
  let scores: Vec<f64> = stations
    .iter()
    .filter_map(|s| quality_score(s.rssi_dbm, s.loss_pct))
    .collect();

  let rssi_avg = average(&rssi_values);
  let loss_avg = average(&loss_values);

  if rssi_avg.map(|v| v < LOW_SIGNAL_THRESHOLD_DBM).unwrap_or(false) {
    warnings.push("low_signal".to_string());
  }
  if loss_avg.map(|v| v > HIGH_LOSS_THRESHOLD_PCT).unwrap_or(false) {
    warnings.push("high_loss".to_string());
  }

  let summary = TelemetrySummary {
    client_count: stations.len(),
    rssi_avg_dbm: rssi_avg,
    quality_score_avg: average(&scores),
    loss_pct_avg: loss_avg,
    tx_mbps_total: stations.iter().filter_map(|s| s.tx_mbps).sum(),
    rx_mbps_total: stations.iter().filter_map(|s| s.rx_mbps).sum(),
  };

  (summary, warnings)
}

fn average(values: &[f64]) -> Option<f64> {
  if values.is_empty() {
    None
  } else {
    Some(values.iter().sum::<f64>() / values.len() as f64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_station_list_reports_zero_clients_no_warnings() {
    let (summary, warnings) = summarize(&[]);
    assert_eq!(summary.client_count, 0);
    assert!(warnings.is_empty());
  }

  #[test]
  fn weak_average_signal_triggers_low_signal_warning() {
    let stations = vec![StationSample {
      mac: "aa:bb:cc:dd:ee:01".to_string(),
      rssi_dbm: Some(-85.0),
      tx_mbps: Some(50.0),
      rx_mbps: Some(50.0),
      loss_pct: Some(0.0),
    }];
    let (_, warnings) = summarize(&stations);
    assert!(warnings.contains(&"low_signal".to_string()));
  }

  #[test]
  fn high_average_loss_triggers_high_loss_warning() {
    let stations = vec![StationSample {
      mac: "aa:bb:cc:dd:ee:01".to_string(),
      rssi_dbm: Some(-50.0),
      tx_mbps: Some(50.0),
      rx_mbps: Some(50.0),
      loss_pct: Some(12.0),
    }];
    let (_, warnings) = summarize(&stations);
    assert!(warnings.contains(&"high_loss".to_string()));
  }

  #[test]
  fn totals_sum_across_stations() {
    let stations = vec![
      StationSample {
        mac: "a".to_string(),
        rssi_dbm: Some(-40.0),
        tx_mbps: Some(100.0),
        rx_mbps: Some(80.0),
        loss_pct: Some(1.0),
      },
      StationSample {
        mac: "b".to_string(),
        rssi_dbm: Some(-50.0),
        tx_mbps: Some(200.0),
        rx_mbps: Some(160.0),
        loss_pct: Some(2.0),
      },
    ];
    let (summary, _) = summarize(&stations);
    assert_eq!(summary.client_count, 2);
    assert!((summary.tx_mbps_total - 300.0).abs() < f64::EPSILON);
    assert!((summary.rx_mbps_total - 240.0).abs() < f64::EPSILON);
  }
}
