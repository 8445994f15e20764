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

const RSSI_FLOOR_DBM: f64 = -90.0;
const RSSI_CEIL_DBM: f64 = -30.0;
const LOSS_CEIL_PCT: f64 = 20.0;

/// Normalizes signal strength and packet loss into a single 0-100 score.
/// Weighted 60/40 toward signal: VR tethering is more sensitive to a weak
/// link than to occasional retransmits.
pub fn quality_score(rssi_dbm: Option<f64>, loss_pct: Option<f64>) -> Option<f64> {
  let rssi_score = rssi_dbm.map(|dbm| {
    let clamped = dbm.clamp(RSSI_FLOOR_DBM, RSSI_CEIL_DBM);
    (clamped - RSSI_FLOOR_DBM) / (RSSI_CEIL_DBM - RSSI_FLOOR_DBM) * 100.0
  });
  let loss_score = loss_pct.map(|pct| {
    let clamped = pct.clamp(0.0, LOSS_CEIL_PCT);
    100.0 - (clamped / LOSS_CEIL_PCT * 100.0)
  });

  match (rssi_score, loss_score) {
    (Some(r), Some(l)) => Some(r * 0.6 + l * 0.4),
    (Some(r), None) => Some(r),
    (None, Some(l)) => Some(l),
    (None, None) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strong_signal_no_loss_scores_near_100() {
    let score = quality_score(Some(-30.0), Some(0.0)).unwrap();
    assert!(score > 99.0);
  }

  #[test]
  fn weak_signal_scores_near_zero() {
    let score = quality_score(Some(-90.0), Some(0.0)).unwrap();
    assert!(score < 1.0);
  }

  #[test]
  fn high_loss_drags_score_down_even_with_strong_signal() {
    let strong_clean = quality_score(Some(-30.0), Some(0.0)).unwrap();
    let strong_lossy = quality_score(Some(-30.0), Some(20.0)).unwrap();
    assert!(strong_lossy < strong_clean);
  }

  #[test]
  fn missing_inputs_yield_none() {
    assert_eq!(quality_score(None, None), None);
  }
}
