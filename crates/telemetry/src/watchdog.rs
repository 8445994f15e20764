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

use std::time::Duration;

const BASE_DELAY: Duration = Duration::from_secs(2);
const BACKOFF_FACTOR: u32 = 2;
const MAX_DELAY: Duration = Duration::from_secs(60);
const STABLE_RESET_AFTER: Duration = Duration::from_secs(30);

/// Tracks supervised-restart backoff for a single engine lifetime. Doubles
/// the delay after each restart, caps at 60s, and resets to the base delay
/// once the engine has stayed `Running` for 30 continuous seconds.
#[derive(Debug, Clone)]
pub struct RestartBackoff {
  attempt: u32,
}

impl Default for RestartBackoff {
  fn default() -> Self {
    Self { attempt: 0 }
  }
}

impl RestartBackoff {
  pub fn new() -> Self {
    Self::default()
  }

  /// Delay to wait before the next restart attempt, then advances the
  /// internal attempt counter.
  pub fn next_delay(&mut self) -> Duration {
    let delay = BASE_DELAY.saturating_mul(BACKOFF_FACTOR.saturating_pow(self.attempt));
    self.attempt += 1;
    delay.min(MAX_DELAY)
  }

  /// Resets backoff after `stable_duration` of uninterrupted `Running`.
  pub fn observe_stability(&mut self, stable_duration: Duration) {
    if stable_duration >= STABLE_RESET_AFTER {
      self.attempt = 0;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn delay_doubles_and_caps_at_60s() {
    let mut backoff = RestartBackoff::new();
    assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    assert_eq!(backoff.next_delay(), Duration::from_secs(8));
    assert_eq!(backoff.next_delay(), Duration::from_secs(16));
    assert_eq!(backoff.next_delay(), Duration::from_secs(32));
    assert_eq!(backoff.next_delay(), Duration::from_secs(60));
    assert_eq!(backoff.next_delay(), Duration::from_secs(60));
  }

  #[test]
  fn stability_resets_backoff() {
    let mut backoff = RestartBackoff::new();
    backoff.next_delay();
    backoff.next_delay();
    backoff.observe_stability(Duration::from_secs(31));
    assert_eq!(backoff.next_delay(), Duration::from_secs(2));
  }

  #[test]
  fn brief_stability_does_not_reset_backoff() {
    let mut backoff = RestartBackoff::new();
    backoff.next_delay();
    backoff.next_delay();
    backoff.observe_stability(Duration::from_secs(5));
    assert_eq!(backoff.next_delay(), Duration::from_secs(8));
  }
}
