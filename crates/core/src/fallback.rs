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

//! Pure decision logic for how `start` responds to a failed attempt: which
//! band (if any) to retry on, whether to flip on the no-virtual-interface
//! workaround, and when to give up. Kept free of I/O so the whole policy
//! is covered by ordinary unit tests.

const MAX_ATTEMPTS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
  ApReadyTimeout,
  DriverRejectedChannel,
  /// Country code invalid, missing binary, or anything else no retry can
  /// fix.
  Fatal,
}

#[derive(Debug, Clone)]
pub struct AttemptContext {
  pub band: String,
  pub attempt_no: u8,
  pub used_optimized_no_virt: bool,
}

/// Channel/auto-select overrides a retry forces on the next attempt,
/// distinct from whatever the persisted config says. Only the 5ghz -> 2.4ghz
/// step currently forces anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelOverride {
  pub force_channel_auto_select: bool,
  pub force_channel_2g_fallback: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
  Retry {
    band: String,
    optimized_no_virt: bool,
    channel_override: ChannelOverride,
  },
  GiveUp,
}

pub fn decide_next(ctx: &AttemptContext, failure: AttemptFailure) -> NextAction {
  if failure == AttemptFailure::Fatal {
    return NextAction::GiveUp;
  }
  if ctx.attempt_no >= MAX_ATTEMPTS {
    return NextAction::GiveUp;
  }

  if failure == AttemptFailure::DriverRejectedChannel && !ctx.used_optimized_no_virt {
    return NextAction::Retry {
      band: ctx.band.clone(),
      optimized_no_virt: true,
      channel_override: ChannelOverride::default(),
    };
  }

  match ctx.band.as_str() {
    "6ghz" => NextAction::Retry {
      band: "5ghz".to_string(),
      optimized_no_virt: ctx.used_optimized_no_virt,
      channel_override: ChannelOverride::default(),
    },
    "5ghz" => NextAction::Retry {
      band: "2.4ghz".to_string(),
      optimized_no_virt: ctx.used_optimized_no_virt,
      // Driver rejection or timeout at 5ghz retries at 2.4ghz with the
      // channel forced to auto-select and the 2.4ghz fallback forced to
      // channel 6, regardless of what the persisted config says.
      channel_override: ChannelOverride {
        force_channel_auto_select: true,
        force_channel_2g_fallback: Some(6),
      },
    },
    _ => NextAction::GiveUp,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ctx(band: &str, attempt_no: u8, used_optimized_no_virt: bool) -> AttemptContext {
    AttemptContext {
      band: band.to_string(),
      attempt_no,
      used_optimized_no_virt,
    }
  }

  #[test]
  fn six_ghz_timeout_falls_back_to_5ghz() {
    let action = decide_next(&ctx("6ghz", 1, false), AttemptFailure::ApReadyTimeout);
    assert_eq!(
      action,
      NextAction::Retry {
        band: "5ghz".to_string(),
        optimized_no_virt: false,
        channel_override: ChannelOverride::default(),
      }
    );
  }

  #[test]
  fn five_ghz_timeout_falls_back_to_2_4ghz_forcing_auto_select_and_channel_6() {
    let action = decide_next(&ctx("5ghz", 2, false), AttemptFailure::ApReadyTimeout);
    assert_eq!(
      action,
      NextAction::Retry {
        band: "2.4ghz".to_string(),
        optimized_no_virt: false,
        channel_override: ChannelOverride {
          force_channel_auto_select: true,
          force_channel_2g_fallback: Some(6),
        },
      }
    );
  }

  #[test]
  fn driver_rejected_first_tries_optimized_no_virt_before_changing_band() {
    let action = decide_next(&ctx("5ghz", 1, false), AttemptFailure::DriverRejectedChannel);
    assert_eq!(
      action,
      NextAction::Retry {
        band: "5ghz".to_string(),
        optimized_no_virt: true,
        channel_override: ChannelOverride::default(),
      }
    );
  }

  #[test]
  fn driver_rejected_after_no_virt_already_tried_changes_band() {
    let action = decide_next(&ctx("5ghz", 2, true), AttemptFailure::DriverRejectedChannel);
    assert_eq!(
      action,
      NextAction::Retry {
        band: "2.4ghz".to_string(),
        optimized_no_virt: true,
        channel_override: ChannelOverride {
          force_channel_auto_select: true,
          force_channel_2g_fallback: Some(6),
        },
      }
    );
  }

  #[test]
  fn fatal_failure_never_retries() {
    assert_eq!(decide_next(&ctx("6ghz", 1, false), AttemptFailure::Fatal), NextAction::GiveUp);
  }

  #[test]
  fn gives_up_at_attempt_cap() {
    let action = decide_next(&ctx("2.4ghz", 3, false), AttemptFailure::ApReadyTimeout);
    assert_eq!(action, NextAction::GiveUp);
  }

  #[test]
  fn two_point_four_ghz_timeout_has_nowhere_left_to_fall_back() {
    let action = decide_next(&ctx("2.4ghz", 1, false), AttemptFailure::ApReadyTimeout);
    assert_eq!(action, NextAction::GiveUp);
  }
}
