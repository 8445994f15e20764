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

use crate::{ResultCode, Status};
use serde::{Deserialize, Serialize};

/// The uniform shape every control-plane operation returns. `result_code` is
/// always populated, on the success path and the failure path alike, so a
/// caller never has to separately unwrap an error to learn what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleResult {
  pub ok: bool,
  pub result_code: ResultCode,
  pub correlation_id: String,
  pub data: Status,
}

impl LifecycleResult {
  pub fn ok(result_code: ResultCode, correlation_id: impl Into<String>, data: Status) -> Self {
    Self {
      ok: true,
      result_code,
      correlation_id: correlation_id.into(),
      data,
    }
  }

  pub fn err(result_code: ResultCode, correlation_id: impl Into<String>, data: Status) -> Self {
    Self {
      ok: false,
      result_code,
      correlation_id: correlation_id.into(),
      data,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn err_always_carries_a_result_code() {
    let r = LifecycleResult::err(ResultCode::LifecycleBusy, "abc-123", Status::stopped());
    assert!(!r.ok);
    assert_eq!(r.result_code, ResultCode::LifecycleBusy);
  }
}
