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
use thiserror::Error;

/// The `result_code` surfaced to the control plane. Mirrors every branch of
/// `LifecycleError` plus the success codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
  Started,
  StartedWithFallback,
  Stopped,
  Repaired,
  AlreadyRunning,
  AlreadyStopped,
  LifecycleBusy,

  ConfigInvalid,
  PassphraseNotSet,
  PassphraseInvalidLength,
  ConfirmationRequired,

  AdapterNotFound,
  AdapterNoApMode,
  NoSixGhzApAdapter,

  HostapdInvalidCountryCodeFor80211d,
  CountryNotSet,

  MissingBinary,
  DependencyMissing,
  EngineSpawnFailed,
  EngineCrashEarly,
  EngineCrashLate,
  DriverRejectedChannel,

  ApReadyTimeout,
  ApInterfaceNotUp,
  ApTypeMismatch,
  SsidNotAdvertised,

  FirewallApplyFailed,
  FirewallRevertIncomplete,

  TuningPartiallyApplied,
  InternalError,
}

/// Structured remediation detail attached to a `LifecycleError`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetail {
  pub title: String,
  pub remediation: Option<String>,
  pub errors: Vec<String>,
}

/// The single sum type every lifecycle failure path constructs. Carries a
/// `ResultCode`, an optional remediation detail, and the warnings
/// accumulated over the attempt(s) that produced it.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?}: {detail}", detail = .detail.title)]
pub struct LifecycleError {
  pub code: ResultCode,
  pub detail: ErrorDetail,
  #[serde(default)]
  pub warnings: Vec<String>,
}

impl LifecycleError {
  pub fn new(code: ResultCode, title: impl Into<String>) -> Self {
    Self {
      code,
      detail: ErrorDetail {
        title: title.into(),
        remediation: None,
        errors: Vec::new(),
      },
      warnings: Vec::new(),
    }
  }

  pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
    self.detail.remediation = Some(remediation.into());
    self
  }

  pub fn with_errors(mut self, errors: Vec<String>) -> Self {
    self.detail.errors = errors;
    self
  }

  pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
    self.warnings = warnings;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_chain_sets_fields() {
    let e = LifecycleError::new(ResultCode::ApReadyTimeout, "timed out")
      .with_remediation("try a different band")
      .with_warnings(vec!["fallback from 6ghz".to_string()]);
    assert_eq!(e.code, ResultCode::ApReadyTimeout);
    assert_eq!(e.detail.remediation.as_deref(), Some("try a different band"));
    assert_eq!(e.warnings.len(), 1);
  }
}
