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

/// One reversible host-state mutation recorded while `Start` progresses.
/// The lifecycle worker owns the ledger exclusively; it is never shared
/// across threads, so no locking primitive is needed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RevertAction {
  SysfsValue {
    path: String,
    previous: Option<String>,
  },
  CpuGovernor {
    cpu: u32,
    previous: String,
  },
  SysctlValue {
    key: String,
    previous: Option<String>,
  },
  CpuAffinity {
    previous_mask: u64,
  },
  IrqAffinity {
    irq: u32,
    previous_mask: String,
  },
  FirewallZoneMembership {
    ifname: String,
    previous_zone: Option<String>,
  },
  FirewallRule {
    tag: String,
    description: String,
  },
  SpawnedProcess {
    pid: u32,
    description: String,
  },
  InterfaceCreated {
    ifname: String,
  },
}

/// A stack of `RevertAction`s. `Stop`/`Repair` pop in reverse order
/// (strict LIFO), so a later tuning knob that depends on an earlier one
/// is always undone first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevertLedger {
  actions: Vec<RevertAction>,
}

impl RevertLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, action: RevertAction) {
    self.actions.push(action);
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  /// Drain the ledger in strict LIFO order, calling `f` on each action.
  /// `f` never raises: callers best-effort revert and collect warnings
  /// into the returned vec.
  pub fn drain_lifo<F>(&mut self, mut f: F) -> Vec<String>
  where
    F: FnMut(RevertAction) -> Option<String>,
  {
    let mut warnings = Vec::new();
    while let Some(action) = self.actions.pop() {
      if let Some(w) = f(action) {
        warnings.push(w);
      }
    }
    warnings
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn drain_is_strict_lifo() {
    let mut ledger = RevertLedger::new();
    ledger.push(RevertAction::SpawnedProcess {
      pid: 1,
      description: "first".to_string(),
    });
    ledger.push(RevertAction::SpawnedProcess {
      pid: 2,
      description: "second".to_string(),
    });

    let mut order = Vec::new();
    ledger.drain_lifo(|action| {
      if let RevertAction::SpawnedProcess { pid, .. } = action {
        order.push(pid);
      }
      None
    });
    assert_eq!(order, vec![2, 1]);
    assert!(ledger.is_empty());
  }

  #[test]
  fn drain_collects_warnings_without_aborting() {
    let mut ledger = RevertLedger::new();
    for i in 0..3 {
      ledger.push(RevertAction::SpawnedProcess {
        pid: i,
        description: "x".to_string(),
      });
    }
    let warnings = ledger.drain_lifo(|_| Some("best-effort failure".to_string()));
    assert_eq!(warnings.len(), 3);
    assert!(ledger.is_empty());
  }
}
