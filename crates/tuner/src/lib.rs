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

//! Host-level knobs applied alongside a running access point: Wi-Fi power
//! save, USB autosuspend, CPU governor, a sysctl block, and CPU/IRQ
//! affinity. Every knob records how to put the host back the way it was;
//! failures are non-fatal and surface as warnings instead of aborting
//! the whole attempt.

use std::fs;
use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;
use tracing::warn;
use vrhotspot_platform::CommandRunner;
use vrhotspot_types::RevertAction;

const SYSCTL_SETTINGS: &[(&str, &str)] = &[
  ("net.core.rmem_max", "4194304"),
  ("net.core.wmem_max", "4194304"),
  ("net.core.netdev_max_backlog", "2000"),
  ("net.ipv4.tcp_low_latency", "1"),
];

/// Applies every enabled knob, returning the actions needed to revert them
/// plus any non-fatal warnings accumulated along the way.
pub struct TuningPlan {
  pub wifi_power_save_disable: bool,
  pub usb_autosuspend_disable: bool,
  pub cpu_governor_performance: bool,
  pub sysctl_tuning: bool,
  pub cpu_affinity_mask: Option<u64>,
  pub irq_affinity_mask: Option<u64>,
  pub ap_ifname: String,
}

pub fn apply(plan: &TuningPlan, runner: &dyn CommandRunner) -> (Vec<RevertAction>, Vec<String>) {
  let mut actions = Vec::new();
  let mut warnings = Vec::new();

  if plan.wifi_power_save_disable {
    apply_wifi_power_save(&plan.ap_ifname, runner, &mut actions, &mut warnings);
  }
  if plan.usb_autosuspend_disable {
    apply_usb_autosuspend(&mut actions, &mut warnings);
  }
  if plan.cpu_governor_performance {
    apply_cpu_governor(&mut actions, &mut warnings);
  }
  if plan.sysctl_tuning {
    apply_sysctl(runner, &mut actions, &mut warnings);
  }
  if let Some(mask) = plan.cpu_affinity_mask {
    apply_cpu_affinity(mask, &mut actions, &mut warnings);
  }
  if let Some(mask) = plan.irq_affinity_mask {
    apply_irq_affinity(&plan.ap_ifname, mask, &mut actions, &mut warnings);
  }

  (actions, warnings)
}

fn cpuset_to_mask(set: &CpuSet) -> u64 {
  let mut mask = 0u64;
  for cpu in 0..64 {
    if set.is_set(cpu).unwrap_or(false) {
      mask |= 1 << cpu;
    }
  }
  mask
}

fn mask_to_cpuset(mask: u64) -> CpuSet {
  let mut set = CpuSet::new();
  for cpu in 0..64 {
    if mask & (1 << cpu) != 0 {
      let _ = set.set(cpu);
    }
  }
  set
}

fn apply_cpu_affinity(mask: u64, actions: &mut Vec<RevertAction>, warnings: &mut Vec<String>) {
  let previous_mask = match sched_getaffinity(Pid::from_raw(0)) {
    Ok(set) => cpuset_to_mask(&set),
    Err(e) => {
      warn!(?e, "failed to read current cpu affinity");
      warnings.push("tuning_partially_applied: cpu_affinity".to_string());
      return;
    }
  };
  match sched_setaffinity(Pid::from_raw(0), &mask_to_cpuset(mask)) {
    Ok(()) => actions.push(RevertAction::CpuAffinity { previous_mask }),
    Err(e) => {
      warn!(?e, "failed to set cpu affinity");
      warnings.push("tuning_partially_applied: cpu_affinity".to_string());
    }
  }
}

fn read_irq_number(ifname: &str) -> Option<u32> {
  let path = format!("/sys/class/net/{ifname}/device/irq");
  fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn apply_irq_affinity(ifname: &str, mask: u64, actions: &mut Vec<RevertAction>, warnings: &mut Vec<String>) {
  let Some(irq) = read_irq_number(ifname) else {
    warnings.push(format!("tuning_partially_applied: irq_affinity:{ifname}"));
    return;
  };
  let path = format!("/proc/irq/{irq}/smp_affinity");
  let Some(previous_mask) = fs::read_to_string(&path).ok().map(|s| s.trim().to_string()) else {
    warnings.push(format!("tuning_partially_applied: irq_affinity:{irq}"));
    return;
  };
  if fs::write(&path, format!("{mask:x}\n")).is_ok() {
    actions.push(RevertAction::IrqAffinity { irq, previous_mask });
  } else {
    warnings.push(format!("tuning_partially_applied: irq_affinity:{irq}"));
  }
}

fn apply_wifi_power_save(
  ifname: &str,
  runner: &dyn CommandRunner,
  actions: &mut Vec<RevertAction>,
  warnings: &mut Vec<String>,
) {
  let previous = runner
    .run("iw", &["dev", ifname, "get", "power_save"])
    .ok()
    .map(|out| {
      if out.stdout_utf8().contains("on") {
        "on".to_string()
      } else {
        "off".to_string()
      }
    });

  match runner.run("iw", &["dev", ifname, "set", "power_save", "off"]) {
    Ok(out) if out.status_success => {
      actions.push(RevertAction::SysfsValue {
        path: format!("iw:{ifname}:power_save"),
        previous,
      });
    }
    _ => {
      warn!(ifname, "failed to disable wifi power save");
      warnings.push("tuning_partially_applied: wifi_power_save_disable".to_string());
    }
  }
}

fn apply_usb_autosuspend(actions: &mut Vec<RevertAction>, warnings: &mut Vec<String>) {
  let Ok(entries) = fs::read_dir("/sys/bus/usb/devices") else {
    warnings.push("tuning_partially_applied: usb_autosuspend_disable".to_string());
    return;
  };
  for entry in entries.flatten() {
    let control_path = entry.path().join("power/control");
    if !control_path.exists() {
      continue;
    }
    let previous = fs::read_to_string(&control_path).ok().map(|s| s.trim().to_string());
    if fs::write(&control_path, "on").is_ok() {
      actions.push(RevertAction::SysfsValue {
        path: control_path.display().to_string(),
        previous,
      });
    } else {
      warnings.push(format!(
        "tuning_partially_applied: usb_autosuspend_disable:{}",
        control_path.display()
      ));
    }
  }
}

fn apply_cpu_governor(actions: &mut Vec<RevertAction>, warnings: &mut Vec<String>) {
  let Ok(entries) = fs::read_dir("/sys/devices/system/cpu") else {
    warnings.push("tuning_partially_applied: cpu_governor_performance".to_string());
    return;
  };
  for entry in entries.flatten() {
    let name = entry.file_name();
    let name = name.to_string_lossy();
    let Some(cpu_num) = name.strip_prefix("cpu").and_then(|n| n.parse::<u32>().ok()) else {
      continue;
    };
    let governor_path = entry.path().join("cpufreq/scaling_governor");
    if !governor_path.exists() {
      continue;
    }
    let previous = fs::read_to_string(&governor_path).unwrap_or_default().trim().to_string();
    if fs::write(&governor_path, "performance").is_ok() {
      actions.push(RevertAction::CpuGovernor {
        cpu: cpu_num,
        previous,
      });
    } else {
      warnings.push(format!("tuning_partially_applied: cpu_governor_performance:cpu{cpu_num}"));
    }
  }
}

fn apply_sysctl(runner: &dyn CommandRunner, actions: &mut Vec<RevertAction>, warnings: &mut Vec<String>) {
  for (key, value) in SYSCTL_SETTINGS {
    let previous = runner
      .run("sysctl", &["-n", key])
      .ok()
      .map(|out| out.stdout_utf8().trim().to_string());

    match runner.run("sysctl", &["-w", &format!("{key}={value}")]) {
      Ok(out) if out.status_success => {
        actions.push(RevertAction::SysctlValue {
          key: key.to_string(),
          previous,
        });
      }
      _ => warnings.push(format!("tuning_partially_applied: sysctl:{key}")),
    }
  }
}

/// Reverts each action best-effort, in the order handed to it (callers pass
/// the ledger's LIFO drain order). Never aborts on an individual failure.
pub fn revert_one(action: RevertAction, runner: &dyn CommandRunner) -> Option<String> {
  match action {
    RevertAction::SysfsValue { path, previous } => {
      if let Some(ifname_key) = path.strip_prefix("iw:").and_then(|rest| rest.split(':').next()) {
        let value = previous.unwrap_or_else(|| "on".to_string());
        let ok = runner
          .run("iw", &["dev", ifname_key, "set", "power_save", &value])
          .map(|o| o.status_success)
          .unwrap_or(false);
        if !ok {
          return Some(format!("firewall_revert_incomplete: {path}"));
        }
      } else if let Some(previous) = previous {
        if fs::write(&path, previous).is_err() {
          return Some(format!("tuning_revert_incomplete: {path}"));
        }
      }
      None
    }
    RevertAction::CpuGovernor { cpu, previous } => {
      let path = format!("/sys/devices/system/cpu/cpu{cpu}/cpufreq/scaling_governor");
      if fs::write(&path, previous).is_err() {
        Some(format!("tuning_revert_incomplete: {path}"))
      } else {
        None
      }
    }
    RevertAction::SysctlValue { key, previous } => {
      let Some(previous) = previous else { return None };
      let ok = runner
        .run("sysctl", &["-w", &format!("{key}={previous}")])
        .map(|o| o.status_success)
        .unwrap_or(false);
      if !ok {
        Some(format!("tuning_revert_incomplete: {key}"))
      } else {
        None
      }
    }
    RevertAction::CpuAffinity { previous_mask } => {
      match sched_setaffinity(Pid::from_raw(0), &mask_to_cpuset(previous_mask)) {
        Ok(()) => None,
        Err(_) => Some("tuning_revert_incomplete: cpu_affinity".to_string()),
      }
    }
    RevertAction::IrqAffinity { irq, previous_mask } => {
      let path = format!("/proc/irq/{irq}/smp_affinity");
      if fs::write(&path, format!("{previous_mask}\n")).is_err() {
        Some(format!("tuning_revert_incomplete: {path}"))
      } else {
        None
      }
    }
    other => {
      warn!(?other, "revert_one called with an action outside the tuner's scope");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use vrhotspot_platform::runner::CommandOutput;

  struct FakeRunner;
  impl CommandRunner for FakeRunner {
    fn run(&self, _program: &str, _args: &[&str]) -> Result<CommandOutput, vrhotspot_platform::PlatformError> {
      Ok(CommandOutput {
        status_success: true,
        stdout: b"off\n".to_vec(),
        stderr: Vec::new(),
      })
    }
  }

  #[test]
  fn apply_records_wifi_power_save_action() {
    let plan = TuningPlan {
      wifi_power_save_disable: true,
      usb_autosuspend_disable: false,
      cpu_governor_performance: false,
      sysctl_tuning: false,
      cpu_affinity_mask: None,
      irq_affinity_mask: None,
      ap_ifname: "wlan0".to_string(),
    };
    let (actions, warnings) = apply(&plan, &FakeRunner);
    assert_eq!(actions.len(), 1);
    assert!(warnings.is_empty());
  }

  #[test]
  fn apply_sysctl_records_one_action_per_setting() {
    let plan = TuningPlan {
      wifi_power_save_disable: false,
      usb_autosuspend_disable: false,
      cpu_governor_performance: false,
      sysctl_tuning: true,
      cpu_affinity_mask: None,
      irq_affinity_mask: None,
      ap_ifname: "wlan0".to_string(),
    };
    let (actions, warnings) = apply(&plan, &FakeRunner);
    assert_eq!(actions.len(), SYSCTL_SETTINGS.len());
    assert!(warnings.is_empty());
  }

  #[test]
  fn cpu_affinity_mask_is_applied_and_revert_restores_the_prior_mask() {
    let plan = TuningPlan {
      wifi_power_save_disable: false,
      usb_autosuspend_disable: false,
      cpu_governor_performance: false,
      sysctl_tuning: false,
      cpu_affinity_mask: Some(0b1),
      irq_affinity_mask: None,
      ap_ifname: "wlan0".to_string(),
    };
    let (actions, warnings) = apply(&plan, &FakeRunner);
    assert_eq!(actions.len(), 1);
    assert!(warnings.is_empty());
    for action in actions {
      assert!(revert_one(action, &FakeRunner).is_none());
    }
  }

  #[test]
  fn irq_affinity_without_a_backing_device_warns_instead_of_touching_the_host() {
    let plan = TuningPlan {
      wifi_power_save_disable: false,
      usb_autosuspend_disable: false,
      cpu_governor_performance: false,
      sysctl_tuning: false,
      cpu_affinity_mask: None,
      irq_affinity_mask: Some(0b0101),
      ap_ifname: "vrhotspot-test-nonexistent0".to_string(),
    };
    let (actions, warnings) = apply(&plan, &FakeRunner);
    assert!(actions.is_empty());
    assert_eq!(warnings.len(), 1);
  }
}
