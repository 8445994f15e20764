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

//! Spawns and supervises the hostapd/dnsmasq process pair that back a
//! running access point, and classifies how they exit.

mod render;
mod ring;
mod vendor;

pub use vendor::find_binary;

use ring::{shared_ring, SharedRing};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};
use vrhotspot_types::{ApSecurity, BridgeConfig};

const TAIL_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineBackend {
  /// 2.4/5GHz with a locally-owned subnet and NAT hooks applied by the
  /// firewall crate.
  Orchestrator,
  /// 6GHz WPA3-SAE. NAT hooks are skipped when a zone-based firewall
  /// manager already owns forwarding for the zone.
  Direct6Ghz,
  /// Kernel bridge into an existing uplink segment. No local DHCP, no
  /// NAT: clients are first-class members of the uplink's subnet.
  Bridge,
}

impl EngineBackend {
  pub fn choose(band: &str, bridge_mode: bool) -> Self {
    if bridge_mode {
      EngineBackend::Bridge
    } else if band == "6ghz" {
      EngineBackend::Direct6Ghz
    } else {
      EngineBackend::Orchestrator
    }
  }

  pub fn needs_local_dhcp(&self) -> bool {
    !matches!(self, EngineBackend::Bridge)
  }
}

/// Everything the engine needs to render configs and spawn processes. Carries
/// the real passphrase in memory only long enough to render `hostapd.conf`.
#[derive(Debug, Clone)]
pub struct EnginePlan {
  pub ifname: String,
  pub ssid: String,
  pub passphrase: Option<String>,
  pub security: ApSecurity,
  pub band: String,
  pub channel: u32,
  pub channel_width_mhz: u16,
  pub country: String,
  pub ieee80211d: bool,
  pub gateway_ip: String,
  pub dhcp_start_ip: String,
  pub dhcp_end_ip: String,
  pub dhcp_dns: String,
  pub bridge: BridgeConfig,
  pub app_root: PathBuf,
  pub vendored_binaries_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
  Clean,
  Signal(i32),
  CrashEarly,
  CrashLate,
  DriverRejectedChannel,
  DependencyMissing,
  Unknown,
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("required binary `{0}` was not found (vendored or on $PATH)")]
  MissingBinary(String),
  #[error("failed to spawn `{program}`: {source}")]
  Spawn { program: String, source: io::Error },
  #[error("engine is not running")]
  NotRunning,
}

struct Supervised {
  child: Child,
  argv: Vec<String>,
  stdout_ring: SharedRing,
  stderr_ring: SharedRing,
  spawned_at: Instant,
}

fn spawn_supervised(program: PathBuf, args: Vec<String>) -> Result<Supervised, EngineError> {
  let argv_redacted = std::iter::once(program.display().to_string())
    .chain(args.iter().cloned())
    .collect::<Vec<_>>();

  let mut command = Command::new(&program);
  command
    .args(&args)
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);
  // Each child gets its own process group (pgid == its own pid) so `stop`
  // can signal the whole tree a misbehaving hostapd/dnsmasq may have forked,
  // not just the direct child.
  #[cfg(unix)]
  command.process_group(0);

  let mut child = command.spawn().map_err(|source| EngineError::Spawn {
    program: program.display().to_string(),
    source,
  })?;

  let stdout_ring = shared_ring(TAIL_CAPACITY);
  let stderr_ring = shared_ring(TAIL_CAPACITY);

  if let Some(stdout) = child.stdout.take() {
    let ring = stdout_ring.clone();
    tokio::spawn(pump_lines(stdout, ring));
  }
  if let Some(stderr) = child.stderr.take() {
    let ring = stderr_ring.clone();
    tokio::spawn(pump_lines(stderr, ring));
  }

  Ok(Supervised {
    child,
    argv: argv_redacted,
    stdout_ring,
    stderr_ring,
    spawned_at: Instant::now(),
  })
}

async fn pump_lines(reader: impl tokio::io::AsyncRead + Unpin, ring: SharedRing) {
  let mut lines = BufReader::new(reader).lines();
  loop {
    match lines.next_line().await {
      Ok(Some(line)) => {
        if let Ok(mut r) = ring.lock() {
          r.push_line(line);
        }
      }
      _ => break,
    }
  }
}

/// A running (or recently-exited) AP process tree: hostapd, plus dnsmasq
/// when the chosen backend owns a local subnet.
pub struct EngineHandle {
  backend: EngineBackend,
  discovered_config_dir: PathBuf,
  ap: Supervised,
  dhcp: Option<Supervised>,
}

impl EngineHandle {
  /// Writes configs to a fresh temp dir and spawns hostapd (and dnsmasq,
  /// unless the backend is `Bridge`).
  pub async fn spawn(plan: &EnginePlan, backend: EngineBackend) -> Result<Self, EngineError> {
    let config_dir = std::env::temp_dir().join(format!("vrhotspot-{}", plan.ifname));
    std::fs::create_dir_all(&config_dir).map_err(|source| EngineError::Spawn {
      program: "mkdir".to_string(),
      source,
    })?;

    let hostapd_path = config_dir.join("hostapd.conf");
    std::fs::write(&hostapd_path, render::hostapd_conf(plan)).map_err(|source| {
      EngineError::Spawn {
        program: "hostapd.conf".to_string(),
        source,
      }
    })?;

    let hostapd_bin = find_binary(&plan.app_root, "hostapd", plan.vendored_binaries_only)
      .ok_or_else(|| EngineError::MissingBinary("hostapd".to_string()))?;

    let ap = spawn_supervised(hostapd_bin, vec![hostapd_path.display().to_string()])?;
    info!(ifname = %plan.ifname, backend = ?backend, "ap process spawned");

    let dhcp = if backend.needs_local_dhcp() {
      let dnsmasq_path = config_dir.join("dnsmasq.conf");
      std::fs::write(&dnsmasq_path, render::dnsmasq_conf(plan)).map_err(|source| {
        EngineError::Spawn {
          program: "dnsmasq.conf".to_string(),
          source,
        }
      })?;
      let dnsmasq_bin = find_binary(&plan.app_root, "dnsmasq", plan.vendored_binaries_only)
        .ok_or_else(|| EngineError::MissingBinary("dnsmasq".to_string()))?;
      Some(spawn_supervised(
        dnsmasq_bin,
        vec![format!("--conf-file={}", dnsmasq_path.display()), "--keep-in-foreground".to_string()],
      )?)
    } else {
      None
    };

    Ok(Self {
      backend,
      discovered_config_dir: config_dir,
      ap,
      dhcp,
    })
  }

  pub fn backend(&self) -> EngineBackend {
    self.backend
  }

  pub fn discovered_config_dir(&self) -> &std::path::Path {
    &self.discovered_config_dir
  }

  pub fn pid(&self) -> Option<u32> {
    self.ap.child.id()
  }

  pub fn argv(&self) -> &[String] {
    &self.ap.argv
  }

  pub fn is_alive(&mut self) -> bool {
    matches!(self.ap.child.try_wait(), Ok(None))
  }

  pub fn tail_logs(&self) -> (Vec<String>, Vec<String>) {
    let out = self.ap.stdout_ring.lock().map(|r| r.snapshot()).unwrap_or_default();
    let err = self.ap.stderr_ring.lock().map(|r| r.snapshot()).unwrap_or_default();
    (out, err)
  }

  /// Sends SIGTERM, waits up to `grace` for a clean exit, then SIGKILLs
  /// whatever is left. Stops dnsmasq first so the AP interface keeps
  /// answering DHCP for stragglers slightly longer.
  pub async fn stop(mut self, grace: Duration) {
    if let Some(mut dhcp) = self.dhcp.take() {
      terminate(&mut dhcp.child, grace).await;
    }
    terminate(&mut self.ap.child, grace).await;
  }

  /// Classifies how the AP process exited. `None` while still running.
  pub async fn exit_reason(&mut self) -> Option<ExitClass> {
    let status = match self.ap.child.try_wait() {
      Ok(Some(status)) => status,
      _ => return None,
    };
    let elapsed = self.ap.spawned_at.elapsed();
    let (_, stderr_tail) = self.tail_logs();
    Some(classify_exit(status, &stderr_tail, elapsed))
  }
}

/// Signals the child's whole process group (negative pid), not just the
/// direct child, since `spawn_supervised` gives each child its own pgid.
async fn terminate(child: &mut Child, grace: Duration) {
  let pid = child.id();
  if let Some(pid) = pid {
    #[cfg(unix)]
    unsafe {
      libc::kill(-(pid as i32), libc::SIGTERM);
    }
  }
  let deadline = Instant::now() + grace;
  loop {
    match child.try_wait() {
      Ok(Some(_)) => return,
      _ if Instant::now() >= deadline => {
        warn!(pid = ?pid, "process group did not exit within grace period, sending SIGKILL");
        if let Some(pid) = pid {
          #[cfg(unix)]
          unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
          }
        }
        let _ = child.kill().await;
        let _ = child.wait().await;
        return;
      }
      _ => tokio::time::sleep(Duration::from_millis(50)).await,
    }
  }
}

fn classify_exit(status: std::process::ExitStatus, stderr_tail: &[String], elapsed: Duration) -> ExitClass {
  #[cfg(unix)]
  {
    use std::os::unix::process::ExitStatusExt;
    if let Some(sig) = status.signal() {
      return ExitClass::Signal(sig);
    }
  }
  if status.success() {
    return ExitClass::Clean;
  }
  let joined = stderr_tail.join("\n");
  if joined.contains("Could not set channel") || joined.contains("Invalid channel") {
    return ExitClass::DriverRejectedChannel;
  }
  if joined.contains("error while loading shared libraries") || joined.contains("cannot open shared object file") {
    return ExitClass::DependencyMissing;
  }
  if elapsed < Duration::from_secs(2) {
    return ExitClass::CrashEarly;
  }
  if status.code().is_some() {
    ExitClass::CrashLate
  } else {
    ExitClass::Unknown
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backend_choice_prefers_bridge_then_6ghz_then_orchestrator() {
    assert_eq!(EngineBackend::choose("5ghz", true), EngineBackend::Bridge);
    assert_eq!(EngineBackend::choose("6ghz", false), EngineBackend::Direct6Ghz);
    assert_eq!(EngineBackend::choose("2.4ghz", false), EngineBackend::Orchestrator);
  }

  #[test]
  fn bridge_backend_skips_local_dhcp() {
    assert!(!EngineBackend::Bridge.needs_local_dhcp());
    assert!(EngineBackend::Orchestrator.needs_local_dhcp());
  }

  #[cfg(unix)]
  fn failure_status() -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(256) // exit code 1
  }

  #[cfg(unix)]
  #[test]
  fn classify_driver_rejected_channel_from_stderr() {
    let class = classify_exit(
      failure_status(),
      &["Could not set channel 149".to_string()],
      Duration::from_secs(5),
    );
    assert_eq!(class, ExitClass::DriverRejectedChannel);
  }

  #[cfg(unix)]
  #[test]
  fn classify_early_crash_under_two_seconds() {
    let class = classify_exit(failure_status(), &[], Duration::from_millis(400));
    assert_eq!(class, ExitClass::CrashEarly);
  }

  #[cfg(unix)]
  #[test]
  fn classify_late_crash_after_two_seconds() {
    let class = classify_exit(failure_status(), &[], Duration::from_secs(5));
    assert_eq!(class, ExitClass::CrashLate);
  }

  #[cfg(unix)]
  #[test]
  fn classify_dependency_missing_from_stderr() {
    let class = classify_exit(
      failure_status(),
      &["error while loading shared libraries: libnl-3.so.200".to_string()],
      Duration::from_secs(5),
    );
    assert_eq!(class, ExitClass::DependencyMissing);
  }
}
