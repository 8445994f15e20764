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

//! The lifecycle state machine: `start`/`stop`/`repair`/`restart`, the
//! band fallback chain, and the status snapshot every other surface reads
//! from. A single async mutex serializes these four operations; reading
//! `status()` never blocks behind it. Every operation returns a
//! `LifecycleResult` rather than a bare `Result`, so a caller always gets a
//! `result_code` back, success or failure alike.

mod fallback;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};
use vrhotspot_adapters::AdapterError;
use vrhotspot_config::ConfigStore;
use vrhotspot_engine::{EngineBackend, EngineError, EngineHandle, EnginePlan, ExitClass};
use vrhotspot_firewall::{
  DirectBackend, FirewallBackend, FirewallProfile, FirewallToken, ZoneBackend,
};
use vrhotspot_platform::{CommandRunner, SystemCommandRunner};
use vrhotspot_probe::{wait_ready, ProbeError, ReadinessCheck};
use vrhotspot_telemetry::RestartBackoff;
use vrhotspot_tuner::TuningPlan;
use vrhotspot_types::{
  validate, Config, ConfigPatch, EngineStatus, ErrorDetail, FallbackReason, LifecycleError,
  LifecycleResult, Phase, PlatformSummary, ResultCode, RevertAction, RevertLedger, Status,
};

pub use fallback::{AttemptContext, AttemptFailure, ChannelOverride, NextAction};

const MIN_SUPERVISOR_TICK: Duration = Duration::from_millis(500);

struct RunningState {
  engine: EngineHandle,
  backend: EngineBackend,
  ifname: String,
  band: String,
  firewall: Option<(Box<dyn FirewallBackend + Send + Sync>, FirewallToken)>,
  ledger: RevertLedger,
  cancel_probe: watch::Sender<bool>,
  supervisor: tokio::task::JoinHandle<()>,
  backoff: RestartBackoff,
}

/// What `repair` needs to clean up host state that outlived the
/// `RunningState` it came from: recorded on every successful `start`,
/// consumed (and cleared) by the next `repair`.
struct CleanupInfo {
  config_dir: PathBuf,
  firewall_is_zone: bool,
  firewall_token: Option<FirewallToken>,
}

pub struct LifecycleCore {
  config_store: ConfigStore,
  app_root: PathBuf,
  status: RwLock<Arc<Status>>,
  serialize: Mutex<()>,
  running: Arc<Mutex<Option<RunningState>>>,
  last_cleanup: Mutex<Option<CleanupInfo>>,
}

impl LifecycleCore {
  pub fn new(state_dir: impl Into<PathBuf>, app_root: impl Into<PathBuf>) -> Arc<Self> {
    Arc::new(Self {
      config_store: ConfigStore::new(state_dir),
      app_root: app_root.into(),
      status: RwLock::new(Arc::new(Status::stopped())),
      serialize: Mutex::new(()),
      running: Arc::new(Mutex::new(None)),
      last_cleanup: Mutex::new(None),
    })
  }

  /// Cheap, lock-free-under-contention read of the last published
  /// snapshot. Never competes with `start`/`stop`/`repair`/`restart`.
  pub fn status(&self) -> Arc<Status> {
    self.status.read().clone()
  }

  pub fn config(&self) -> Config {
    self.config_store.load()
  }

  pub fn save_config(&self, patch: &ConfigPatch) -> Result<Config, vrhotspot_config::ConfigStoreError> {
    self.config_store.save(patch)
  }

  pub fn get_passphrase(&self, confirm: bool) -> Result<String, vrhotspot_config::ConfigStoreError> {
    self.config_store.get_passphrase(confirm)
  }

  fn publish(&self, status: Status) {
    *self.status.write() = Arc::new(status);
  }

  fn result_from_err(&self, err: LifecycleError, correlation_id: String) -> LifecycleResult {
    LifecycleResult::err(err.code, correlation_id, (*self.status()).clone())
  }

  /// Brings the access point up. Fails fast with `LifecycleBusy` if another
  /// `start`/`stop`/`repair`/`restart` is already in flight, rather than
  /// queuing behind it.
  pub async fn start(self: &Arc<Self>, overrides: Option<ConfigPatch>) -> LifecycleResult {
    let correlation_id = uuid::Uuid::new_v4().to_string();
    let _guard = match self.serialize.try_lock() {
      Ok(guard) => guard,
      Err(_) => {
        let err = LifecycleError::new(ResultCode::LifecycleBusy, "another lifecycle operation is in progress");
        return self.result_from_err(err, correlation_id);
      }
    };
    match self.start_locked(overrides, correlation_id.clone()).await {
      Ok(status) => LifecycleResult::ok(result_code_for_start(&status), correlation_id, (*status).clone()),
      Err(err) => self.result_from_err(err, correlation_id),
    }
  }

  async fn start_locked(
    self: &Arc<Self>,
    overrides: Option<ConfigPatch>,
    correlation_id: String,
  ) -> Result<Arc<Status>, LifecycleError> {
    if self.running.lock().await.is_some() {
      return Err(LifecycleError::new(ResultCode::AlreadyRunning, "hotspot already running"));
    }

    self.publish(Status {
      phase: Phase::Starting,
      last_op: Some("start".to_string()),
      last_correlation_id: Some(correlation_id.clone()),
      ..Status::stopped()
    });

    let config = match overrides {
      Some(patch) => match self.config_store.save(&patch) {
        Ok(c) => c,
        Err(e) => {
          let err = config_store_error(e);
          self.publish_error(&err, correlation_id);
          return Err(err);
        }
      },
      None => self.config_store.load(),
    };

    if let Some(err) = check_country_requirements(&config) {
      self.publish_error(&err, correlation_id);
      return Err(err);
    }

    let field_errors = validate(&config);
    if !field_errors.is_empty() {
      let err = LifecycleError::new(ResultCode::ConfigInvalid, "config record fails validation")
        .with_errors(field_errors.iter().map(|e| format!("{}: {}", e.field, e.message)).collect());
      self.publish_error(&err, correlation_id);
      return Err(err);
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::default());
    let facts = vrhotspot_platform::gather_platform_facts(runner.as_ref());
    let inventory = vrhotspot_adapters::snapshot(runner.as_ref());

    let mut warnings = inventory.warnings.clone();
    let mut band = config.band_preference.as_band_str().to_string();
    let mut optimized_no_virt = false;
    let mut fallback_reason = FallbackReason::None;
    let mut attempt_no: u8 = 0;
    let mut forced_channel_auto_select = false;
    let mut forced_channel_2g_fallback: Option<u8> = None;

    let running_state = loop {
      attempt_no += 1;

      let adapter = match vrhotspot_adapters::select_for(&inventory, &band, config.ap_adapter_ifname.as_deref()) {
        Ok(a) => a,
        Err(e) => {
          let err = adapter_error_to_lifecycle(e).with_warnings(warnings.clone());
          self.publish_error(&err, correlation_id);
          return Err(err);
        }
      };

      let backend = EngineBackend::choose(&band, config.bridge.bridge_mode);
      let mut ledger = RevertLedger::new();

      let tuning_plan = TuningPlan {
        wifi_power_save_disable: config.wifi_power_save_disable,
        usb_autosuspend_disable: config.usb_autosuspend_disable,
        cpu_governor_performance: config.cpu_governor_performance,
        sysctl_tuning: config.sysctl_tuning,
        cpu_affinity_mask: config.cpu_affinity_mask,
        irq_affinity_mask: config.irq_affinity_mask,
        ap_ifname: adapter.ifname.clone(),
      };
      let (tune_actions, tune_warnings) = vrhotspot_tuner::apply(&tuning_plan, runner.as_ref());
      for action in tune_actions {
        ledger.push(action);
      }
      warnings.extend(tune_warnings);

      let skip_nat = vrhotspot_firewall::should_skip_nat_hooks(
        facts.zone_firewall_active,
        matches!(backend, EngineBackend::Direct6Ghz),
      );
      let firewall = if config.firewall_enabled && !skip_nat && !matches!(backend, EngineBackend::Bridge) {
        let profile = FirewallProfile {
          ifname: adapter.ifname.clone(),
          uplink_ifname: facts.default_route_ifname.clone(),
          enable_masquerade: config.firewall_enable_masquerade,
          enable_forward: config.firewall_enable_forward,
          zone: config.firewall_zone.clone(),
        };
        let chosen: Box<dyn FirewallBackend + Send + Sync> = if facts.zone_firewall_active {
          Box::new(ZoneBackend)
        } else {
          Box::new(DirectBackend)
        };
        match chosen.apply(runner.as_ref(), &profile) {
          Ok(token) => Some((chosen, token)),
          Err(e) => {
            warn!(error = %e, "firewall apply failed, reverting tuning for this attempt");
            warnings.extend(revert_tuning(&mut ledger, runner.as_ref()));
            let err = LifecycleError::new(ResultCode::FirewallApplyFailed, e.to_string()).with_warnings(warnings.clone());
            self.publish_error(&err, correlation_id);
            return Err(err);
          }
        }
      } else {
        None
      };

      let channel = resolved_channel(
        &config,
        &band,
        forced_channel_auto_select,
        forced_channel_2g_fallback,
        runner.as_ref(),
        &adapter.ifname,
      );

      let plan = EnginePlan {
        ifname: adapter.ifname.clone(),
        ssid: config.ssid.clone(),
        passphrase: self.config_store.passphrase_for_engine(),
        security: config.ap_security,
        band: band.clone(),
        channel,
        channel_width_mhz: config.channel_width,
        country: config.country.clone(),
        ieee80211d: config.ieee80211d,
        gateway_ip: config.lan_gateway_ip.clone(),
        dhcp_start_ip: config.dhcp_start_ip.clone(),
        dhcp_end_ip: config.dhcp_end_ip.clone(),
        dhcp_dns: config.dhcp_dns.clone(),
        bridge: config.bridge.clone(),
        app_root: self.app_root.clone(),
        vendored_binaries_only: config.vendored_binaries_only,
      };

      let mut engine = match EngineHandle::spawn(&plan, backend).await {
        Ok(handle) => handle,
        Err(EngineError::MissingBinary(name)) => {
          warnings.extend(revert_attempt(&mut ledger, firewall, runner.as_ref()));
          let err = LifecycleError::new(ResultCode::MissingBinary, format!("required binary `{name}` not found"))
            .with_remediation("install hostapd/dnsmasq or place them under vendor/bin")
            .with_warnings(warnings.clone());
          self.publish_error(&err, correlation_id);
          return Err(err);
        }
        Err(e) => {
          warnings.extend(revert_attempt(&mut ledger, firewall, runner.as_ref()));
          let err = LifecycleError::new(ResultCode::EngineSpawnFailed, e.to_string()).with_warnings(warnings.clone());
          self.publish_error(&err, correlation_id);
          return Err(err);
        }
      };
      ledger.push(RevertAction::SpawnedProcess {
        pid: engine.pid().unwrap_or(0),
        description: format!("{backend:?}"),
      });

      let (cancel_tx, cancel_rx) = watch::channel(false);
      let check = ReadinessCheck {
        ifname: adapter.ifname.clone(),
        ssid: config.ssid.clone(),
        control_socket_dir: PathBuf::from("/var/run/hostapd"),
      };
      let timeout = Duration::from_secs_f64(config.ap_ready_timeout_s);
      let ready = wait_ready(&check, runner.as_ref(), || engine.is_alive(), timeout, cancel_rx).await;

      match ready {
        Ok(()) => {
          info!(ifname = %adapter.ifname, band = %band, attempt_no, "access point ready");
          break RunningState {
            engine,
            backend,
            ifname: adapter.ifname.clone(),
            band: band.clone(),
            firewall,
            ledger,
            cancel_probe: cancel_tx,
            supervisor: spawn_noop_supervisor(),
            backoff: RestartBackoff::new(),
          };
        }
        Err(probe_err) => {
          let exit_class = engine.exit_reason().await;
          let classification = classify_failure(probe_err, exit_class);
          let failure = classification.attempt;

          engine.stop(Duration::from_secs(2)).await;
          warnings.extend(revert_attempt(&mut ledger, firewall, runner.as_ref()));

          if failure == fallback::AttemptFailure::Fatal {
            let err = LifecycleError::new(classification.code, "access point failed to become ready")
              .with_warnings(warnings.clone());
            self.publish_error(&err, correlation_id);
            return Err(err);
          }

          let ctx = fallback::AttemptContext {
            band: band.clone(),
            attempt_no,
            used_optimized_no_virt: optimized_no_virt,
          };
          match fallback::decide_next(&ctx, failure) {
            fallback::NextAction::Retry {
              band: next_band,
              optimized_no_virt: next_novirt,
              channel_override,
            } => {
              fallback_reason = fallback_reason_for(&band, &next_band, failure);
              warn!(from = %band, to = %next_band, ?failure, "retrying start with fallback");
              band = next_band;
              optimized_no_virt = next_novirt;
              forced_channel_auto_select = channel_override.force_channel_auto_select;
              forced_channel_2g_fallback = channel_override.force_channel_2g_fallback;
              continue;
            }
            fallback::NextAction::GiveUp => {
              let err = LifecycleError::new(classification.code, "exhausted fallback attempts").with_warnings(warnings.clone());
              self.publish_error(&err, correlation_id);
              return Err(err);
            }
          }
        }
      }
    };

    let ifname_for_status = running_state.ifname.clone();
    let selected_channel = resolved_channel(
      &config,
      &band,
      forced_channel_auto_select,
      forced_channel_2g_fallback,
      runner.as_ref(),
      &ifname_for_status,
    );
    let status = Status {
      running: true,
      phase: Phase::Running,
      adapter: Some(ifname_for_status.clone()),
      ap_interface: Some(ifname_for_status.clone()),
      band: Some(band.clone()),
      mode: Some(format!("{:?}", running_state.backend)),
      channel_width_mhz: Some(config.channel_width),
      selected_band: Some(band.clone()),
      selected_width_mhz: Some(config.channel_width),
      selected_channel: Some(selected_channel),
      selected_country: Some(config.country.clone()),
      fallback_reason,
      last_op: Some("start".to_string()),
      last_op_ts: Some(now_unix()),
      last_correlation_id: Some(correlation_id),
      last_error: None,
      last_error_detail: None,
      engine: Some(EngineStatus {
        pid: running_state.engine.pid(),
        cmd: running_state.engine.argv().to_vec(),
        stdout_tail: running_state.engine.tail_logs().0,
        stderr_tail: running_state.engine.tail_logs().1,
        ap_logs_tail: Vec::new(),
      }),
      telemetry: Default::default(),
      warnings,
      platform: PlatformSummary {
        os_label: facts.os_label.clone(),
        zone_firewall_active: facts.zone_firewall_active,
        vendored_only: config.vendored_binaries_only,
      },
    };
    self.publish(status);

    *self.last_cleanup.lock().await = Some(CleanupInfo {
      config_dir: running_state.engine.discovered_config_dir().to_path_buf(),
      firewall_is_zone: facts.zone_firewall_active,
      firewall_token: running_state.firewall.as_ref().map(|(_, token)| token.clone()),
    });

    let supervisor = self.spawn_supervisor(
      ifname_for_status,
      config.ssid.clone(),
      config.telemetry_enable,
      Duration::from_secs_f64(config.telemetry_interval_s),
      config.watchdog_enable,
      Duration::from_secs_f64(config.watchdog_interval_s),
      runner,
    );

    let mut running_state = running_state;
    running_state.supervisor = supervisor;
    *self.running.lock().await = Some(running_state);

    Ok(self.status())
  }

  /// Tears the access point down. Unlike `start`, a `stop` that arrives
  /// while a `start` is in progress waits for that `start` to reach a
  /// terminal state rather than failing fast, so a caller's teardown
  /// request is never silently dropped.
  pub async fn stop(self: &Arc<Self>, grace: Duration) -> LifecycleResult {
    let correlation_id = uuid::Uuid::new_v4().to_string();
    let _guard = self.serialize.lock().await;
    match self.stop_locked(grace, correlation_id.clone()).await {
      Ok(status) => LifecycleResult::ok(ResultCode::Stopped, correlation_id, (*status).clone()),
      Err(err) => self.result_from_err(err, correlation_id),
    }
  }

  async fn stop_locked(self: &Arc<Self>, grace: Duration, correlation_id: String) -> Result<Arc<Status>, LifecycleError> {
    let running = self.running.lock().await.take();
    let Some(running) = running else {
      return Err(LifecycleError::new(ResultCode::AlreadyStopped, "hotspot already stopped"));
    };

    self.publish(Status {
      phase: Phase::Stopping,
      last_op: Some("stop".to_string()),
      last_correlation_id: Some(correlation_id.clone()),
      ..(*self.status()).clone()
    });

    running.supervisor.abort();
    let _ = running.cancel_probe.send(true);

    let runner = SystemCommandRunner::default();
    let mut ledger = running.ledger;
    let mut warnings = revert_tuning(&mut ledger, &runner);
    if let Some((backend, token)) = running.firewall {
      warnings.extend(backend.revert(&runner, token));
    }
    running.engine.stop(grace).await;

    self.publish(Status {
      last_op: Some("stop".to_string()),
      last_op_ts: Some(now_unix()),
      last_correlation_id: Some(correlation_id),
      warnings,
      ..Status::stopped()
    });
    Ok(self.status())
  }

  pub async fn restart(self: &Arc<Self>) -> LifecycleResult {
    let correlation_id = uuid::Uuid::new_v4().to_string();
    let _guard = match self.serialize.try_lock() {
      Ok(guard) => guard,
      Err(_) => {
        let err = LifecycleError::new(ResultCode::LifecycleBusy, "another lifecycle operation is in progress");
        return self.result_from_err(err, correlation_id);
      }
    };
    if self.running.lock().await.is_some() {
      if let Err(err) = self.stop_locked(Duration::from_secs(5), correlation_id.clone()).await {
        return self.result_from_err(err, correlation_id);
      }
    }
    match self.start_locked(None, correlation_id.clone()).await {
      Ok(status) => LifecycleResult::ok(result_code_for_start(&status), correlation_id, (*status).clone()),
      Err(err) => self.result_from_err(err, correlation_id),
    }
  }

  /// Best-effort recovery. Stops whatever is tracked as running the same
  /// way `stop` does, then goes further than `stop` ever does: kills any
  /// hostapd/dnsmasq left behind by a previous crash, deletes the runtime
  /// config dir the last successful `start` wrote, and strips any firewall
  /// artifacts still tagged from that attempt. Always ends in `Stopped` —
  /// unlike `restart`, `repair` never brings the access point back up.
  pub async fn repair(self: &Arc<Self>) -> LifecycleResult {
    let correlation_id = uuid::Uuid::new_v4().to_string();
    let _guard = match self.serialize.try_lock() {
      Ok(guard) => guard,
      Err(_) => {
        let err = LifecycleError::new(ResultCode::LifecycleBusy, "another lifecycle operation is in progress");
        return self.result_from_err(err, correlation_id);
      }
    };

    if self.running.lock().await.is_some() {
      if let Err(e) = self.stop_locked(Duration::from_secs(5), correlation_id.clone()).await {
        warn!(error = %e, "repair: stop-equivalent phase failed, continuing with best-effort cleanup");
      }
    }

    let mut warnings = self.status().warnings.clone();
    let runner = SystemCommandRunner::default();
    warnings.extend(cleanup_stray_processes(&runner));

    if let Some(cleanup) = self.last_cleanup.lock().await.take() {
      cleanup_config_dir(&cleanup.config_dir, &mut warnings);
      if let Some(token) = cleanup.firewall_token {
        let backend: Box<dyn FirewallBackend + Send + Sync> = if cleanup.firewall_is_zone {
          Box::new(ZoneBackend)
        } else {
          Box::new(DirectBackend)
        };
        warnings.extend(backend.revert(&runner, token));
      }
    }

    self.publish(Status {
      last_op: Some("repair".to_string()),
      last_op_ts: Some(now_unix()),
      last_correlation_id: Some(correlation_id.clone()),
      warnings,
      ..Status::stopped()
    });

    LifecycleResult::ok(ResultCode::Repaired, correlation_id, (*self.status()).clone())
  }

  fn publish_error(&self, err: &LifecycleError, correlation_id: String) {
    self.publish(Status {
      running: false,
      phase: Phase::Error,
      last_op: Some("start".to_string()),
      last_op_ts: Some(now_unix()),
      last_correlation_id: Some(correlation_id),
      last_error: Some(format!("{:?}", err.code)),
      last_error_detail: Some(ErrorDetail {
        title: err.detail.title.clone(),
        remediation: err.detail.remediation.clone(),
        errors: err.detail.errors.clone(),
      }),
      warnings: err.warnings.clone(),
      ..Status::stopped()
    });
  }

  #[allow(clippy::too_many_arguments)]
  fn spawn_supervisor(
    self: &Arc<Self>,
    ifname: String,
    ssid: String,
    telemetry_enable: bool,
    telemetry_interval: Duration,
    watchdog_enable: bool,
    watchdog_interval: Duration,
    runner: Arc<dyn CommandRunner>,
  ) -> tokio::task::JoinHandle<()> {
    let core = Arc::clone(self);
    let tick = telemetry_interval.min(watchdog_interval).max(MIN_SUPERVISOR_TICK);
    tokio::spawn(async move {
      loop {
        tokio::time::sleep(tick).await;

        let alive = {
          let mut guard = core.running.lock().await;
          match guard.as_mut() {
            Some(state) => state.engine.is_alive(),
            None => return,
          }
        };

        if telemetry_enable {
          let (summary, telemetry_warnings) = vrhotspot_telemetry::sample_and_summarize(&ifname, runner.as_ref());
          let mut snapshot = (*core.status()).clone();
          snapshot.telemetry = summary;
          if !telemetry_warnings.is_empty() {
            snapshot.warnings.extend(telemetry_warnings);
          }
          core.publish(snapshot);
        }

        if !alive && watchdog_enable {
          warn!(ssid = %ssid, ifname = %ifname, "engine process died, scheduling supervised restart");
          let delay = {
            let mut guard = core.running.lock().await;
            guard.as_mut().map(|s| s.backoff.next_delay()).unwrap_or(Duration::from_secs(2))
          };
          tokio::time::sleep(delay).await;
          core.running.lock().await.take();
          let result = core.start(None).await;
          if !result.ok {
            error!(result_code = ?result.result_code, "supervised restart failed");
          }
          return;
        }
      }
    })
  }
}

fn spawn_noop_supervisor() -> tokio::task::JoinHandle<()> {
  tokio::spawn(async {})
}

fn now_unix() -> i64 {
  chrono::Utc::now().timestamp()
}

fn result_code_for_start(status: &Status) -> ResultCode {
  if matches!(status.fallback_reason, FallbackReason::None) {
    ResultCode::Started
  } else {
    ResultCode::StartedWithFallback
  }
}

fn config_store_error(e: vrhotspot_config::ConfigStoreError) -> LifecycleError {
  match e {
    vrhotspot_config::ConfigStoreError::Invalid(errs) => {
      LifecycleError::new(ResultCode::ConfigInvalid, "config patch fails validation")
        .with_errors(errs.iter().map(|f| format!("{}: {}", f.field, f.message)).collect())
    }
    other => LifecycleError::new(ResultCode::InternalError, other.to_string()),
  }
}

fn adapter_error_to_lifecycle(e: AdapterError) -> LifecycleError {
  match e {
    AdapterError::NotFound(ifname) => LifecycleError::new(ResultCode::AdapterNotFound, format!("adapter `{ifname}` not found")),
    AdapterError::NoApMode(ifname) => LifecycleError::new(ResultCode::AdapterNoApMode, format!("adapter `{ifname}` has no AP mode")),
    AdapterError::NoSixGhzApAdapter => LifecycleError::new(ResultCode::NoSixGhzApAdapter, "no adapter advertises 6ghz AP support"),
  }
}

/// Distinguishes "no country code configured at all" from "a country code
/// is configured but hostapd would reject it", so a caller can tell the two
/// apart instead of both collapsing into `ConfigInvalid`.
fn check_country_requirements(config: &Config) -> Option<LifecycleError> {
  if !config.ieee80211d {
    return None;
  }
  if config.country.is_empty() {
    return Some(
      LifecycleError::new(ResultCode::CountryNotSet, "ieee80211d enabled but no country code configured")
        .with_remediation("set a two-letter ISO 3166-1 country code"),
    );
  }
  let valid = config.country.len() == 2
    && config.country.chars().all(|ch| ch.is_ascii_uppercase())
    && config.country != "00";
  if !valid {
    return Some(LifecycleError::new(
      ResultCode::HostapdInvalidCountryCodeFor80211d,
      format!("country code `{}` is not valid for ieee80211d", config.country),
    ));
  }
  None
}

/// Picks the channel for this attempt: auto-select scans for the least
/// occupied candidate in-band and falls back to the configured/forced
/// channel when scanning fails or turns up nothing useful.
fn resolved_channel(
  config: &Config,
  band: &str,
  forced_auto_select: bool,
  forced_2g_fallback: Option<u8>,
  runner: &dyn CommandRunner,
  ifname: &str,
) -> u32 {
  let auto_select = forced_auto_select || config.channel_auto_select;
  if auto_select {
    if let Some(channel) = auto_pick_channel(band, config, forced_2g_fallback, runner, ifname) {
      return channel;
    }
  }
  match band {
    "2.4ghz" => forced_2g_fallback.unwrap_or(config.channel_2g_fallback) as u32,
    "6ghz" => config.channel_6g.unwrap_or(5),
    _ => config.channel_5g.unwrap_or(36),
  }
}

fn auto_pick_channel(
  band: &str,
  config: &Config,
  forced_2g_fallback: Option<u8>,
  runner: &dyn CommandRunner,
  ifname: &str,
) -> Option<u32> {
  let preferred = match band {
    "2.4ghz" => forced_2g_fallback.map(|c| c as u32).unwrap_or(config.channel_2g_fallback as u32),
    "6ghz" => config.channel_6g.unwrap_or(5),
    _ => config.channel_5g.unwrap_or(36),
  };
  let out = runner.run("iw", &["dev", ifname, "scan", "freq"]).ok()?;
  if !out.status_success {
    return None;
  }
  let occupied = scan_channel_occupancy(&out.stdout_utf8(), band);
  let mut candidates = candidate_channels(band);
  candidates.retain(|c| *c != preferred);
  candidates.insert(0, preferred);
  candidates.into_iter().min_by_key(|c| occupied.get(c).copied().unwrap_or(0))
}

fn candidate_channels(band: &str) -> Vec<u32> {
  match band {
    "2.4ghz" => vec![1, 6, 11],
    "6ghz" => vec![5, 21, 37, 53, 69, 85, 101],
    _ => vec![36, 40, 44, 48, 149, 153, 157, 161],
  }
}

fn scan_channel_occupancy(scan_output: &str, band: &str) -> HashMap<u32, u32> {
  let mut counts = HashMap::new();
  for line in scan_output.lines() {
    let Some(freq_str) = line.trim().strip_prefix("freq: ") else {
      continue;
    };
    let Ok(freq) = freq_str.trim().parse::<u32>() else {
      continue;
    };
    if let Some(channel) = channel_for_freq(freq, band) {
      *counts.entry(channel).or_insert(0) += 1;
    }
  }
  counts
}

fn channel_for_freq(freq: u32, band: &str) -> Option<u32> {
  match band {
    "2.4ghz" if (2412..=2484).contains(&freq) => {
      if freq == 2484 {
        Some(14)
      } else {
        Some((freq - 2407) / 5)
      }
    }
    "5ghz" if (5170..=5895).contains(&freq) => Some((freq - 5000) / 5),
    "6ghz" if (5955..=7115).contains(&freq) => Some((freq - 5950) / 5),
    _ => None,
  }
}

struct FailureClassification {
  attempt: fallback::AttemptFailure,
  code: ResultCode,
}

fn classify_failure(probe_err: ProbeError, exit_class: Option<ExitClass>) -> FailureClassification {
  if let Some(ExitClass::DriverRejectedChannel) = exit_class {
    return FailureClassification {
      attempt: fallback::AttemptFailure::DriverRejectedChannel,
      code: ResultCode::DriverRejectedChannel,
    };
  }
  if let Some(ExitClass::DependencyMissing) = exit_class {
    return FailureClassification {
      attempt: fallback::AttemptFailure::Fatal,
      code: ResultCode::DependencyMissing,
    };
  }
  if let Some(ExitClass::CrashEarly) = exit_class {
    return FailureClassification {
      attempt: fallback::AttemptFailure::Fatal,
      code: ResultCode::EngineCrashEarly,
    };
  }
  if let Some(ExitClass::CrashLate) = exit_class {
    return FailureClassification {
      attempt: fallback::AttemptFailure::Fatal,
      code: ResultCode::EngineCrashLate,
    };
  }
  match (probe_err, exit_class) {
    (ProbeError::Timeout, None) | (ProbeError::Timeout, Some(ExitClass::Unknown)) => FailureClassification {
      attempt: fallback::AttemptFailure::ApReadyTimeout,
      code: ResultCode::ApReadyTimeout,
    },
    (ProbeError::ApInterfaceNotUp, None) | (ProbeError::ApInterfaceNotUp, Some(ExitClass::Unknown)) => FailureClassification {
      attempt: fallback::AttemptFailure::ApReadyTimeout,
      code: ResultCode::ApInterfaceNotUp,
    },
    (ProbeError::ApTypeMismatch, None) | (ProbeError::ApTypeMismatch, Some(ExitClass::Unknown)) => FailureClassification {
      attempt: fallback::AttemptFailure::ApReadyTimeout,
      code: ResultCode::ApTypeMismatch,
    },
    (ProbeError::SsidNotAdvertised, None) | (ProbeError::SsidNotAdvertised, Some(ExitClass::Unknown)) => FailureClassification {
      attempt: fallback::AttemptFailure::ApReadyTimeout,
      code: ResultCode::SsidNotAdvertised,
    },
    _ => FailureClassification {
      attempt: fallback::AttemptFailure::Fatal,
      code: ResultCode::ApReadyTimeout,
    },
  }
}

fn fallback_reason_for(from_band: &str, _to_band: &str, failure: fallback::AttemptFailure) -> FallbackReason {
  match (from_band, failure) {
    ("6ghz", _) => FallbackReason::ApReadyTimeout6Ghz,
    ("5ghz", fallback::AttemptFailure::DriverRejectedChannel) => FallbackReason::DriverRejectedChannel5Ghz,
    ("5ghz", _) => FallbackReason::ApReadyTimeout5Ghz,
    (_, fallback::AttemptFailure::DriverRejectedChannel) => FallbackReason::DriverRejectedChannelNoVirt,
    _ => FallbackReason::None,
  }
}

fn revert_tuning(ledger: &mut RevertLedger, runner: &dyn CommandRunner) -> Vec<String> {
  ledger.drain_lifo(|action| vrhotspot_tuner::revert_one(action, runner))
}

fn revert_attempt(
  ledger: &mut RevertLedger,
  firewall: Option<(Box<dyn FirewallBackend + Send + Sync>, FirewallToken)>,
  runner: &dyn CommandRunner,
) -> Vec<String> {
  let mut warnings = revert_tuning(ledger, runner);
  if let Some((backend, token)) = firewall {
    warnings.extend(backend.revert(runner, token));
  }
  warnings
}

/// Kills any hostapd/dnsmasq process still alive after `repair`'s
/// stop-equivalent phase. By the time this runs, nothing tracked as ours is
/// left, so every match found here is a stray from a previous crash.
fn cleanup_stray_processes(runner: &dyn CommandRunner) -> Vec<String> {
  let mut warnings = Vec::new();
  for prog in ["hostapd", "dnsmasq"] {
    if let Ok(out) = runner.run("pgrep", &["-x", prog]) {
      if out.status_success {
        for pid in out.stdout_utf8().lines().map(str::trim).filter(|p| !p.is_empty()) {
          let _ = runner.run("kill", &["-9", pid]);
          warnings.push(format!("repair_killed_stray_process: {prog}:{pid}"));
        }
      }
    }
  }
  warnings
}

fn cleanup_config_dir(config_dir: &Path, warnings: &mut Vec<String>) {
  if config_dir.exists() && std::fs::remove_dir_all(config_dir).is_err() {
    warnings.push(format!("repair_cleanup_incomplete: {}", config_dir.display()));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use vrhotspot_platform::runner::CommandOutput;

  struct NoScanRunner;
  impl CommandRunner for NoScanRunner {
    fn run(&self, _program: &str, _args: &[&str]) -> Result<CommandOutput, vrhotspot_platform::PlatformError> {
      Ok(CommandOutput {
        status_success: false,
        stdout: Vec::new(),
        stderr: Vec::new(),
      })
    }
  }

  #[test]
  fn resolved_channel_uses_band_specific_fallbacks_when_auto_pick_finds_nothing() {
    let config = Config::default();
    assert_eq!(
      resolved_channel(&config, "2.4ghz", false, None, &NoScanRunner, "wlan0"),
      config.channel_2g_fallback as u32
    );
    assert_eq!(resolved_channel(&config, "5ghz", false, None, &NoScanRunner, "wlan0"), 36);
    assert_eq!(resolved_channel(&config, "6ghz", false, None, &NoScanRunner, "wlan0"), 5);
  }

  #[test]
  fn forced_2g_fallback_wins_when_auto_pick_has_no_scan_data() {
    let config = Config::default();
    let channel = resolved_channel(&config, "2.4ghz", true, Some(6), &NoScanRunner, "wlan0");
    assert_eq!(channel, 6);
  }

  #[test]
  fn auto_pick_prefers_least_occupied_channel_from_scan() {
    struct ScanRunner;
    impl CommandRunner for ScanRunner {
      fn run(&self, _program: &str, _args: &[&str]) -> Result<CommandOutput, vrhotspot_platform::PlatformError> {
        Ok(CommandOutput {
          status_success: true,
          stdout: b"freq: 2412\nfreq: 2412\nfreq: 2462\n".to_vec(),
          stderr: Vec::new(),
        })
      }
    }
    let config = Config::default();
    // channel 1 (2412MHz) seen twice, channel 11 (2462MHz) seen once, the
    // preferred default channel 6 unseen: the unseen channel wins.
    let channel = resolved_channel(&config, "2.4ghz", false, None, &ScanRunner, "wlan0");
    assert_eq!(channel, config.channel_2g_fallback as u32);
  }

  #[test]
  fn classify_failure_prioritizes_driver_rejection_over_timeout() {
    let classification = classify_failure(ProbeError::Timeout, Some(ExitClass::DriverRejectedChannel));
    assert_eq!(classification.attempt, fallback::AttemptFailure::DriverRejectedChannel);
    assert_eq!(classification.code, ResultCode::DriverRejectedChannel);
  }

  #[test]
  fn classify_failure_treats_bare_timeout_as_retryable() {
    let classification = classify_failure(ProbeError::Timeout, None);
    assert_eq!(classification.attempt, fallback::AttemptFailure::ApReadyTimeout);
    assert_eq!(classification.code, ResultCode::ApReadyTimeout);
  }

  #[test]
  fn classify_failure_treats_clean_exit_as_fatal() {
    let classification = classify_failure(ProbeError::Timeout, Some(ExitClass::Clean));
    assert_eq!(classification.attempt, fallback::AttemptFailure::Fatal);
  }

  #[test]
  fn classify_failure_maps_dependency_missing_exit_to_its_own_code() {
    let classification = classify_failure(ProbeError::Timeout, Some(ExitClass::DependencyMissing));
    assert_eq!(classification.attempt, fallback::AttemptFailure::Fatal);
    assert_eq!(classification.code, ResultCode::DependencyMissing);
  }

  #[test]
  fn classify_failure_maps_probe_readiness_substates_to_distinct_codes() {
    assert_eq!(classify_failure(ProbeError::ApInterfaceNotUp, None).code, ResultCode::ApInterfaceNotUp);
    assert_eq!(classify_failure(ProbeError::ApTypeMismatch, None).code, ResultCode::ApTypeMismatch);
    assert_eq!(classify_failure(ProbeError::SsidNotAdvertised, None).code, ResultCode::SsidNotAdvertised);
  }

  #[test]
  fn country_check_distinguishes_unset_from_invalid() {
    let mut config = Config::default();
    config.ieee80211d = true;
    config.country = String::new();
    assert_eq!(check_country_requirements(&config).unwrap().code, ResultCode::CountryNotSet);

    config.country = "00".to_string();
    assert_eq!(
      check_country_requirements(&config).unwrap().code,
      ResultCode::HostapdInvalidCountryCodeFor80211d
    );

    config.country = "US".to_string();
    assert!(check_country_requirements(&config).is_none());
  }

  #[tokio::test]
  async fn status_starts_stopped_and_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let core = LifecycleCore::new(dir.path().join("state"), dir.path().join("app"));
    let status = core.status();
    assert!(status.consistent());
    assert_eq!(status.phase, Phase::Stopped);
  }

  #[tokio::test]
  async fn stop_when_already_stopped_reports_already_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let core = LifecycleCore::new(dir.path().join("state"), dir.path().join("app"));
    let result = core.stop(Duration::from_secs(1)).await;
    assert!(!result.ok);
    assert_eq!(result.result_code, ResultCode::AlreadyStopped);
  }

  #[tokio::test]
  async fn start_without_hostapd_available_fails_with_missing_binary_or_spawn_error() {
    // This app_root has no vendored binaries, and the sandboxed test
    // environment is assumed not to have hostapd on $PATH either.
    let dir = tempfile::tempdir().unwrap();
    let core = LifecycleCore::new(dir.path().join("state"), dir.path().join("app"));
    let result = core.start(None).await;
    assert!(!result.ok);
    let status = core.status();
    assert_eq!(status.phase, Phase::Error);
  }

  #[tokio::test]
  async fn concurrent_start_while_busy_fails_fast_without_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let core = LifecycleCore::new(dir.path().join("state"), dir.path().join("app"));
    let _held = core.serialize.lock().await;
    let result = core.start(None).await;
    assert!(!result.ok);
    assert_eq!(result.result_code, ResultCode::LifecycleBusy);
  }

  #[tokio::test]
  async fn repair_ends_stopped_and_never_starts_anything() {
    let dir = tempfile::tempdir().unwrap();
    let core = LifecycleCore::new(dir.path().join("state"), dir.path().join("app"));
    let result = core.repair().await;
    assert!(result.ok);
    assert_eq!(result.result_code, ResultCode::Repaired);
    assert_eq!(result.data.phase, Phase::Stopped);
    assert!(!result.data.running);
  }
}
