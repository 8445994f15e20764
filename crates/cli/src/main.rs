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

//! Local exercise harness for `vrhotspot-core`'s lifecycle API. Stands in
//! for the out-of-scope HTTP control plane: every subcommand here is a
//! thin wrapper over the exact same `LifecycleCore` calls an HTTP handler
//! would make.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use vrhotspot_core::LifecycleCore;
use vrhotspot_types::ConfigPatch;

#[derive(Parser)]
#[command(name = "vrhotspotctl", version, about = "VR hotspot lifecycle control")]
struct Cli {
  /// Directory holding the persisted config and passphrase side-store.
  #[arg(long, global = true, default_value = "/var/lib/vrhotspot")]
  state_dir: PathBuf,

  /// Directory under which vendored hostapd/dnsmasq binaries may live.
  #[arg(long, global = true, default_value = "/opt/vrhotspot")]
  app_root: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Bring the access point up, applying the persisted config.
  Start,
  /// Tear the access point down and revert tuning/firewall changes.
  Stop {
    #[arg(long, default_value_t = 5)]
    grace_secs: u64,
  },
  /// Stop (best-effort) then start again from the persisted config.
  Restart,
  /// Best-effort stop ignoring failures, then start.
  Repair,
  /// Print the current status snapshot as JSON.
  Status,
  /// Print the available wireless adapters as JSON.
  ListAdapters,
  /// Print the persisted config record as JSON.
  GetConfig,
  /// Merge a JSON `ConfigPatch` (read from a file, or stdin with `-`) over
  /// the persisted record and save it.
  SaveConfig {
    /// Path to a JSON-encoded ConfigPatch, or `-` for stdin.
    patch_file: PathBuf,
  },
  /// Reveal the stored WPA passphrase. Requires `--yes`.
  RevealPassphrase {
    #[arg(long)]
    yes: bool,
  },
}

fn is_root() -> bool {
  rustix::process::geteuid().is_root()
}

const READ_ONLY_COMMANDS_NOTE: &str =
  "status, list-adapters and get-config work unprivileged; everything else needs root";

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();

  let needs_root = !matches!(
    cli.command,
    Commands::Status | Commands::ListAdapters | Commands::GetConfig
  );
  if needs_root && !is_root() {
    eprintln!("vrhotspotctl: this command needs root. {READ_ONLY_COMMANDS_NOTE}");
    std::process::exit(1);
  }

  let core = LifecycleCore::new(cli.state_dir, cli.app_root);

  match cli.command {
    Commands::Start => run_start(&core).await?,
    Commands::Stop { grace_secs } => run_stop(&core, grace_secs).await?,
    Commands::Restart => run_restart(&core).await?,
    Commands::Repair => run_repair(&core).await?,
    Commands::Status => run_status(&core)?,
    Commands::ListAdapters => run_list_adapters()?,
    Commands::GetConfig => run_get_config(&core)?,
    Commands::SaveConfig { patch_file } => run_save_config(&core, &patch_file)?,
    Commands::RevealPassphrase { yes } => run_reveal_passphrase(&core, yes)?,
  }

  Ok(())
}

async fn run_start(core: &std::sync::Arc<LifecycleCore>) -> Result<()> {
  info!("starting hotspot");
  let result = core.start(None).await;
  print_json(&result)?;
  ensure_ok(&result, "start")
}

async fn run_stop(core: &std::sync::Arc<LifecycleCore>, grace_secs: u64) -> Result<()> {
  info!(grace_secs, "stopping hotspot");
  let result = core.stop(Duration::from_secs(grace_secs)).await;
  print_json(&result)?;
  ensure_ok(&result, "stop")
}

async fn run_restart(core: &std::sync::Arc<LifecycleCore>) -> Result<()> {
  info!("restarting hotspot");
  let result = core.restart().await;
  print_json(&result)?;
  ensure_ok(&result, "restart")
}

async fn run_repair(core: &std::sync::Arc<LifecycleCore>) -> Result<()> {
  info!("repairing hotspot");
  let result = core.repair().await;
  print_json(&result)?;
  ensure_ok(&result, "repair")
}

fn ensure_ok(result: &vrhotspot_types::LifecycleResult, op: &str) -> Result<()> {
  if result.ok {
    Ok(())
  } else {
    anyhow::bail!("{op} failed: {:?}", result.result_code)
  }
}

fn run_status(core: &std::sync::Arc<LifecycleCore>) -> Result<()> {
  print_json(&*core.status())
}

fn run_list_adapters() -> Result<()> {
  let runner = vrhotspot_platform::SystemCommandRunner::default();
  let inventory = vrhotspot_adapters::snapshot(&runner);
  print_json(&inventory)
}

fn run_get_config(core: &std::sync::Arc<LifecycleCore>) -> Result<()> {
  print_json(&core.config())
}

fn run_save_config(core: &std::sync::Arc<LifecycleCore>, patch_file: &PathBuf) -> Result<()> {
  let raw = if patch_file.as_os_str() == "-" {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf).context("reading patch from stdin")?;
    buf
  } else {
    std::fs::read_to_string(patch_file).with_context(|| format!("reading {}", patch_file.display()))?
  };
  let patch: ConfigPatch = serde_json::from_str(&raw).context("parsing config patch")?;
  let config = core.save_config(&patch).context("save failed")?;
  print_json(&config)
}

fn run_reveal_passphrase(core: &std::sync::Arc<LifecycleCore>, yes: bool) -> Result<()> {
  if !yes {
    anyhow::bail!("refusing to print the passphrase without --yes");
  }
  let passphrase = core.get_passphrase(true).context("no passphrase set")?;
  println!("{passphrase}");
  Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
  let text = serde_json::to_string_pretty(value).context("serializing response")?;
  println!("{text}");
  Ok(())
}
