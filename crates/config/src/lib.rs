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

//! A typed record persisted to a host-local file, plus the passphrase
//! side-store kept separate from the main config so the secret never
//! round-trips through a generic JSON dump.

mod atomic;
mod secret;

pub use secret::PassphraseError;

use atomic::write_atomic;
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use vrhotspot_types::{validate, Config, ConfigPatch, FieldError};

#[derive(Debug, Error)]
pub enum ConfigStoreError {
  #[error("config is invalid: {0:?}")]
  Invalid(Vec<FieldError>),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("could not parse config record: {0}")]
  Parse(#[from] serde_json::Error),
  #[error(transparent)]
  Passphrase(#[from] PassphraseError),
}

/// A validated, persisted settings record with a redaction layer for the
/// secret passphrase.
pub struct ConfigStore {
  dir: PathBuf,
}

impl ConfigStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn config_path(&self) -> PathBuf {
    self.dir.join("config.json")
  }

  fn lock_path(&self) -> PathBuf {
    self.dir.join(".config.lock")
  }

  /// Loads the current record, or `Config::default()` when absent.
  pub fn load(&self) -> Config {
    match fs::read_to_string(self.config_path()) {
      Ok(text) => match serde_json::from_str::<Config>(&text) {
        Ok(config) => config,
        Err(e) => {
          warn!(error = %e, "config record unparseable, falling back to defaults");
          Config::default()
        }
      },
      Err(_) => Config::default(),
    }
  }

  /// Merge `patch` over the current record, validate the full result, and
  /// atomically persist it. The passphrase (if present in the patch) is
  /// written to the sibling secret store and stripped from the record.
  pub fn save(&self, patch: &ConfigPatch) -> Result<Config, ConfigStoreError> {
    fs::create_dir_all(&self.dir)?;
    let lock_file = fs::OpenOptions::new()
      .create(true)
      .write(true)
      .open(self.lock_path())?;
    lock_file.lock_exclusive()?;

    let current = self.load();
    let mut candidate = current.merged(patch);

    if let Some(passphrase) = &patch.wpa2_passphrase {
      secret::write_passphrase(&self.dir, passphrase)?;
      candidate.wpa2_passphrase_set = true;
      candidate.wpa2_passphrase_len = passphrase.as_bytes().len();
    }

    let errors = validate(&candidate);
    if !errors.is_empty() {
      lock_file.unlock()?;
      return Err(ConfigStoreError::Invalid(errors));
    }

    let body = serde_json::to_string_pretty(&candidate)?;
    write_atomic(&self.config_path(), body.as_bytes())?;

    lock_file.unlock()?;
    info!(ssid = %candidate.ssid, "config saved");
    Ok(candidate)
  }

  /// Reveal the stored passphrase. Guarded by an explicit confirmation
  /// flag; returns a structured error when unconfirmed or unset.
  pub fn get_passphrase(&self, confirm: bool) -> Result<String, ConfigStoreError> {
    if !confirm {
      return Err(PassphraseError::ConfirmationRequired.into());
    }
    Ok(secret::read_passphrase(&self.dir)?)
  }

  /// Internal accessor for the lifecycle worker, which needs the real
  /// secret to render `hostapd.conf` but is not the user-facing reveal
  /// path and so carries no confirmation gate.
  pub fn passphrase_for_engine(&self) -> Option<String> {
    secret::read_passphrase(&self.dir).ok()
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }
}
