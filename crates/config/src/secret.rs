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

use crate::atomic::write_atomic;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PassphraseError {
  #[error("passphrase reveal requires explicit confirmation")]
  ConfirmationRequired,
  #[error("no passphrase has been set yet")]
  NotSet,
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

fn secret_path(dir: &Path) -> std::path::PathBuf {
  dir.join(".passphrase")
}

/// Writes the secret to a sibling file, mode 0600, never touching the
/// main record.
pub fn write_passphrase(dir: &Path, passphrase: &str) -> Result<(), PassphraseError> {
  let path = secret_path(dir);
  write_atomic(&path, passphrase.as_bytes())?;
  set_owner_only_permissions(&path)?;
  Ok(())
}

pub fn read_passphrase(dir: &Path) -> Result<String, PassphraseError> {
  let path = secret_path(dir);
  match fs::read_to_string(&path) {
    Ok(contents) => Ok(contents),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PassphraseError::NotSet),
    Err(e) => Err(e.into()),
  }
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> std::io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> std::io::Result<()> {
  Ok(())
}
