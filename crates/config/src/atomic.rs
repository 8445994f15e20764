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

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Writes `contents` to `path` by first writing a sibling temp file and
/// renaming it into place, so readers never observe a partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  let tmp_name = format!(
    ".{}.tmp",
    path.file_name().and_then(|n| n.to_str()).unwrap_or("config")
  );
  let tmp_path = dir.join(tmp_name);

  {
    let mut tmp = File::create(&tmp_path)?;
    tmp.write_all(contents)?;
    tmp.sync_all()?;
  }
  fs::rename(&tmp_path, path)?;
  Ok(())
}
