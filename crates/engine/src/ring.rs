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

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Bounded line buffer backing `EngineHandle::tail_logs`. Oldest lines are
/// dropped once `capacity` is exceeded.
#[derive(Debug)]
pub struct RingBuffer {
  lines: VecDeque<String>,
  capacity: usize,
}

impl RingBuffer {
  pub fn new(capacity: usize) -> Self {
    Self {
      lines: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  pub fn push_line(&mut self, line: String) {
    if self.lines.len() >= self.capacity {
      self.lines.pop_front();
    }
    self.lines.push_back(line);
  }

  pub fn snapshot(&self) -> Vec<String> {
    self.lines.iter().cloned().collect()
  }
}

pub type SharedRing = Arc<Mutex<RingBuffer>>;

pub fn shared_ring(capacity: usize) -> SharedRing {
  Arc::new(Mutex::new(RingBuffer::new(capacity)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn drops_oldest_once_full() {
    let mut ring = RingBuffer::new(2);
    ring.push_line("a".into());
    ring.push_line("b".into());
    ring.push_line("c".into());
    assert_eq!(ring.snapshot(), vec!["b".to_string(), "c".to_string()]);
  }
}
