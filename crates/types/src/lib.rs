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

//! Shared data model for the VR hotspot lifecycle core.
//!
//! This crate carries no behavior beyond small pure helpers (validation,
//! redaction) — every other crate in the workspace depends on it for a
//! common vocabulary, so it must stay free of cycles.

mod adapter;
mod config;
mod error;
mod ledger;
mod result;
mod status;

pub use adapter::{Adapter, AdapterBus, AdapterInventory};
pub use config::{ApSecurity, BandPreference, BridgeConfig, Config, ConfigPatch, FieldError, QosPreset};
pub use error::{ErrorDetail, LifecycleError, ResultCode};
pub use ledger::{RevertAction, RevertLedger};
pub use result::LifecycleResult;
pub use status::{EngineStatus, FallbackReason, Phase, Status, TelemetrySummary};
