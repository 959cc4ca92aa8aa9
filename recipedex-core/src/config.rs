// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Recipedex configuration

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecipedexConfig {
    #[serde(default)]
    pub reload: ReloadConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReloadConfig {
    /// Run reloads on a dedicated worker thread instead of the caller
    #[serde(default = "default_background")]
    pub background: bool,

    /// How long a new reload waits for the running one to observe interruption
    #[serde(default = "default_interrupt_timeout_ms")]
    pub interrupt_timeout_ms: u64,

    /// Log a warning each time contributor work is handed to the main thread
    #[serde(default = "default_warn_on_main_thread_handoff")]
    pub warn_on_main_thread_handoff: bool,

    /// How often a worker blocked on the main thread re-checks interruption
    #[serde(default = "default_main_thread_poll_ms")]
    pub main_thread_poll_ms: u64,
}

fn default_background() -> bool {
    true
}

fn default_interrupt_timeout_ms() -> u64 {
    5_000
}

fn default_warn_on_main_thread_handoff() -> bool {
    true
}

fn default_main_thread_poll_ms() -> u64 {
    50
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            background: default_background(),
            interrupt_timeout_ms: default_interrupt_timeout_ms(),
            warn_on_main_thread_handoff: default_warn_on_main_thread_handoff(),
            main_thread_poll_ms: default_main_thread_poll_ms(),
        }
    }
}

impl ReloadConfig {
    /// Synchronous configuration, mostly for tests and tools.
    pub fn synchronous() -> Self {
        Self {
            background: false,
            ..Self::default()
        }
    }

    pub fn interrupt_timeout(&self) -> Duration {
        Duration::from_millis(self.interrupt_timeout_ms)
    }

    pub fn main_thread_poll(&self) -> Duration {
        Duration::from_millis(self.main_thread_poll_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Drop records whose category was never registered when freezing
    #[serde(default = "default_drop_unregistered_categories")]
    pub drop_unregistered_categories: bool,
}

fn default_drop_unregistered_categories() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            drop_unregistered_categories: default_drop_unregistered_categories(),
        }
    }
}

impl RecipedexConfig {
    pub fn from_toml_str(s: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.reload.interrupt_timeout_ms == 0 {
            return Err(CoreError::Config(
                "reload.interrupt_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
