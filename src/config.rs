// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
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

//! Configuration for the processing queue.

use crate::ConfigError;
use crate::dead_letter::DeadLetterLog;
use crate::scheduler::ShutdownPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub worker: WorkerConfig,
    pub dead_letter: DeadLetterConfig,
}

/// Queue worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Scheduler period (milliseconds)
    pub tick_interval_ms: u64,

    /// Operations applied per tick. 1 bounds throughput at one ledger
    /// mutation per period.
    pub max_operations_per_tick: usize,

    /// What happens to pending operations on shutdown
    pub shutdown: ShutdownPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            max_operations_per_tick: 1,
            shutdown: ShutdownPolicy::Drain,
        }
    }
}

impl WorkerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Dead-letter log configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadLetterConfig {
    /// Entries retained before the oldest is evicted
    pub capacity: usize,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            capacity: DeadLetterLog::DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(value) = lookup("DONATION_TICK_INTERVAL_MS") {
            config.worker.tick_interval_ms = parse("tick_interval_ms", value)?;
        }
        if let Some(value) = lookup("DONATION_MAX_PER_TICK") {
            config.worker.max_operations_per_tick = parse("max_operations_per_tick", value)?;
        }
        if let Some(value) = lookup("DONATION_SHUTDOWN_POLICY") {
            config.worker.shutdown = parse("shutdown", value)?;
        }
        if let Some(value) = lookup("DONATION_DEAD_LETTER_CAPACITY") {
            config.dead_letter.capacity = parse("capacity", value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "tick_interval_ms",
                value: "0".into(),
            });
        }
        if self.worker.max_operations_per_tick == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_operations_per_tick",
                value: "0".into(),
            });
        }
        if self.dead_letter.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "capacity",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
