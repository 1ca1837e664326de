// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime configuration, loaded from JSON.
//!
//! Every field has a default, so a partial (or empty) document is valid.

use crate::error::ConfigError;
use crate::graphics::GfxOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings of the window thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowThreadConfig {
    /// Sleep between event pumps, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for WindowThreadConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
        }
    }
}

/// Settings of the render thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsThreadConfig {
    /// Minimum frame period in seconds; `0` disables the cap.
    pub frame_cap_secs: f32,
    /// Acquire and present every frame.
    pub auto_present: bool,
}

impl Default for GraphicsThreadConfig {
    fn default() -> Self {
        Self {
            frame_cap_secs: 0.0,
            auto_present: true,
        }
    }
}

impl From<&GraphicsThreadConfig> for GfxOptions {
    fn from(config: &GraphicsThreadConfig) -> Self {
        Self {
            frame_cap_secs: config.frame_cap_secs,
            auto_present: config.auto_present,
        }
    }
}

/// Settings of generic worker threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerThreadConfig {
    /// Sleep between iterations, in milliseconds.
    pub sleep_ms: u64,
}

impl Default for WorkerThreadConfig {
    fn default() -> Self {
        Self { sleep_ms: 1 }
    }
}

/// Top-level configuration of the Axle runtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Window thread settings.
    pub window: WindowThreadConfig,
    /// Render thread settings.
    pub graphics: GraphicsThreadConfig,
    /// Worker thread settings.
    pub worker: WorkerThreadConfig,
    /// Upper bound on waiting for a thread to stop; `None` waits indefinitely.
    pub stop_timeout_ms: Option<u64>,
}

impl RuntimeConfig {
    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::info!("[RuntimeConfig] Loaded '{}'", path.display());
        Ok(config)
    }

    /// Window poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.window.poll_interval_ms)
    }

    /// Worker sleep between iterations.
    pub fn worker_sleep(&self) -> Duration {
        Duration::from_millis(self.worker.sleep_ms)
    }

    /// Graphics options for [`ThreadContextGfx::start_gfx`](crate::ThreadContextGfx::start_gfx).
    pub fn gfx_options(&self) -> GfxOptions {
        GfxOptions::from(&self.graphics)
    }

    /// Stop timeout, if bounded.
    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_ms.map(Duration::from_millis)
    }
}
