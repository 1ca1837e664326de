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

//! Error types of the thread contexts and their collaborators.

use axle_core::{CyclerError, JobError};
use std::path::PathBuf;
use thiserror::Error;

/// Starting a [`ThreadContext`](crate::ThreadContext) failed.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The underlying cycler could not be started.
    #[error("cycle thread error: {0}")]
    Cycler(#[from] CyclerError),
    /// The creator returned an error.
    #[error("context creation failed: {0:#}")]
    Creation(#[source] anyhow::Error),
    /// The creator panicked or never ran.
    #[error("context creator did not complete: {0}")]
    CreatorAborted(#[source] JobError),
}

/// A render surface could not acquire or present an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// The surface no longer matches its window and must be reconfigured.
    #[error("surface is outdated and must be reconfigured")]
    Outdated,
    /// The surface was lost.
    #[error("surface was lost")]
    Lost,
    /// Acquiring the next image timed out.
    #[error("timed out acquiring the next image")]
    Timeout,
    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Loading a [`RuntimeConfig`](crate::RuntimeConfig) failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config '{}': {source}", .path.display())]
    Io {
        /// The file that was requested.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The content is not a valid configuration.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
