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

//! Defines the error types of the scheduling primitives.

use std::fmt;
use std::thread::ThreadId;

/// An error raised by the lifecycle of a [`ThreadCycler`](crate::ThreadCycler)
/// or an [`Executor`](crate::Executor).
#[derive(Debug)]
pub enum CyclerError {
    /// The cycler was stopped; a stopped cycler cannot be started again.
    Terminated {
        /// The name of the cycler.
        name: String,
    },
    /// The operating system refused to spawn the dedicated thread.
    Spawn(std::io::Error),
}

impl fmt::Display for CyclerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclerError::Terminated { name } => {
                write!(f, "Cycler '{name}' was stopped and cannot be restarted")
            }
            CyclerError::Spawn(err) => write!(f, "Failed to spawn cycle thread: {err}"),
        }
    }
}

impl std::error::Error for CyclerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CyclerError::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CyclerError {
    fn from(err: std::io::Error) -> Self {
        CyclerError::Spawn(err)
    }
}

/// A thread-affinity precondition was violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffinityError {
    /// The cycle thread is not alive (never started, or already exited).
    NotRunning {
        /// The name of the cycler.
        name: String,
    },
    /// The caller is not running on the cycle thread.
    WrongThread {
        /// The name of the cycler.
        name: String,
        /// The cycle thread.
        expected: ThreadId,
        /// The calling thread.
        actual: ThreadId,
    },
}

impl fmt::Display for AffinityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffinityError::NotRunning { name } => {
                write!(f, "Cycle thread '{name}' is not running")
            }
            AffinityError::WrongThread {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Thread validation failed for '{name}': expected {expected:?}, called from {actual:?}"
            ),
        }
    }
}

impl std::error::Error for AffinityError {}

/// The failure side of a [`JobFuture`](crate::JobFuture).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The job panicked; the payload message is preserved.
    Panicked(String),
    /// The job was dropped without running (its thread shut down first).
    Dropped,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Panicked(msg) => write!(f, "Job panicked: {msg}"),
            JobError::Dropped => write!(f, "Job was dropped before it could run"),
        }
    }
}

impl std::error::Error for JobError {}
