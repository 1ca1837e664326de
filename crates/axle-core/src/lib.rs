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

//! # Axle Core
//!
//! Thread-affine scheduling primitives shared by every Axle subsystem.
//!
//! Each subsystem (window pump, render/present loop, audio ticking, generic
//! background work) owns one dedicated thread, driven either by a
//! [`ThreadCycler`] (one-off tasks plus an ordered table of recurring work) or
//! by a plain [`Executor`] (one-off closures only).

#![warn(missing_docs)]

pub mod affinity;
pub mod cycler;
pub mod error;
pub mod executor;
pub mod job;
pub mod task_queue;
pub mod utils;
pub mod work_table;

pub use affinity::CycleToken;
pub use cycler::{
    CycleStats, CyclerHandle, CyclerState, InitFn, JobFailure, JobKind, StopOutcome, StopSignal,
    ThreadCycler,
};
pub use error::{AffinityError, CyclerError, JobError};
pub use executor::{Executor, ExecutorMode};
pub use job::{Job, JobFuture, Promise, RecurringJob};
pub use task_queue::TaskQueue;
pub use utils::timer::Stopwatch;
pub use work_table::{WorkHandle, WorkTable};
