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

//! Time-stepped collaborators (audio engines, simulations) ticked as work.

use axle_core::utils::lock;
use axle_core::{CyclerHandle, Stopwatch, WorkHandle};
use std::sync::{Arc, Mutex};

/// Something advanced by elapsed time on a cycle thread.
pub trait TickAdapter: Send + Sync {
    /// Advances by `dt_secs`, the time since the previous tick.
    fn tick(&self, dt_secs: f32);
}

impl<F> TickAdapter for F
where
    F: Fn(f32) + Send + Sync,
{
    fn tick(&self, dt_secs: f32) {
        self(dt_secs)
    }
}

/// Registers `adapter` as recurring work on `cycler`, after `after` if given.
///
/// The first tick receives `0.0`; every following one the time elapsed since
/// the previous tick.
pub fn register_tick(
    cycler: &CyclerHandle,
    adapter: Arc<dyn TickAdapter>,
    after: Option<WorkHandle>,
) -> WorkHandle {
    let clock: Mutex<Option<Stopwatch>> = Mutex::new(None);
    cycler.create_work(
        move || {
            let dt = {
                let mut clock = lock(&clock);
                match clock.as_mut() {
                    Some(watch) => watch.lap().as_secs_f32(),
                    None => {
                        *clock = Some(Stopwatch::new());
                        0.0
                    }
                }
            };
            adapter.tick(dt);
        },
        after,
    )
}
