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

//! General-purpose ticking threads (audio mixing, asset streaming, ...).

use crate::context::ThreadContext;
use crate::error::ContextError;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

/// Placeholder context for threads that carry no resource of their own.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenericState;

/// A [`ThreadContext`] running a caller-supplied sub-cycle every iteration.
#[derive(Debug)]
pub struct ThreadContextGeneric<T: Send + Sync + 'static = GenericState> {
    context: ThreadContext<T>,
}

impl<T: Send + Sync + 'static> ThreadContextGeneric<T> {
    /// Creates an idle generic context.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            context: ThreadContext::new(name),
        }
    }

    /// Builds the state on the thread with `creator` and runs `sub_cycle`
    /// once per iteration, sleeping `sleep` in between.
    pub fn start_cycle<C, W>(&self, sleep: Duration, creator: C, sub_cycle: W) -> Result<(), ContextError>
    where
        C: FnOnce() -> anyhow::Result<Arc<T>> + Send + 'static,
        W: Fn(&T) + Send + Sync + 'static,
    {
        self.context.start(sleep, creator, sub_cycle)
    }
}

impl ThreadContextGeneric<GenericState> {
    /// Starts a thread without state that runs `sub_cycle` every iteration.
    pub fn start_stateless<W>(&self, sleep: Duration, sub_cycle: W) -> Result<(), ContextError>
    where
        W: Fn() + Send + Sync + 'static,
    {
        self.start_cycle(sleep, || Ok(Arc::new(GenericState)), move |_| sub_cycle())
    }
}

impl<T: Send + Sync + 'static> Deref for ThreadContextGeneric<T> {
    type Target = ThreadContext<T>;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}
