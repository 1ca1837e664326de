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

//! A cycle thread that owns one thread-affine resource.
//!
//! The resource is built on the cycle thread by a creator closure, then ticked
//! every iteration by a constant work job that stays at the end of the work
//! order. Other recurring jobs registered through the context always run
//! before that tick.

use crate::error::ContextError;
use axle_core::job::{self, JobFuture};
use axle_core::utils::lock;
use axle_core::{InitFn, StopOutcome, ThreadCycler, WorkHandle};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A [`ThreadCycler`] bound to a resource of type `T` created on its thread.
pub struct ThreadContext<T: ?Sized + Send + Sync + 'static> {
    cycler: ThreadCycler,
    context: Mutex<Option<Arc<T>>>,
    tick: Mutex<Option<WorkHandle>>,
    // Serializes concurrent `start` calls.
    starting: Mutex<()>,
}

impl<T: ?Sized + Send + Sync + 'static> ThreadContext<T> {
    /// Creates a context whose thread will carry `name`. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            cycler: ThreadCycler::new(name),
            context: Mutex::new(None),
            tick: Mutex::new(None),
            starting: Mutex::new(()),
        }
    }

    /// Starts the thread, builds the resource on it and registers the tick.
    ///
    /// `creator` runs as the cycler's init job and this call blocks until it
    /// returns. If it fails or panics the thread is stopped and joined before
    /// the error is returned, so no half-started thread is left behind.
    ///
    /// Calling `start` on a running context is a no-op: the creator is not
    /// invoked again.
    pub fn start<C, W>(&self, sleep: Duration, creator: C, constant_work: W) -> Result<(), ContextError>
    where
        C: FnOnce() -> anyhow::Result<Arc<T>> + Send + 'static,
        W: Fn(&T) + Send + Sync + 'static,
    {
        let _starting = lock(&self.starting);
        if self.cycler.is_running() {
            log::debug!("[{}] Context already running, start ignored", self.cycler.name());
            return Ok(());
        }

        let (promise, created): (_, JobFuture<anyhow::Result<Arc<T>>>) = job::promise();
        let init: InitFn = Box::new(move || promise.fulfil(job::run_caught(creator)));
        self.cycler.start(sleep, Some(init))?;

        let context = match created.wait() {
            Ok(Ok(context)) => context,
            Ok(Err(err)) => {
                log::error!("[{}] Context creation failed: {err:#}", self.cycler.name());
                self.cycler.stop(true);
                return Err(ContextError::Creation(err));
            }
            Err(err) => {
                log::error!("[{}] Context creator aborted: {err}", self.cycler.name());
                self.cycler.stop(true);
                return Err(ContextError::CreatorAborted(err));
            }
        };

        *lock(&self.context) = Some(context.clone());
        let tick = self
            .cycler
            .create_work(move || constant_work(&context), None);
        self.cycler.move_work_to_end(tick);
        *lock(&self.tick) = Some(tick);

        log::info!("[{}] Context started", self.cycler.name());
        Ok(())
    }

    /// Registers a recurring job that runs before the context tick.
    ///
    /// Shadows [`CyclerHandle::create_work`](axle_core::CyclerHandle::create_work)
    /// to keep the tick at the end of the order.
    pub fn create_work<F>(&self, f: F, after: Option<WorkHandle>) -> WorkHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        let handle = self.cycler.create_work(f, after);
        if let Some(tick) = *lock(&self.tick) {
            self.cycler.move_work_to_end(tick);
        }
        handle
    }

    /// Returns the resource, or `None` before a successful start and after stop.
    pub fn get_context(&self) -> Option<Arc<T>> {
        lock(&self.context).clone()
    }

    /// Handle of the constant tick job, if the context is started.
    pub fn tick_handle(&self) -> Option<WorkHandle> {
        *lock(&self.tick)
    }

    /// Releases the resource and stops the thread.
    ///
    /// The context's own reference is dropped first, so unless callers kept
    /// clones from [`get_context`](Self::get_context) the resource is
    /// destroyed on the cycle thread when the work table is cleared.
    pub fn stop(&self, join: bool) {
        self.release();
        self.cycler.stop(join);
    }

    /// Like [`stop`](Self::stop), but `None` waits indefinitely and `Some`
    /// bounds the wait.
    pub fn shutdown(&self, timeout: Option<Duration>) -> StopOutcome {
        self.release();
        match timeout {
            Some(timeout) => self.cycler.stop_timeout(timeout),
            None => {
                self.cycler.stop(true);
                if self.cycler.is_current_thread() {
                    StopOutcome::Requested
                } else {
                    StopOutcome::Joined
                }
            }
        }
    }

    /// The underlying cycler.
    pub fn cycler(&self) -> &ThreadCycler {
        &self.cycler
    }

    fn release(&self) {
        lock(&self.tick).take();
        if lock(&self.context).take().is_some() {
            log::debug!("[{}] Context released", self.cycler.name());
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Deref for ThreadContext<T> {
    type Target = ThreadCycler;

    fn deref(&self) -> &Self::Target {
        &self.cycler
    }
}

impl<T: ?Sized + Send + Sync + 'static> Drop for ThreadContext<T> {
    fn drop(&mut self) {
        self.stop(true);
    }
}

impl<T: ?Sized + Send + Sync + 'static> fmt::Debug for ThreadContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadContext")
            .field("cycler", &self.cycler)
            .field("has_context", &lock(&self.context).is_some())
            .finish()
    }
}
