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

//! The window thread: creates a platform window and pumps its events.

use crate::context::ThreadContext;
use crate::error::ContextError;
use crate::platform::PlatformWindow;
use crate::registry::WindowRegistry;
use axle_core::StopOutcome;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest poll interval accepted; the window thread never spins.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A [`ThreadContext`] owning one [`PlatformWindow`].
///
/// The window is registered in a [`WindowRegistry`] by native id while the
/// context runs, so OS callbacks can be routed back to it.
#[derive(Debug)]
pub struct ThreadContextWnd {
    context: ThreadContext<dyn PlatformWindow>,
    registry: Arc<WindowRegistry>,
}

impl ThreadContextWnd {
    /// Creates a window context with its own registry.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_registry(name, Arc::new(WindowRegistry::new()))
    }

    /// Creates a window context sharing `registry` with other window threads.
    pub fn with_registry(name: impl Into<String>, registry: Arc<WindowRegistry>) -> Self {
        Self {
            context: ThreadContext::new(name),
            registry,
        }
    }

    /// Creates the window on the window thread and starts pumping it every
    /// `poll_interval` (clamped to [`MIN_POLL_INTERVAL`]).
    pub fn start_app<C>(&self, creator: C, poll_interval: Duration) -> Result<(), ContextError>
    where
        C: FnOnce() -> anyhow::Result<Arc<dyn PlatformWindow>> + Send + 'static,
    {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self.context
            .start(poll_interval, creator, |window| window.poll_events())?;

        if let Some(window) = self.context.get_context() {
            let id = window.native_id();
            self.registry.register(id, &window);
            log::info!("[{}] Window {:?} registered", self.context.name(), id);
        }
        Ok(())
    }

    /// Unregisters the window and stops the thread.
    pub fn stop(&self, join: bool) {
        self.unpublish();
        self.context.stop(join);
    }

    /// Unregisters the window, then stops the thread like
    /// [`ThreadContext::shutdown`].
    pub fn shutdown(&self, timeout: Option<Duration>) -> StopOutcome {
        self.unpublish();
        self.context.shutdown(timeout)
    }

    fn unpublish(&self) {
        if let Some(window) = self.context.get_context() {
            self.registry.unregister(window.native_id());
        }
    }

    /// The registry this window is published in.
    pub fn registry(&self) -> &Arc<WindowRegistry> {
        &self.registry
    }
}

impl Deref for ThreadContextWnd {
    type Target = ThreadContext<dyn PlatformWindow>;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl Drop for ThreadContextWnd {
    fn drop(&mut self) {
        self.stop(true);
    }
}
