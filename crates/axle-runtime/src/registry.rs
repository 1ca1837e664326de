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

//! Routes native window ids back to their live window objects.

use crate::platform::{NativeWindowId, PlatformWindow};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// A map from [`NativeWindowId`] to a weak reference on the window.
///
/// Entries never keep a window alive; dead ones are pruned on lookup.
pub struct WindowRegistry {
    windows: RwLock<HashMap<NativeWindowId, Weak<dyn PlatformWindow>>>,
}

impl WindowRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `window` under `id`. Returns `true` if a live window was replaced.
    pub fn register(&self, id: NativeWindowId, window: &Arc<dyn PlatformWindow>) -> bool {
        let previous = self
            .windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::downgrade(window));
        previous.is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Removes `id`. Returns `true` if it was registered.
    pub fn unregister(&self, id: NativeWindowId) -> bool {
        self.windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Returns the window registered under `id` if it is still alive.
    pub fn get(&self, id: NativeWindowId) -> Option<Arc<dyn PlatformWindow>> {
        let found = self
            .windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(Weak::upgrade);

        match found {
            Some(Some(window)) => Some(window),
            Some(None) => {
                log::debug!("[WindowRegistry] Pruning dead window {:?}", id);
                self.prune_entry(id);
                None
            }
            None => None,
        }
    }

    /// Calls `f` with the window registered under `id`, outside the lock.
    ///
    /// Returns `None` when the id is unknown or its window was dropped.
    pub fn dispatch<R>(&self, id: NativeWindowId, f: impl FnOnce(&dyn PlatformWindow) -> R) -> Option<R> {
        let window = self.get(id)?;
        Some(f(window.as_ref()))
    }

    /// Removes every entry whose window was dropped. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, weak| weak.strong_count() > 0);
        before - windows.len()
    }

    /// Number of entries, dead ones included.
    pub fn len(&self) -> usize {
        self.windows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no window is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune_entry(&self, id: NativeWindowId) {
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        // Re-registered in between: keep the new window.
        if windows.get(&id).is_some_and(|weak| weak.strong_count() == 0) {
            windows.remove(&id);
        }
    }
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WindowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowRegistry")
            .field("len", &self.len())
            .finish()
    }
}
