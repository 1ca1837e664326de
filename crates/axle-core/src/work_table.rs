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

//! Indexed, free-list-backed storage for recurring work and its execution order.

use crate::job::RecurringJob;
use crate::utils::lock;
use std::sync::Mutex;

/// Identifies a recurring job registered in a [`WorkTable`].
///
/// It combines a slot index with a generation count. When work is removed its
/// slot can be recycled, but the generation is incremented, so a handle kept
/// past its removal no longer matches and cannot touch the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkHandle {
    /// The slot index inside the table.
    pub index: u32,
    /// The generation of the slot when this handle was issued.
    pub generation: u32,
}

struct WorkSlot {
    job: Option<RecurringJob>,
    generation: u32,
    alive: bool,
}

#[derive(Default)]
struct TableInner {
    slots: Vec<WorkSlot>,
    order: Vec<WorkHandle>,
    free: Vec<u32>,
}

impl TableInner {
    fn is_live(&self, handle: WorkHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == handle.generation)
    }
}

/// Recurring jobs plus the explicit order in which a cycle runs them.
#[derive(Default)]
pub struct WorkTable {
    inner: Mutex<TableInner>,
}

impl WorkTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `job` and returns its handle.
    ///
    /// A freed slot is reused when available. The handle goes at the end of the
    /// order, or right after `after` when that handle is currently ordered.
    pub fn create_work(&self, job: RecurringJob, after: Option<WorkHandle>) -> WorkHandle {
        let mut inner = lock(&self.inner);

        let handle = match inner.free.pop() {
            Some(index) => {
                let slot = &mut inner.slots[index as usize];
                slot.job = Some(job);
                slot.alive = true;
                WorkHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = inner.slots.len() as u32;
                inner.slots.push(WorkSlot {
                    job: Some(job),
                    generation: 0,
                    alive: true,
                });
                WorkHandle {
                    index,
                    generation: 0,
                }
            }
        };

        let position = after.and_then(|after| inner.order.iter().position(|h| *h == after));
        match position {
            Some(pos) => inner.order.insert(pos + 1, handle),
            None => inner.order.push(handle),
        }
        handle
    }

    /// Removes the work behind `handle`.
    ///
    /// Returns `false` without doing anything if the handle is dead, stale or out
    /// of range.
    pub fn remove_work(&self, handle: WorkHandle) -> bool {
        let removed = {
            let mut inner = lock(&self.inner);
            if !inner.is_live(handle) {
                return false;
            }

            let slot = &mut inner.slots[handle.index as usize];
            slot.alive = false;
            let job = slot.job.take();
            slot.generation = slot.generation.wrapping_add(1);
            inner.free.push(handle.index);
            inner.order.retain(|h| *h != handle);
            job
        };
        // Captured state may re-enter the table when dropped.
        drop(removed);
        true
    }

    /// Moves a live handle to the end of the order. Returns `false` if it is not live.
    pub fn move_work_to_end(&self, handle: WorkHandle) -> bool {
        let mut inner = lock(&self.inner);
        if !inner.is_live(handle) {
            return false;
        }
        if let Some(pos) = inner.order.iter().position(|h| *h == handle) {
            inner.order.remove(pos);
        }
        inner.order.push(handle);
        true
    }

    /// Returns `true` if `handle` still designates registered work.
    pub fn is_alive(&self, handle: WorkHandle) -> bool {
        lock(&self.inner).is_live(handle)
    }

    /// Returns a copy of the current execution order.
    pub fn order(&self) -> Vec<WorkHandle> {
        lock(&self.inner).order.clone()
    }

    /// Returns the number of live jobs.
    pub fn len(&self) -> usize {
        lock(&self.inner).order.len()
    }

    /// Returns `true` if no work is registered.
    pub fn is_empty(&self) -> bool {
        lock(&self.inner).order.is_empty()
    }

    /// Copies the ordered live jobs into `out` (cleared first).
    ///
    /// The copy is taken under the lock; callers run the jobs after it is
    /// released so that jobs may add or remove work themselves.
    pub fn snapshot_into(&self, out: &mut Vec<(WorkHandle, RecurringJob)>) {
        out.clear();
        let inner = lock(&self.inner);
        out.extend(inner.order.iter().filter_map(|handle| {
            let slot = &inner.slots[handle.index as usize];
            slot.job.clone().map(|job| (*handle, job))
        }));
    }

    /// Drops every job and resets the table.
    ///
    /// The jobs are dropped after the lock is released.
    pub fn clear(&self) {
        let mut removed: Vec<RecurringJob> = Vec::new();
        {
            let mut inner = lock(&self.inner);
            let TableInner { slots, order, free } = &mut *inner;
            order.clear();
            free.clear();
            for (index, slot) in slots.iter_mut().enumerate() {
                if slot.alive {
                    slot.alive = false;
                    removed.extend(slot.job.take());
                    slot.generation = slot.generation.wrapping_add(1);
                }
                free.push(index as u32);
            }
        }
        drop(removed);
    }
}

impl std::fmt::Debug for WorkTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("WorkTable")
            .field("order", &inner.order)
            .field("slots", &inner.slots.len())
            .field("free", &inner.free)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn noop() -> RecurringJob {
        Arc::new(|| {})
    }

    #[test]
    fn insert_after_and_move_to_end() {
        let table = WorkTable::new();
        let a = table.create_work(noop(), None);
        let b = table.create_work(noop(), Some(a));
        let c = table.create_work(noop(), None);
        assert_eq!(table.order(), vec![a, b, c]);

        assert!(table.move_work_to_end(a));
        assert_eq!(table.order(), vec![b, c, a]);
    }

    #[test]
    fn insert_after_middle_element() {
        let table = WorkTable::new();
        let a = table.create_work(noop(), None);
        let b = table.create_work(noop(), None);
        let c = table.create_work(noop(), Some(a));
        assert_eq!(table.order(), vec![a, c, b]);
    }

    #[test]
    fn unknown_after_appends() {
        let table = WorkTable::new();
        let a = table.create_work(noop(), None);
        assert!(table.remove_work(a));
        let b = table.create_work(noop(), None);
        let c = table.create_work(noop(), Some(a));
        assert_eq!(table.order(), vec![b, c]);
    }

    #[test]
    fn removed_index_is_reused_with_new_generation() {
        let table = WorkTable::new();
        let a = table.create_work(noop(), None);
        let _b = table.create_work(noop(), None);
        assert!(table.remove_work(a));
        assert!(!table.remove_work(a), "Second removal must be a no-op");

        let c = table.create_work(noop(), None);
        assert_eq!(c.index, a.index, "Freed slot should be reused");
        assert_ne!(c.generation, a.generation);

        // The stale handle cannot touch the new occupant.
        assert!(!table.remove_work(a));
        assert!(!table.move_work_to_end(a));
        assert!(table.is_alive(c));
    }

    #[test]
    fn out_of_range_handle_is_ignored() {
        let table = WorkTable::new();
        let bogus = WorkHandle {
            index: 42,
            generation: 0,
        };
        assert!(!table.remove_work(bogus));
        assert!(!table.move_work_to_end(bogus));
        assert!(table.is_empty());
    }

    #[test]
    fn order_never_holds_removed_handles() {
        // Deterministic pseudo-random interleaving of creations and removals.
        let table = WorkTable::new();
        let mut live: Vec<WorkHandle> = Vec::new();
        let mut removed: Vec<WorkHandle> = Vec::new();
        let mut seed: u32 = 0x2545_f491;

        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;

            if live.is_empty() || seed % 3 != 0 {
                let after = live.get(seed as usize % (live.len() + 1)).copied();
                let handle = table.create_work(noop(), after);
                assert!(
                    !live.iter().any(|h| h.index == handle.index),
                    "An index was handed out while still alive"
                );
                live.push(handle);
            } else {
                let handle = live.swap_remove(seed as usize % live.len());
                assert!(table.remove_work(handle));
                removed.push(handle);
            }

            let order = table.order();
            assert_eq!(order.len(), live.len());
            for handle in &removed {
                assert!(!order.contains(handle), "Removed handle {handle:?} still ordered");
            }
        }
    }

    #[test]
    fn snapshot_follows_order() {
        let table = WorkTable::new();
        let a = table.create_work(noop(), None);
        let b = table.create_work(noop(), None);
        table.move_work_to_end(a);

        let mut snapshot = Vec::new();
        table.snapshot_into(&mut snapshot);
        let handles: Vec<_> = snapshot.iter().map(|(h, _)| *h).collect();
        assert_eq!(handles, vec![b, a]);
    }

    #[test]
    fn clear_invalidates_every_handle() {
        let table = WorkTable::new();
        let a = table.create_work(noop(), None);
        let b = table.create_work(noop(), None);
        table.clear();
        assert!(table.is_empty());
        assert!(!table.is_alive(a));
        assert!(!table.is_alive(b));
    }

    /// Removes `target` from `table` when dropped.
    struct RemoveOnDrop {
        table: Arc<WorkTable>,
        target: WorkHandle,
        removed: Arc<AtomicBool>,
    }

    impl Drop for RemoveOnDrop {
        fn drop(&mut self) {
            let removed = self.table.remove_work(self.target);
            self.removed.store(removed, Ordering::SeqCst);
        }
    }

    fn reentrant_pair(table: &Arc<WorkTable>) -> (WorkHandle, WorkHandle, Arc<AtomicBool>) {
        let companion = table.create_work(noop(), None);
        let removed = Arc::new(AtomicBool::new(false));
        let guard = RemoveOnDrop {
            table: table.clone(),
            target: companion,
            removed: removed.clone(),
        };
        let owner = table.create_work(
            Arc::new(move || {
                let _keep = &guard;
            }),
            None,
        );
        (owner, companion, removed)
    }

    #[test]
    fn removed_job_may_reenter_the_table_when_dropped() {
        let table = Arc::new(WorkTable::new());
        let (owner, companion, removed) = reentrant_pair(&table);

        assert!(table.remove_work(owner));
        assert!(removed.load(Ordering::SeqCst));
        assert!(!table.is_alive(companion));
        assert!(table.is_empty());
    }

    #[test]
    fn cleared_jobs_may_reenter_the_table_when_dropped() {
        let table = Arc::new(WorkTable::new());
        let (owner, companion, removed) = reentrant_pair(&table);

        table.clear();
        // The companion was already cleared, so the re-entrant removal is a no-op.
        assert!(!removed.load(Ordering::SeqCst));
        assert!(!table.is_alive(owner));
        assert!(!table.is_alive(companion));
    }
}
