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

//! Thread-safe FIFO of one-off jobs, drained once per cycle.

use crate::job::{self, Job, JobFuture};
use crate::utils::lock;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
struct QueueInner {
    jobs: VecDeque<Job>,
    closed: bool,
}

/// An unbounded, insertion-ordered queue of one-off jobs.
///
/// Producers on any thread push with [`enqueue`](Self::enqueue); the owning
/// thread takes everything at once with [`drain_all`](Self::drain_all), which
/// moves the whole deque out while holding the lock so that nothing is lost or
/// run twice.
#[derive(Default)]
pub struct TaskQueue {
    inner: Mutex<QueueInner>,
}

impl TaskQueue {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job. Returns `false` (and drops the job) if the queue is closed.
    pub fn enqueue(&self, job: Job) -> bool {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return false;
        }
        inner.jobs.push_back(job);
        true
    }

    /// Packages `f` and enqueues it, returning its future immediately.
    ///
    /// If the queue is closed the job is dropped and the future resolves with
    /// [`JobError::Dropped`](crate::JobError::Dropped).
    pub fn enqueue_future<F, T>(&self, f: F) -> JobFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (job, future) = job::package(f);
        self.enqueue(job);
        future
    }

    /// Takes every pending job, leaving the queue empty.
    pub fn drain_all(&self) -> VecDeque<Job> {
        std::mem::take(&mut lock(&self.inner).jobs)
    }

    /// Closes the queue and returns the jobs that will never run.
    ///
    /// Later calls to [`enqueue`](Self::enqueue) are rejected.
    pub fn close(&self) -> VecDeque<Job> {
        let mut inner = lock(&self.inner);
        inner.closed = true;
        std::mem::take(&mut inner.jobs)
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// Returns the number of pending jobs.
    pub fn len(&self) -> usize {
        lock(&self.inner).jobs.len()
    }

    /// Returns `true` if no job is pending.
    pub fn is_empty(&self) -> bool {
        lock(&self.inner).jobs.is_empty()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("TaskQueue")
            .field("pending", &inner.jobs.len())
            .field("closed", &inner.closed)
            .finish()
    }
}
