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

//! Jobs and the one-shot futures that carry their results across threads.

use crate::error::JobError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// A deferred, argument-less unit of work that runs exactly once.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work re-invoked every cycle.
///
/// Stored behind an `Arc` so that a cycle can snapshot the work table without
/// holding its lock while the jobs run.
pub type RecurringJob = Arc<dyn Fn() + Send + Sync + 'static>;

/// The receiving half of a packaged job.
///
/// Resolves exactly once: with the job's value, with [`JobError::Panicked`] if
/// the job panicked, or with [`JobError::Dropped`] if the job was discarded
/// without running.
#[derive(Debug)]
pub struct JobFuture<T> {
    receiver: flume::Receiver<Result<T, JobError>>,
}

impl<T> JobFuture<T> {
    /// Blocks the calling thread until the job has run.
    pub fn wait(self) -> Result<T, JobError> {
        self.receiver.recv().unwrap_or(Err(JobError::Dropped))
    }

    /// Blocks for at most `timeout`. Returns `None` if the job has not run yet.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, JobError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(flume::RecvTimeoutError::Timeout) => None,
            Err(flume::RecvTimeoutError::Disconnected) => Some(Err(JobError::Dropped)),
        }
    }

    /// Returns the result if the job has already run, without blocking.
    pub fn try_get(&self) -> Option<Result<T, JobError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(flume::TryRecvError::Empty) => None,
            Err(flume::TryRecvError::Disconnected) => Some(Err(JobError::Dropped)),
        }
    }

    /// Awaits the result from an async context.
    pub async fn wait_async(self) -> Result<T, JobError> {
        self.receiver
            .recv_async()
            .await
            .unwrap_or(Err(JobError::Dropped))
    }
}

/// The sending half of a packaged job. Consumed by [`Promise::fulfil`].
#[derive(Debug)]
pub struct Promise<T> {
    sender: flume::Sender<Result<T, JobError>>,
}

impl<T> Promise<T> {
    /// Delivers the result. A future that was already dropped is ignored.
    pub fn fulfil(self, result: Result<T, JobError>) {
        let _ = self.sender.send(result);
    }
}

/// Creates a connected promise/future pair.
pub fn promise<T>() -> (Promise<T>, JobFuture<T>) {
    let (sender, receiver) = flume::bounded(1);
    (Promise { sender }, JobFuture { receiver })
}

/// Wraps `f` into a [`Job`] that fulfils the returned future when it runs.
///
/// A panic inside `f` is caught and becomes the future's error.
pub fn package<F, T>(f: F) -> (Job, JobFuture<T>)
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (promise, future) = promise();
    let job: Job = Box::new(move || promise.fulfil(run_caught(f)));
    (job, future)
}

/// Runs `f`, turning a panic into [`JobError::Panicked`].
pub fn run_caught<T>(f: impl FnOnce() -> T) -> Result<T, JobError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| JobError::Panicked(panic_message(&*payload)))
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
