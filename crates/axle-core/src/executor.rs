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

//! A minimal dedicated thread that runs queued closures, nothing more.
//!
//! Used wherever only "run this later, on thread X" is needed, e.g. to marshal
//! an OS callback registration onto the thread that owns the message loop.

use crate::error::CyclerError;
use crate::job::{self, Job, JobFuture};
use crate::utils::lock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

/// When queued closures get executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorMode {
    /// Every [`Executor::queue_exec`] wakes the thread.
    #[default]
    Immediate,
    /// Closures accumulate until [`Executor::signal`] is called.
    Deferred,
}

#[derive(Default)]
struct ExecState {
    pending: VecDeque<Job>,
    running: bool,
    wake: bool,
    closed: bool,
}

struct ExecShared {
    name: String,
    state: Mutex<ExecState>,
    cv: Condvar,
    thread_id: OnceLock<ThreadId>,
    failures: AtomicU64,
}

impl ExecShared {
    fn thread_main(&self) {
        let _ = self.thread_id.set(thread::current().id());
        log::info!("[{}] Executor thread started.", self.name);

        let mut state = lock(&self.state);
        loop {
            state = self
                .cv
                .wait_while(state, |s| !s.wake && s.running)
                .unwrap_or_else(PoisonError::into_inner);
            if !state.running {
                break;
            }
            state.wake = false;
            let batch = std::mem::take(&mut state.pending);
            drop(state);

            for job in batch {
                if let Err(err) = job::run_caught(job) {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    log::error!("[{}] Queued closure failed: {}", self.name, err);
                }
            }
            state = lock(&self.state);
        }

        let dropped = std::mem::take(&mut state.pending);
        drop(state);
        if !dropped.is_empty() {
            log::debug!("[{}] Dropping {} pending closure(s).", self.name, dropped.len());
        }
        log::info!("[{}] Executor thread stopped.", self.name);
    }
}

/// A single dedicated thread draining a FIFO of closures under a condvar.
pub struct Executor {
    shared: Arc<ExecShared>,
    mode: ExecutorMode,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Executor {
    /// Creates an executor whose thread is not spawned yet; see [`init`](Self::init).
    pub fn new(name: impl Into<String>, mode: ExecutorMode) -> Self {
        Self {
            shared: Arc::new(ExecShared {
                name: name.into(),
                state: Mutex::new(ExecState::default()),
                cv: Condvar::new(),
                thread_id: OnceLock::new(),
                failures: AtomicU64::new(0),
            }),
            mode,
            handle: Mutex::new(None),
        }
    }

    /// Creates an executor and spawns its thread.
    pub fn spawn(name: impl Into<String>, mode: ExecutorMode) -> Result<Self, CyclerError> {
        let executor = Self::new(name, mode);
        executor.init()?;
        Ok(executor)
    }

    /// Spawns the executor thread. No-op if it is already running; an executor
    /// that was shut down cannot be restarted.
    pub fn init(&self) -> Result<(), CyclerError> {
        let mut handle = lock(&self.handle);
        {
            let mut state = lock(&self.shared.state);
            if state.closed {
                return Err(CyclerError::Terminated {
                    name: self.shared.name.clone(),
                });
            }
            if state.running {
                return Ok(());
            }
            state.running = true;
        }

        let shared = Arc::clone(&self.shared);
        match thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || shared.thread_main())
        {
            Ok(join) => {
                *handle = Some(join);
                Ok(())
            }
            Err(err) => {
                lock(&self.shared.state).running = false;
                Err(CyclerError::Spawn(err))
            }
        }
    }

    /// Queues a closure. Returns `false` (dropping it) once the executor is shut down.
    pub fn queue_exec<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.shared.state);
        if state.closed {
            return false;
        }
        state.pending.push_back(Box::new(f));
        if self.mode == ExecutorMode::Immediate {
            state.wake = true;
            self.shared.cv.notify_all();
        }
        true
    }

    /// Queues `f` and returns a future resolving to its value.
    pub fn queue_future<F, T>(&self, f: F) -> JobFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (job, future) = job::package(f);
        self.queue_exec(job);
        future
    }

    /// Wakes the thread to run everything queued so far.
    pub fn signal(&self) {
        let mut state = lock(&self.shared.state);
        state.wake = true;
        self.shared.cv.notify_all();
    }

    /// Returns `true` if the caller runs on the executor thread.
    pub fn is_current_thread(&self) -> bool {
        self.shared.thread_id.get() == Some(&thread::current().id())
    }

    /// Returns `true` between [`init`](Self::init) and shutdown.
    pub fn is_running(&self) -> bool {
        lock(&self.shared.state).running
    }

    /// Returns the number of queued closures that panicked.
    pub fn failures(&self) -> u64 {
        self.shared.failures.load(Ordering::Relaxed)
    }

    /// Stops the thread and joins it. Closures still pending are dropped.
    pub fn shutdown(&self) {
        let join = lock(&self.handle).take();
        let orphaned = {
            let mut state = lock(&self.shared.state);
            state.running = false;
            state.closed = true;
            state.wake = true;
            self.shared.cv.notify_all();
            // Without a thread nobody else will ever drop them.
            if join.is_none() {
                std::mem::take(&mut state.pending)
            } else {
                VecDeque::new()
            }
        };
        drop(orphaned);

        let Some(join) = join else {
            return;
        };
        if self.is_current_thread() {
            return;
        }
        if join.join().is_err() {
            log::error!("[{}] Executor thread terminated abnormally.", self.shared.name);
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.shared.name)
            .field("mode", &self.mode)
            .field("running", &self.is_running())
            .finish()
    }
}
