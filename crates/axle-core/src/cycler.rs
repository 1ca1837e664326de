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

//! The dedicated-thread cyclical scheduler.
//!
//! A [`ThreadCycler`] owns one OS thread. Every iteration it:
//! 1. drains its [`TaskQueue`] and runs each one-off job in FIFO order,
//! 2. snapshots its [`WorkTable`] and runs each live recurring job in order,
//! 3. sleeps the configured interval (a zero interval loops immediately, which
//!    the render thread relies on since presentation itself paces it).
//!
//! Stopping is cooperative: a running job is never interrupted, only the next
//! iteration is skipped. A job that blocks forever therefore blocks
//! [`ThreadCycler::stop`] with `join = true` forever as well; use
//! [`ThreadCycler::stop_timeout`] to bound the wait, and hand long jobs a
//! [`StopSignal`] so they can bail out on their own.

use crate::affinity::CycleToken;
use crate::error::{AffinityError, CyclerError, JobError};
use crate::job::{self, JobFuture, RecurringJob};
use crate::task_queue::TaskQueue;
use crate::utils::lock;
use crate::work_table::{WorkHandle, WorkTable};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// One-time bootstrap run on the cycle thread before the first iteration.
pub type InitFn = Box<dyn FnOnce() + Send + 'static>;

type FailureHook = Arc<dyn Fn(&JobFailure) + Send + Sync + 'static>;

/// Lifecycle of a cycler. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclerState {
    /// [`ThreadCycler::start`] has not been called yet.
    NotStarted,
    /// The cycle thread has been spawned and no stop was requested.
    Running,
    /// A stop was requested. The thread may still be finishing its iteration.
    Stopped,
}

/// The kind of job that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// The bootstrap passed to [`ThreadCycler::start`].
    Init,
    /// A one-off task.
    Task,
    /// A recurring job.
    Work(WorkHandle),
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Init => write!(f, "init job"),
            JobKind::Task => write!(f, "task"),
            JobKind::Work(h) => write!(f, "work {}:{}", h.index, h.generation),
        }
    }
}

/// A job that panicked on a cycle thread.
#[derive(Debug, Clone)]
pub struct JobFailure {
    /// The name of the cycler the job ran on.
    pub cycler: String,
    /// Which job failed.
    pub kind: JobKind,
    /// The panic message.
    pub message: String,
}

/// Counters describing the work a cycler has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Completed iterations.
    pub iterations: u64,
    /// One-off tasks run (including failed ones).
    pub tasks_run: u64,
    /// Recurring job invocations (including failed ones).
    pub works_run: u64,
    /// Jobs that panicked.
    pub failures: u64,
}

/// Result of [`ThreadCycler::stop_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The cycle thread has exited and was joined (or was never started).
    Joined,
    /// The thread did not exit in time and was detached; it will finish its
    /// current iteration on its own.
    Detached,
    /// Called from the cycle thread itself: the stop was requested, nothing
    /// was awaited.
    Requested,
}

/// A cloneable flag that long-running jobs poll to cooperate with a stop.
#[derive(Debug, Clone)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// Returns `true` once the owning cycler was asked to stop.
    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

struct Lifecycle {
    state: CyclerState,
    started: bool,
    exited: bool,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Counters {
    iterations: AtomicU64,
    tasks_run: AtomicU64,
    works_run: AtomicU64,
    failures: AtomicU64,
}

struct Shared {
    name: String,
    tasks: TaskQueue,
    works: WorkTable,
    running: AtomicBool,
    stop_requested: Arc<AtomicBool>,
    thread_id: OnceLock<ThreadId>,
    lifecycle: Mutex<Lifecycle>,
    state_cv: Condvar,
    failure_hook: RwLock<Option<FailureHook>>,
    counters: Counters,
}

impl Shared {
    fn is_cycle_thread(&self) -> bool {
        self.thread_id.get() == Some(&thread::current().id())
    }

    fn request_stop_locked(&self, lifecycle: &mut Lifecycle) -> bool {
        if lifecycle.state != CyclerState::Running {
            return false;
        }
        lifecycle.state = CyclerState::Stopped;
        self.running.store(false, Ordering::Release);
        self.stop_requested.store(true, Ordering::Release);
        log::debug!("[{}] Stop requested.", self.name);
        true
    }

    fn thread_main(&self, sleep: Duration, init: Option<InitFn>) {
        let _ = self.thread_id.set(thread::current().id());
        log::info!("[{}] Cycle thread started.", self.name);

        if let Some(init) = init {
            self.run_guarded(JobKind::Init, init);
        }
        lock(&self.lifecycle).started = true;
        self.state_cv.notify_all();

        self.do_cycle(sleep);

        let dropped = self.tasks.close();
        if !dropped.is_empty() {
            log::debug!("[{}] Dropping {} pending task(s).", self.name, dropped.len());
        }
        drop(dropped);
        // Recurring jobs may hold handles back to this cycler.
        self.works.clear();

        lock(&self.lifecycle).exited = true;
        self.state_cv.notify_all();
        log::info!("[{}] Cycle thread stopped.", self.name);
    }

    fn do_cycle(&self, sleep: Duration) {
        let mut works: Vec<(WorkHandle, RecurringJob)> = Vec::new();

        while self.running.load(Ordering::Acquire) {
            for task in self.tasks.drain_all() {
                self.run_guarded(JobKind::Task, task);
                self.counters.tasks_run.fetch_add(1, Ordering::Relaxed);
            }

            self.works.snapshot_into(&mut works);
            for (handle, work) in works.drain(..) {
                // Removed by an earlier job of this iteration.
                if !self.works.is_alive(handle) {
                    continue;
                }
                self.run_guarded(JobKind::Work(handle), || work());
                self.counters.works_run.fetch_add(1, Ordering::Relaxed);
            }

            self.counters.iterations.fetch_add(1, Ordering::Relaxed);
            if !sleep.is_zero() {
                thread::sleep(sleep);
            }
        }
    }

    fn run_guarded(&self, kind: JobKind, job: impl FnOnce()) {
        let Err(err) = job::run_caught(job) else {
            return;
        };
        let message = match err {
            JobError::Panicked(message) => message,
            other => other.to_string(),
        };
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
        log::error!("[{}] {} panicked: {}", self.name, kind, message);

        let hook = self
            .failure_hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            let failure = JobFailure {
                cycler: self.name.clone(),
                kind,
                message,
            };
            if job::run_caught(|| hook(&failure)).is_err() {
                log::error!("[{}] Job failure hook panicked.", self.name);
            }
        }
    }
}

/// A cloneable producer-side handle to a [`ThreadCycler`].
///
/// Jobs capture a handle to call back into their own cycler (queue follow-up
/// tasks, add or remove recurring work). Dropping a handle never stops the
/// cycler; only the owning [`ThreadCycler`] does.
#[derive(Clone)]
pub struct CyclerHandle {
    shared: Arc<Shared>,
}

impl CyclerHandle {
    /// Returns the cycler's name, also used as its thread name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queues a one-off job for the next iteration.
    ///
    /// Returns `false` (dropping the job) once the cycle thread has exited.
    pub fn enqueue_task<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.tasks.enqueue(Box::new(f))
    }

    /// Queues a one-off job that receives a [`CycleToken`] for this thread.
    pub fn enqueue_affine<F>(&self, f: F) -> bool
    where
        F: FnOnce(&CycleToken) + Send + 'static,
    {
        // Queued tasks only ever run on the cycle thread.
        self.enqueue_task(move || f(&CycleToken::new(thread::current().id())))
    }

    /// Queues `f` and returns a future resolving to its value.
    ///
    /// A panic in `f` resolves the future with [`JobError::Panicked`]; if the
    /// cycle thread exits before running it, with [`JobError::Dropped`].
    pub fn enqueue_future<F, T>(&self, f: F) -> JobFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.shared.tasks.enqueue_future(f)
    }

    /// Registers recurring work, at the end of the order or right after `after`.
    pub fn create_work<F>(&self, f: F, after: Option<WorkHandle>) -> WorkHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.works.create_work(Arc::new(f), after)
    }

    /// Removes recurring work. Dead or stale handles are ignored (`false`).
    pub fn remove_work(&self, handle: WorkHandle) -> bool {
        self.shared.works.remove_work(handle)
    }

    /// Moves live recurring work to the end of the order.
    pub fn move_work_to_end(&self, handle: WorkHandle) -> bool {
        self.shared.works.move_work_to_end(handle)
    }

    /// Returns the current recurring work order.
    pub fn work_order(&self) -> Vec<WorkHandle> {
        self.shared.works.order()
    }

    /// Returns `true` if `handle` designates live recurring work.
    pub fn is_work_alive(&self, handle: WorkHandle) -> bool {
        self.shared.works.is_alive(handle)
    }

    /// Returns a token if the caller runs on this cycler's thread while it is
    /// running.
    ///
    /// Fails with [`AffinityError::NotRunning`] as soon as a stop was
    /// requested, including for jobs still finishing the last iteration.
    pub fn check_thread(&self) -> Result<CycleToken, AffinityError> {
        let name = || self.shared.name.clone();
        let Some(&expected) = self.shared.thread_id.get() else {
            return Err(AffinityError::NotRunning { name: name() });
        };
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(AffinityError::NotRunning { name: name() });
        }
        let actual = thread::current().id();
        if actual != expected {
            return Err(AffinityError::WrongThread {
                name: name(),
                expected,
                actual,
            });
        }
        Ok(CycleToken::new(actual))
    }

    /// Asserts that the caller runs on this cycler's live thread.
    ///
    /// # Panics
    /// Panics if called from another thread or while the cycle thread is not
    /// running. This is a precondition violation, not a recoverable error.
    #[track_caller]
    pub fn validate_thread(&self) -> CycleToken {
        match self.check_thread() {
            Ok(token) => token,
            Err(err) => panic!("Axle precondition violated: {err}"),
        }
    }

    /// Returns `true` if the caller runs on the cycle thread.
    pub fn is_current_thread(&self) -> bool {
        self.shared.is_cycle_thread()
    }

    /// Asks the cycle thread to stop after its current iteration, without waiting.
    pub fn request_stop(&self) {
        let mut lifecycle = lock(&self.shared.lifecycle);
        self.shared.request_stop_locked(&mut lifecycle);
    }

    /// Returns a flag long-running jobs can poll to cooperate with a stop.
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            flag: Arc::clone(&self.shared.stop_requested),
        }
    }

    /// Blocks until the cycle thread finished its init job and entered its loop.
    pub fn await_start(&self) {
        let lifecycle = lock(&self.shared.lifecycle);
        let _started = self
            .shared
            .state_cv
            .wait_while(lifecycle, |lc| !lc.started)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`await_start`](Self::await_start) but gives up after `timeout`.
    /// Returns `true` if the thread has started.
    pub fn await_start_timeout(&self, timeout: Duration) -> bool {
        let lifecycle = lock(&self.shared.lifecycle);
        let (lifecycle, _) = self
            .shared
            .state_cv
            .wait_timeout_while(lifecycle, timeout, |lc| !lc.started)
            .unwrap_or_else(PoisonError::into_inner);
        lifecycle.started
    }

    /// Returns `true` while the cycler runs and no stop was requested.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Returns `true` once the cycle thread has finished its init job.
    pub fn is_started(&self) -> bool {
        lock(&self.shared.lifecycle).started
    }

    /// Returns `true` once the cycle thread has left its loop.
    pub fn is_stopped(&self) -> bool {
        lock(&self.shared.lifecycle).exited
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> CyclerState {
        lock(&self.shared.lifecycle).state
    }

    /// Installs a callback invoked (on the cycle thread) for every job that panics.
    pub fn set_failure_hook<F>(&self, hook: F)
    where
        F: Fn(&JobFailure) + Send + Sync + 'static,
    {
        *self
            .shared
            .failure_hook
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Returns a snapshot of the cycler's counters.
    pub fn stats(&self) -> CycleStats {
        let c = &self.shared.counters;
        CycleStats {
            iterations: c.iterations.load(Ordering::Relaxed),
            tasks_run: c.tasks_run.load(Ordering::Relaxed),
            works_run: c.works_run.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for CyclerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CyclerHandle")
            .field("name", &self.shared.name)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Owner of a dedicated cycle thread.
///
/// Dereferences to its [`CyclerHandle`], so every producer-side operation is
/// available directly. Dropping the cycler stops and joins its thread.
pub struct ThreadCycler {
    handle: CyclerHandle,
}

impl ThreadCycler {
    /// Creates a cycler that has not started its thread yet.
    pub fn new(name: impl Into<String>) -> Self {
        let shared = Shared {
            name: name.into(),
            tasks: TaskQueue::new(),
            works: WorkTable::new(),
            running: AtomicBool::new(false),
            stop_requested: Arc::new(AtomicBool::new(false)),
            thread_id: OnceLock::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: CyclerState::NotStarted,
                started: false,
                exited: false,
                handle: None,
            }),
            state_cv: Condvar::new(),
            failure_hook: RwLock::new(None),
            counters: Counters::default(),
        };
        Self {
            handle: CyclerHandle {
                shared: Arc::new(shared),
            },
        }
    }

    /// Returns a cloneable producer handle.
    pub fn handle(&self) -> CyclerHandle {
        self.handle.clone()
    }

    /// Spawns the cycle thread.
    ///
    /// `init` runs once on the new thread before the first iteration; pair it
    /// with [`CyclerHandle::await_start`] to wait for it. Calling `start` while
    /// running is a no-op. A stopped cycler cannot be restarted.
    pub fn start(&self, sleep: Duration, init: Option<InitFn>) -> Result<(), CyclerError> {
        let shared = &self.handle.shared;
        let mut lifecycle = lock(&shared.lifecycle);
        match lifecycle.state {
            CyclerState::Running => {
                log::debug!("[{}] Start ignored: already running.", shared.name);
                return Ok(());
            }
            CyclerState::Stopped => {
                return Err(CyclerError::Terminated {
                    name: shared.name.clone(),
                });
            }
            CyclerState::NotStarted => {}
        }

        shared.running.store(true, Ordering::Release);
        let thread_shared = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name(shared.name.clone())
            .spawn(move || thread_shared.thread_main(sleep, init));

        match spawned {
            Ok(handle) => {
                lifecycle.state = CyclerState::Running;
                lifecycle.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                shared.running.store(false, Ordering::Release);
                log::error!("[{}] Failed to spawn cycle thread: {}", shared.name, err);
                Err(CyclerError::Spawn(err))
            }
        }
    }

    /// Stops the cycler after its current iteration.
    ///
    /// With `join`, blocks until the thread has exited. This waits for as long
    /// as the running job takes. Called from the cycle thread itself, it never
    /// joins and only requests the stop.
    pub fn stop(&self, join: bool) {
        let shared = &self.handle.shared;
        let mut lifecycle = lock(&shared.lifecycle);
        shared.request_stop_locked(&mut lifecycle);

        if !join || lifecycle.state == CyclerState::NotStarted {
            return;
        }
        if shared.is_cycle_thread() {
            log::warn!(
                "[{}] stop(join) called from the cycle thread; not joining.",
                shared.name
            );
            return;
        }

        match lifecycle.handle.take() {
            Some(handle) => {
                drop(lifecycle);
                if handle.join().is_err() {
                    log::error!("[{}] Cycle thread terminated abnormally.", shared.name);
                }
            }
            None => {
                // Joined by another caller, or detached: wait for the exit mark.
                let _exited = shared
                    .state_cv
                    .wait_while(lifecycle, |lc| !lc.exited)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }

    /// Stops the cycler and waits at most `timeout` for its thread to exit.
    ///
    /// On timeout the thread is detached and left to finish on its own.
    pub fn stop_timeout(&self, timeout: Duration) -> StopOutcome {
        let shared = &self.handle.shared;
        let mut lifecycle = lock(&shared.lifecycle);
        shared.request_stop_locked(&mut lifecycle);

        if lifecycle.state == CyclerState::NotStarted {
            return StopOutcome::Joined;
        }
        if shared.is_cycle_thread() {
            return StopOutcome::Requested;
        }

        let (mut lifecycle, _) = shared
            .state_cv
            .wait_timeout_while(lifecycle, timeout, |lc| !lc.exited)
            .unwrap_or_else(PoisonError::into_inner);

        if lifecycle.exited {
            if let Some(handle) = lifecycle.handle.take() {
                drop(lifecycle);
                let _ = handle.join();
            }
            StopOutcome::Joined
        } else {
            if lifecycle.handle.take().is_some() {
                log::warn!(
                    "[{}] Cycle thread did not exit within {:?}; detaching it.",
                    shared.name,
                    timeout
                );
            }
            StopOutcome::Detached
        }
    }
}

impl Deref for ThreadCycler {
    type Target = CyclerHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for ThreadCycler {
    fn drop(&mut self) {
        self.stop(true);
    }
}

impl fmt::Debug for ThreadCycler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadCycler")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
