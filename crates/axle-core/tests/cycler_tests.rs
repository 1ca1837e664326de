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

use axle_core::{
    AffinityError, CyclerError, CyclerHandle, CyclerState, JobError, JobKind, StopOutcome, ThreadCycler,
    WorkHandle,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Polls `cond` until it holds or the timeout elapses.
fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn tasks_queued_before_an_iteration_run_once_in_fifo_order() {
    // --- 1. ARRANGE ---
    let cycler = ThreadCycler::new("fifo");
    let seen = Arc::new(Mutex::new(Vec::new()));
    for i in 0..10 {
        let seen = seen.clone();
        let handle = cycler.handle();
        cycler.enqueue_task(move || {
            let iteration = handle.stats().iterations;
            seen.lock().unwrap().push((i, iteration));
        });
    }

    // --- 2. ACT ---
    cycler.start(Duration::from_millis(20), None).unwrap();
    assert!(wait_until(|| cycler.stats().iterations >= 3));
    cycler.stop(true);

    // --- 3. ASSERT ---
    let seen = seen.lock().unwrap();
    let order: Vec<_> = seen.iter().map(|(i, _)| *i).collect();
    assert_eq!(order, (0..10).collect::<Vec<_>>(), "Tasks must run once, in FIFO order");
    assert!(
        seen.iter().all(|(_, iteration)| *iteration == 0),
        "Every task queued before start must run in the first iteration"
    );
    assert_eq!(cycler.stats().tasks_run, 10);
}

#[test]
fn starting_twice_spawns_one_thread_and_runs_init_once() {
    let cycler = ThreadCycler::new("twice");
    let inits = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let inits = inits.clone();
        cycler
            .start(
                Duration::from_millis(1),
                Some(Box::new(move || {
                    inits.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
    }
    cycler.await_start();

    assert_eq!(inits.load(Ordering::SeqCst), 1);
    let first = cycler.enqueue_future(|| thread::current().id()).wait().unwrap();
    let second = cycler.enqueue_future(|| thread::current().id()).wait().unwrap();
    assert_eq!(first, second, "All jobs must share the single cycle thread");
    let name = cycler
        .enqueue_future(|| thread::current().name().map(str::to_string))
        .wait()
        .unwrap();
    assert_eq!(name.as_deref(), Some("twice"));
}

#[test]
fn init_completes_before_await_start_returns() {
    let cycler = ThreadCycler::new("init-barrier");
    let ready = Arc::new(AtomicUsize::new(0));
    let flag = ready.clone();
    cycler
        .start(
            Duration::from_millis(1),
            Some(Box::new(move || {
                thread::sleep(Duration::from_millis(30));
                flag.store(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

    cycler.await_start();
    assert_eq!(ready.load(Ordering::SeqCst), 1);
    assert!(cycler.is_started());
}

#[test]
fn stop_with_join_returns_after_thread_exit() {
    let cycler = ThreadCycler::new("join");
    cycler.start(Duration::from_millis(1), None).unwrap();
    cycler.await_start();
    assert!(cycler.is_running());

    cycler.stop(true);

    assert!(!cycler.is_running());
    assert!(cycler.is_stopped(), "Thread must have exited once stop(true) returns");
    assert_eq!(cycler.state(), CyclerState::Stopped);

    // Idempotent.
    cycler.stop(true);
    assert!(cycler.is_stopped());
}

#[test]
fn stopped_cycler_cannot_restart() {
    let cycler = ThreadCycler::new("terminal");
    cycler.start(Duration::ZERO, None).unwrap();
    cycler.stop(true);
    assert!(matches!(
        cycler.start(Duration::ZERO, None),
        Err(CyclerError::Terminated { .. })
    ));
}

#[test]
fn back_to_back_futures_resolve_independently_in_order() {
    let cycler = ThreadCycler::new("futures");
    let order = Arc::new(Mutex::new(Vec::new()));
    cycler.start(Duration::from_millis(1), None).unwrap();

    let o1 = order.clone();
    let first = cycler.enqueue_future(move || {
        o1.lock().unwrap().push("first");
        (1..=10).sum::<u32>()
    });
    let o2 = order.clone();
    let second = cycler.enqueue_future(move || {
        o2.lock().unwrap().push("second");
        "ten".repeat(2)
    });

    assert_eq!(first.wait(), Ok(55));
    assert_eq!(second.wait(), Ok("tenten".to_string()));
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn recurring_work_runs_in_order_every_iteration() {
    let cycler = ThreadCycler::new("order");
    let trace = Arc::new(Mutex::new(Vec::new()));

    let push = |tag: &'static str| {
        let trace = trace.clone();
        move || trace.lock().unwrap().push(tag)
    };
    let a = cycler.create_work(push("A"), None);
    let b = cycler.create_work(push("B"), Some(a));
    let c = cycler.create_work(push("C"), None);
    assert_eq!(cycler.work_order(), vec![a, b, c]);
    assert!(cycler.move_work_to_end(a));
    assert_eq!(cycler.work_order(), vec![b, c, a]);

    cycler.start(Duration::from_millis(1), None).unwrap();
    assert!(wait_until(|| trace.lock().unwrap().len() >= 9));
    cycler.stop(true);

    let trace = trace.lock().unwrap();
    let full = trace.len() - trace.len() % 3;
    for chunk in trace[..full].chunks(3) {
        assert_eq!(chunk, ["B", "C", "A"]);
    }
}

#[test]
fn one_off_tasks_run_before_recurring_work() {
    let cycler = ThreadCycler::new("phases");
    let trace = Arc::new(Mutex::new(Vec::new()));

    let t = trace.clone();
    cycler.create_work(move || t.lock().unwrap().push("work"), None);
    let t = trace.clone();
    cycler.enqueue_task(move || t.lock().unwrap().push("task"));

    cycler.start(Duration::from_millis(50), None).unwrap();
    assert!(wait_until(|| trace.lock().unwrap().len() >= 2));
    cycler.stop(true);

    assert_eq!(&trace.lock().unwrap()[..2], ["task", "work"]);
}

#[test]
fn jobs_can_reenter_the_scheduler() {
    let cycler = ThreadCycler::new("reentrant");
    let runs = Arc::new(AtomicUsize::new(0));
    let own_handle: Arc<OnceLock<WorkHandle>> = Arc::new(OnceLock::new());

    // A recurring job that removes itself on its first run.
    let handle = cycler.handle();
    let me = own_handle.clone();
    let counter = runs.clone();
    let work = cycler.create_work(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = me.get() {
                handle.remove_work(*me);
            }
        },
        None,
    );
    own_handle.set(work).unwrap();

    // A task that registers follow-up work and queues another task.
    let follow_up = Arc::new(AtomicUsize::new(0));
    let handle = cycler.handle();
    let f = follow_up.clone();
    cycler.enqueue_task(move || {
        let f2 = f.clone();
        handle.create_work(
            move || {
                f2.fetch_add(1, Ordering::SeqCst);
            },
            None,
        );
        handle.enqueue_task(move || {
            f.fetch_add(100, Ordering::SeqCst);
        });
    });

    cycler.start(Duration::from_millis(1), None).unwrap();
    assert!(wait_until(|| follow_up.load(Ordering::SeqCst) >= 103));
    cycler.stop(true);

    assert_eq!(runs.load(Ordering::SeqCst), 1, "Self-removing work must run exactly once");
    assert!(!cycler.is_work_alive(work));
}

#[test]
fn work_removed_mid_iteration_is_skipped() {
    let cycler = ThreadCycler::new("skip");
    let victim_runs = Arc::new(AtomicUsize::new(0));
    let victim_slot: Arc<OnceLock<WorkHandle>> = Arc::new(OnceLock::new());

    let handle = cycler.handle();
    let slot = victim_slot.clone();
    cycler.create_work(
        move || {
            if let Some(victim) = slot.get() {
                handle.remove_work(*victim);
            }
        },
        None,
    );
    let runs = victim_runs.clone();
    let victim = cycler.create_work(
        move || {
            runs.fetch_add(1, Ordering::SeqCst);
        },
        None,
    );
    victim_slot.set(victim).unwrap();

    cycler.start(Duration::from_millis(1), None).unwrap();
    assert!(wait_until(|| cycler.stats().iterations >= 3));
    cycler.stop(true);

    assert_eq!(victim_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_jobs_are_reported_and_the_loop_survives() {
    let cycler = ThreadCycler::new("failures");
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();
    cycler.set_failure_hook(move |failure| sink.lock().unwrap().push(failure.clone()));

    let healthy = Arc::new(AtomicUsize::new(0));
    cycler.create_work(|| panic!("recurring failure"), None);
    let h = healthy.clone();
    cycler.create_work(
        move || {
            h.fetch_add(1, Ordering::SeqCst);
        },
        None,
    );
    cycler.enqueue_task(|| panic!("one-off failure"));
    cycler.start(Duration::from_millis(1), None).unwrap();

    let after = cycler.enqueue_future(|| 7);
    assert_eq!(after.wait(), Ok(7));
    let failing = cycler.enqueue_future(|| -> u8 { panic!("future failure") });
    assert_eq!(
        failing.wait(),
        Err(JobError::Panicked("future failure".to_string()))
    );

    assert!(wait_until(|| healthy.load(Ordering::SeqCst) >= 3));
    cycler.stop(true);

    let reported = reported.lock().unwrap();
    assert!(reported
        .iter()
        .any(|f| f.kind == JobKind::Task && f.message == "one-off failure"));
    assert!(reported
        .iter()
        .any(|f| matches!(f.kind, JobKind::Work(_)) && f.message == "recurring failure"));
    assert_eq!(cycler.stats().failures as usize, reported.len());
}

#[test]
fn thread_validation_only_passes_on_the_cycle_thread() {
    let cycler = ThreadCycler::new("affinity");
    cycler.start(Duration::from_millis(1), None).unwrap();
    cycler.await_start();

    assert!(matches!(
        cycler.check_thread(),
        Err(AffinityError::WrongThread { .. })
    ));

    let handle = cycler.handle();
    let inside = cycler
        .enqueue_future(move || handle.check_thread().map(|t| t.thread_id()))
        .wait()
        .unwrap();
    let cycle_thread = cycler.enqueue_future(|| thread::current().id()).wait().unwrap();
    assert_eq!(inside, Ok(cycle_thread));

    let (tx, rx) = flume::bounded(1);
    cycler.enqueue_affine(move |token| {
        tx.send(token.thread_id()).unwrap();
    });
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), cycle_thread);

    cycler.stop(true);
    assert!(matches!(
        cycler.check_thread(),
        Err(AffinityError::NotRunning { .. })
    ));
}

#[test]
fn thread_validation_fails_once_a_stop_is_requested() {
    let cycler = ThreadCycler::new("affinity-stopping");
    let handle = cycler.handle();
    let (tx, rx) = flume::bounded(1);
    cycler.start(Duration::from_millis(1), None).unwrap();
    cycler.enqueue_task(move || {
        handle.request_stop();
        let _ = tx.send(handle.check_thread().map(|t| t.thread_id()));
    });

    let result = rx.recv_timeout(TIMEOUT).unwrap();
    assert!(matches!(result, Err(AffinityError::NotRunning { .. })));
    cycler.stop(true);
}

#[test]
#[should_panic(expected = "precondition violated")]
fn validate_thread_panics_off_thread() {
    let cycler = ThreadCycler::new("validate");
    cycler.start(Duration::from_millis(1), None).unwrap();
    cycler.await_start();
    cycler.validate_thread();
}

#[test]
fn stop_timeout_detaches_a_blocked_job() {
    let cycler = ThreadCycler::new("blocked");
    let (release_tx, release_rx) = flume::bounded::<()>(1);
    let (entered_tx, entered_rx) = flume::bounded::<()>(1);
    cycler.start(Duration::from_millis(1), None).unwrap();
    cycler.enqueue_task(move || {
        entered_tx.send(()).unwrap();
        let _ = release_rx.recv();
    });
    entered_rx.recv_timeout(TIMEOUT).unwrap();

    assert_eq!(
        cycler.stop_timeout(Duration::from_millis(30)),
        StopOutcome::Detached
    );
    assert!(!cycler.is_running());
    assert!(!cycler.is_stopped(), "The blocked job is still running");

    release_tx.send(()).unwrap();
    assert!(wait_until(|| cycler.is_stopped()));
}

#[test]
fn long_jobs_can_cooperate_through_the_stop_signal() {
    let cycler = ThreadCycler::new("cooperative");
    let signal = cycler.stop_signal();
    let (entered_tx, entered_rx) = flume::bounded::<()>(1);
    cycler.start(Duration::from_millis(1), None).unwrap();
    cycler.enqueue_task(move || {
        entered_tx.send(()).unwrap();
        while !signal.is_stop_requested() {
            thread::sleep(Duration::from_millis(1));
        }
    });
    entered_rx.recv_timeout(TIMEOUT).unwrap();

    assert_eq!(cycler.stop_timeout(TIMEOUT), StopOutcome::Joined);
    assert!(cycler.is_stopped());
}

#[test]
fn a_job_can_stop_its_own_cycler() {
    let cycler = ThreadCycler::new("self-stop");
    let handle = cycler.handle();
    cycler.start(Duration::from_millis(1), None).unwrap();
    cycler.enqueue_task(move || handle.request_stop());

    assert!(wait_until(|| cycler.is_stopped()));
    assert_eq!(cycler.state(), CyclerState::Stopped);
}

#[test]
fn tasks_after_exit_are_rejected() {
    let cycler = ThreadCycler::new("closed");
    cycler.start(Duration::ZERO, None).unwrap();
    cycler.stop(true);

    assert!(!cycler.enqueue_task(|| {}));
    assert_eq!(cycler.enqueue_future(|| 1).wait(), Err(JobError::Dropped));
}

#[test]
fn zero_sleep_loops_without_delay() {
    let cycler = ThreadCycler::new("uncapped");
    cycler.start(Duration::ZERO, None).unwrap();
    assert!(wait_until(|| cycler.stats().iterations >= 1_000));
    cycler.stop(true);
}

/// Removes its companion work from the cycler when dropped.
struct RemoveOnDrop {
    handle: CyclerHandle,
    companion: WorkHandle,
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        self.handle.remove_work(self.companion);
    }
}

#[test]
fn work_captures_may_touch_the_cycler_while_being_dropped() {
    // --- 1. ARRANGE ---
    let cycler = ThreadCycler::new("drop-reentry");
    let companion = cycler.create_work(|| {}, None);
    let guard = RemoveOnDrop {
        handle: cycler.handle(),
        companion,
    };
    let owner = cycler.create_work(
        move || {
            let _keep = &guard;
        },
        None,
    );
    let second = cycler.create_work(|| {}, None);
    let second_guard = RemoveOnDrop {
        handle: cycler.handle(),
        companion: second,
    };
    cycler.create_work(
        move || {
            let _keep = &second_guard;
        },
        None,
    );

    // --- 2. ACT ---
    assert!(cycler.remove_work(owner));
    assert!(!cycler.is_work_alive(companion));

    cycler.start(Duration::from_millis(1), None).unwrap();
    cycler.await_start();
    cycler.request_stop();

    // --- 3. ASSERT ---
    assert!(wait_until(|| cycler.is_stopped()), "cycle thread never exited");
    cycler.stop(true);
    assert!(cycler.work_order().is_empty());
}
