//! Rendezvous integration tests with real worker threads.

#![allow(missing_docs)]

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracesched::test_utils::init_test_logging;
use tracesched::{Scheduler, TestId, TestPhase};

fn init_test(name: &str) {
    init_test_logging();
    tracesched::test_phase!(name);
}

fn t(n: u32) -> TestId {
    TestId::new(n)
}

/// Polls until a rendezvous round is observably open.
fn await_round_open(sched: &Scheduler) {
    for _ in 0..2000 {
        if sched.rendezvous_open() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("rendezvous round never opened");
}

#[test]
fn four_way_rendezvous_releases_everyone() {
    init_test("four_way_rendezvous_releases_everyone");
    let sched = Arc::new(Scheduler::new());
    let released = Arc::new(AtomicUsize::new(0));

    for n in 0..4 {
        sched.register(None, t(n));
    }

    let mut workers = Vec::new();
    for n in 1..4u32 {
        let sched = Arc::clone(&sched);
        let released = Arc::clone(&released);
        workers.push(thread::spawn(move || {
            sched.bind_thread(t(n));
            // Stagger arrivals so every arrival order gets exercised
            // across runs.
            thread::sleep(Duration::from_millis(u64::from(n) * 3));
            sched.sync_all(t(n), "post-init");
            released.fetch_add(1, Ordering::SeqCst);
        }));
    }

    sched.sync_all(t(0), "post-init");
    released.fetch_add(1, Ordering::SeqCst);

    for worker in workers {
        worker.join().expect("worker thread");
    }

    let count = released.load(Ordering::SeqCst);
    tracesched::assert_with_log!(count == 4, "all participants released", 4usize, count);
    assert!(!sched.rendezvous_open());
    for n in 0..4 {
        assert_eq!(sched.phase_of(t(n)), Some(TestPhase::Running));
    }
    tracesched::test_complete!("four_way_rendezvous_releases_everyone");
}

#[test]
fn consecutive_rounds_may_reuse_the_point_name() {
    init_test("consecutive_rounds_may_reuse_the_point_name");
    let sched = Arc::new(Scheduler::new());
    sched.register(None, t(0));
    sched.register(None, t(1));

    let worker_sched = Arc::clone(&sched);
    let worker = thread::spawn(move || {
        worker_sched.bind_thread(t(1));
        worker_sched.sync_all(t(1), "checkpoint");
        worker_sched.sync_all(t(1), "checkpoint");
    });

    sched.sync_all(t(0), "checkpoint");
    sched.sync_all(t(0), "checkpoint");
    worker.join().expect("worker thread");
    assert!(!sched.rendezvous_open());
    tracesched::test_complete!("consecutive_rounds_may_reuse_the_point_name");
}

#[test]
fn initiator_keeps_the_token_it_held() {
    init_test("initiator_keeps_the_token_it_held");
    let sched = Arc::new(Scheduler::new());
    sched.register(None, t(0));
    sched.register(None, t(1));

    sched.acquire_turn(t(0));
    let ctx0 = sched.context_of(t(0)).expect("context");

    let worker_sched = Arc::clone(&sched);
    let worker = thread::spawn(move || {
        worker_sched.bind_thread(t(1));
        // Arrive second so test 0 is deterministically the initiator.
        await_round_open(&worker_sched);
        worker_sched.sync_all(t(1), "post-init");
    });

    sched.sync_all(t(0), "post-init");
    // The round restored exclusivity to the initiator's context, so the
    // other participant is still parked in its final turn wait.
    assert_eq!(sched.token_context(), Some(ctx0));
    assert_eq!(sched.phase_of(t(0)), Some(TestPhase::Running));

    sched.release_turn(t(0));
    worker.join().expect("worker thread");
    assert_eq!(sched.phase_of(t(1)), Some(TestPhase::Running));
    tracesched::test_complete!("initiator_keeps_the_token_it_held");
}

#[test]
fn rendezvous_without_prior_token_stays_free() {
    init_test("rendezvous_without_prior_token_stays_free");
    let sched = Arc::new(Scheduler::new());
    sched.register(None, t(0));
    sched.register(None, t(1));

    let worker_sched = Arc::clone(&sched);
    let worker = thread::spawn(move || {
        worker_sched.bind_thread(t(1));
        worker_sched.sync_all(t(1), "aligned");
    });

    sched.sync_all(t(0), "aligned");
    worker.join().expect("worker thread");
    // Nobody held the token going in, so nobody holds it coming out.
    assert!(sched.token_context().is_none());
    tracesched::test_complete!("rendezvous_without_prior_token_stays_free");
}

#[test]
fn mismatched_point_name_is_fatal() {
    init_test("mismatched_point_name_is_fatal");
    let sched = Arc::new(Scheduler::new());
    for n in 0..3 {
        sched.register(None, t(n));
    }

    let mut arrivals = Vec::new();
    for n in [0u32, 2] {
        let sched = Arc::clone(&sched);
        arrivals.push(thread::spawn(move || {
            sched.bind_thread(t(n));
            sched.sync_all(t(n), "alpha");
        }));
    }

    await_round_open(&sched);
    let result = catch_unwind(AssertUnwindSafe(|| sched.sync_all(t(1), "beta")));
    let err = result.expect_err("mismatched point must abort");
    let message = err
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default();
    tracesched::assert_with_log!(
        message.contains("scheduler contract violated"),
        "panic names the violation",
        "scheduler contract violated",
        message
    );

    // The fatal path dropped the state guard before panicking, so the
    // round is still live and can complete normally.
    sched.sync_all(t(1), "alpha");
    for arrival in arrivals {
        arrival.join().expect("arrival thread");
    }
    assert!(!sched.rendezvous_open());
    tracesched::test_complete!("mismatched_point_name_is_fatal");
}

#[test]
fn participant_leaving_mid_round_unblocks_the_rest() {
    init_test("participant_leaving_mid_round_unblocks_the_rest");
    let sched = Arc::new(Scheduler::new());
    for n in 0..3 {
        sched.register(None, t(n));
    }

    let initiator_sched = Arc::clone(&sched);
    let initiator = thread::spawn(move || {
        initiator_sched.bind_thread(t(0));
        initiator_sched.sync_all(t(0), "drain");
    });

    await_round_open(&sched);
    // Test 2 tears down instead of arriving; the required arrival set
    // shrinks to the remaining two.
    sched.wait_for_turn(t(2));
    sched.unregister(t(2));
    sched.sync_all(t(1), "drain");

    initiator.join().expect("initiator thread");
    assert!(!sched.rendezvous_open());
    assert_eq!(sched.registered_count(), 2);
    tracesched::test_complete!("participant_leaving_mid_round_unblocks_the_rest");
}
