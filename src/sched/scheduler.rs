//! The run-token monitor.
//!
//! [`Scheduler`] serializes access to one shared GPU command-submission
//! channel across N concurrently running test threads. One mutex guards
//! the whole [`SchedState`]; one condition variable is notified after
//! every mutation that can change a wait predicate (token assignment,
//! active-member change, membership change, rendezvous arrival or
//! completion). The only suspension point is the turn predicate
//! `token is free OR token names me`; every other blocking operation is
//! built from it.
//!
//! # Turn protocol
//!
//! ```text
//! Registered --(wait_for_turn)--> Running --(release/yield)--> ...
//! ```
//!
//! A free token means no test has asked for exclusivity yet, and every
//! registered test may proceed. This escape hatch keeps a system in
//! which nobody calls [`Scheduler::acquire_turn`] deadlock-free.
//!
//! # Liveness contract
//!
//! The scheduler detects misuse (see [`ContractViolation`]) but not
//! absence: a registered test that never arrives at an open rendezvous
//! point blocks the round forever. That hang is the caller's bug; the
//! slow-wait warning configured by [`SchedConfig`] is its diagnostic.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::SchedConfig;
use crate::error::{fatal, ConfigError, ContractViolation};
use crate::sched::state::{SchedState, TestPhase};
use crate::types::{ContextId, TestId};

/// Cooperative run-token scheduler for one shared GPU channel.
///
/// All operations take an explicit [`TestId`] rather than inferring the
/// test from the calling thread, so a single thread may drive several
/// tests through setup and a test may migrate to a worker thread (see
/// [`Scheduler::bind_thread`]).
#[derive(Debug)]
pub struct Scheduler {
    state: Mutex<SchedState>,
    turn_cvar: Condvar,
    config: SchedConfig,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates a scheduler with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SchedConfig::default())
    }

    /// Creates a scheduler with an explicit configuration.
    #[must_use]
    pub fn with_config(config: SchedConfig) -> Self {
        Self {
            state: Mutex::new(SchedState::new()),
            turn_cvar: Condvar::new(),
            config,
        }
    }

    /// Creates a scheduler configured from `TRACESCHED_*` env overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::with_config(SchedConfig::from_env()?))
    }

    /// Registers `test`, joining the context named `context_name` or a
    /// fresh anonymous context when the name is empty or absent.
    ///
    /// Idempotent for repeated calls with identical arguments. Records
    /// the calling thread as the test's owner until `bind_thread`.
    pub fn register(&self, context_name: Option<&str>, test: TestId) {
        let owner = std::thread::current().id();
        let mut state = self.lock();
        let ctx = state.register(context_name, test, owner);
        tracing::debug!(
            test = %test,
            context = %ctx,
            name = context_name.unwrap_or(""),
            "test registered"
        );
        self.turn_cvar.notify_all();
    }

    /// Rebinds `test` to the calling thread.
    ///
    /// Required when a test registers from a setup thread and later
    /// plays its trace back from a dedicated worker thread.
    pub fn bind_thread(&self, test: TestId) {
        let owner = std::thread::current().id();
        let mut state = self.lock();
        if state.bind_thread(test, owner) {
            tracing::trace!(test = %test, ?owner, "test bound to worker thread");
        } else {
            tracing::trace!(test = %test, "bind_thread for unregistered test ignored");
        }
    }

    /// Unregisters `test` and unconditionally frees the token.
    ///
    /// # Contract
    ///
    /// The caller must hold the run token (call [`Self::wait_for_turn`]
    /// first); unregistering while another context owns the channel is a
    /// fatal violation. Unregistering an unknown test is a no-op.
    pub fn unregister(&self, test: TestId) {
        let mut state = self.lock();
        if !state.is_registered(test) {
            tracing::trace!(test = %test, "unregister for unregistered test ignored");
            return;
        }
        if let Err(violation) = state.check_unregister(test) {
            drop(state);
            fatal(&violation);
        }
        state.unregister(test);
        tracing::debug!(test = %test, "test unregistered; token freed");
        self.turn_cvar.notify_all();
    }

    /// Blocks until the token is free or names `test`, then marks the
    /// test `Running`. No-op for an unregistered test.
    pub fn wait_for_turn(&self, test: TestId) {
        let state = self.lock();
        if !state.is_registered(test) {
            tracing::trace!(test = %test, "wait_for_turn for unregistered test ignored");
            return;
        }
        drop(self.wait_for_turn_locked(state, test));
    }

    /// Waits for the turn, then claims exclusivity for `test`'s context.
    ///
    /// After this returns, every test outside the context (and every
    /// mate within it) blocks in `wait_for_turn` until a matching
    /// [`Self::release_turn`] or a yield hands the token onward.
    pub fn acquire_turn(&self, test: TestId) {
        let mut state = self.lock();
        if !state.is_registered(test) {
            tracing::trace!(test = %test, "acquire_turn for unregistered test ignored");
            return;
        }
        state = self.wait_for_turn_locked(state, test);
        state.acquire(test);
        tracing::debug!(test = %test, token = ?state.token, "turn acquired");
        self.turn_cvar.notify_all();
    }

    /// Waits for the turn, then frees the token.
    pub fn release_turn(&self, test: TestId) {
        let mut state = self.lock();
        if !state.is_registered(test) {
            tracing::trace!(test = %test, "release_turn for unregistered test ignored");
            return;
        }
        state = self.wait_for_turn_locked(state, test);
        state.release(test);
        tracing::debug!(test = %test, "turn released; token free");
        self.turn_cvar.notify_all();
    }

    /// Hands the token to the next context in round-robin order, then
    /// blocks until control rotates back to `test`.
    ///
    /// No-op when fewer than two contexts exist.
    pub fn yield_to_next_context(&self, test: TestId) {
        let mut state = self.lock();
        if !state.is_registered(test) {
            tracing::trace!(test = %test, "yield for unregistered test ignored");
            return;
        }
        if state.contexts.len() < 2 {
            tracing::trace!(test = %test, "single context; yield is a no-op");
            return;
        }
        state = self.wait_for_turn_locked(state, test);
        if let Some(next) = state.advance_context(test) {
            tracing::trace!(test = %test, next = %next, "token handed to next context");
            self.turn_cvar.notify_all();
            state = self.wait_for_turn_locked(state, test);
        }
        drop(state);
    }

    /// Hands the turn to the next member of `test`'s own context, then
    /// blocks until the turn comes back around.
    ///
    /// No-op when the context has fewer than two members.
    pub fn yield_to_next_context_mate(&self, test: TestId) {
        let mut state = self.lock();
        if !state.is_registered(test) {
            tracing::trace!(test = %test, "yield for unregistered test ignored");
            return;
        }
        let members = state.contexts.context_of(test).map_or(0, |c| c.members().len());
        if members < 2 {
            tracing::trace!(test = %test, "single-member context; yield is a no-op");
            return;
        }
        state = self.wait_for_turn_locked(state, test);
        if let Some(next) = state.advance_mate(test) {
            tracing::trace!(test = %test, next = %next, "turn handed to context mate");
            self.turn_cvar.notify_all();
            state = self.wait_for_turn_locked(state, test);
        }
        drop(state);
    }

    /// Rendezvous of every registered test at the named point.
    ///
    /// The first arrival opens the round; the round completes once every
    /// currently registered test has arrived, and no caller returns
    /// before completion. The completion step (clear arrivals, restore
    /// the initiator's token) is one critical section, so no thread can
    /// observe a half-completed round.
    ///
    /// No-op when fewer than two tests are registered. Arriving with a
    /// point name different from the open round's is a fatal violation.
    /// A participant that never arrives blocks the round forever; that
    /// is the caller's contract, surfaced only by the slow-wait warning.
    pub fn sync_all(&self, test: TestId, point: &str) {
        let mut state = self.lock();
        if !state.is_registered(test) {
            tracing::trace!(test = %test, point, "sync_all for unregistered test ignored");
            return;
        }
        if state.tests.len() < 2 {
            tracing::trace!(test = %test, point, "single registered test; rendezvous skipped");
            return;
        }
        if state.barrier.is_open() && state.barrier.point() != point {
            let violation = ContractViolation::RendezvousPointMismatch {
                test,
                open: state.barrier.point().to_string(),
                requested: point.to_string(),
            };
            drop(state);
            fatal(&violation);
        }

        let initiator = !state.barrier.is_open();
        let held_before = state.holds_token(test);
        state.barrier.arrive(test, point);
        if held_before {
            // Free the channel so the other participants can reach the point.
            state.release(test);
        }
        tracing::debug!(test = %test, point, initiator, held_before, "arrived at rendezvous");
        self.turn_cvar.notify_all();

        if initiator {
            state.set_phase(test, TestPhase::Waiting);
            state = self.wait_while(state, test, "rendezvous arrivals", |s| {
                !s.barrier.has_all(s.registered_ids())
            });
            state.barrier.complete();
            if held_before {
                state.acquire(test);
            }
            tracing::debug!(test = %test, point, "rendezvous complete");
            self.turn_cvar.notify_all();
        } else {
            let local_gen = state.barrier.generation();
            state.set_phase(test, TestPhase::Waiting);
            state = self.wait_while(state, test, "rendezvous release", move |s| {
                s.barrier.generation() == local_gen
            });
        }

        drop(self.wait_for_turn_locked(state, test));
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Returns true while `test` is registered.
    #[must_use]
    pub fn is_registered(&self, test: TestId) -> bool {
        self.lock().is_registered(test)
    }

    /// Returns the number of registered tests.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.lock().tests.len()
    }

    /// Returns the number of live contexts.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.lock().contexts.len()
    }

    /// Returns the context holding the token, or `None` when free.
    #[must_use]
    pub fn token_context(&self) -> Option<ContextId> {
        self.lock().token
    }

    /// Returns the context `test` belongs to.
    #[must_use]
    pub fn context_of(&self, test: TestId) -> Option<ContextId> {
        self.lock().contexts.context_of(test).map(super::ExecutionContext::id)
    }

    /// Returns the active member of `ctx`.
    #[must_use]
    pub fn active_member(&self, ctx: ContextId) -> Option<TestId> {
        self.lock().contexts.get(ctx).map(super::ExecutionContext::active)
    }

    /// Returns the members of `ctx` in turn order.
    #[must_use]
    pub fn members_of(&self, ctx: ContextId) -> Option<Vec<TestId>> {
        self.lock().contexts.get(ctx).map(|c| c.members().to_vec())
    }

    /// Returns `test`'s lifecycle phase.
    #[must_use]
    pub fn phase_of(&self, test: TestId) -> Option<TestPhase> {
        self.lock().phase_of(test)
    }

    /// Returns true while a rendezvous round is in progress.
    #[must_use]
    pub fn rendezvous_open(&self) -> bool {
        self.lock().barrier.is_open()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, SchedState> {
        self.state.lock().expect("scheduler state poisoned")
    }

    /// Blocks on the turn predicate and marks `test` `Running` on exit.
    fn wait_for_turn_locked<'a>(
        &'a self,
        mut state: MutexGuard<'a, SchedState>,
        test: TestId,
    ) -> MutexGuard<'a, SchedState> {
        if !state.may_run(test) {
            state.set_phase(test, TestPhase::Waiting);
            tracing::trace!(test = %test, token = ?state.token, "waiting for turn");
            state = self.wait_while(state, test, "turn", move |s| !s.may_run(test));
        }
        state.set_phase(test, TestPhase::Running);
        state
    }

    /// Condvar wait loop with a slow-wait diagnostic.
    ///
    /// The timed re-arm exists only so the warning can fire while the
    /// wakeup path stays notification-driven.
    fn wait_while<'a, F>(
        &'a self,
        mut state: MutexGuard<'a, SchedState>,
        test: TestId,
        reason: &'static str,
        mut blocked: F,
    ) -> MutexGuard<'a, SchedState>
    where
        F: FnMut(&SchedState) -> bool,
    {
        let start = Instant::now();
        let mut warned = false;
        while blocked(&state) {
            let (guard, _) = self
                .turn_cvar
                .wait_timeout(state, self.config.wait_tick)
                .expect("scheduler state poisoned");
            state = guard;
            if !warned && start.elapsed() >= self.config.wait_warn_after {
                warned = true;
                tracing::warn!(
                    test = %test,
                    reason,
                    waited_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "test blocked past the warn threshold; \
                     a participant may never arrive"
                );
            }
        }
        state
    }
}
