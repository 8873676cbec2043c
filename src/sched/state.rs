//! Pure scheduler state transitions.
//!
//! [`SchedState`] holds everything the scheduler arbitrates over: the
//! context table, the per-test lifecycle records, the run token, and the
//! rendezvous round. Every method here is a plain state transition with
//! no blocking and no notification, which keeps the turn-taking rules
//! unit-testable without threads. The [`Scheduler`](super::Scheduler)
//! monitor owns the one instance, decides when to block, and notifies
//! waiters after each mutation.

use std::collections::HashMap;
use std::thread::ThreadId;

use crate::error::ContractViolation;
use crate::sched::barrier::BarrierRound;
use crate::sched::context::ContextTable;
use crate::types::{ContextId, TestId};

/// Lifecycle phase of a registered test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    /// Registered; not competing for the token.
    Registered,
    /// Blocked until the token frees or names this test.
    Waiting,
    /// Allowed to touch the shared channel.
    Running,
}

impl std::fmt::Display for TestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Waiting => write!(f, "waiting"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Per-test record: lifecycle phase plus the worker thread bound to it.
#[derive(Debug)]
pub(crate) struct TestState {
    pub(crate) phase: TestPhase,
    /// The thread executing this test's command stream. Registration
    /// records the calling thread; `bind_thread` overwrites it when the
    /// test hands off to a dedicated worker.
    pub(crate) owner: ThreadId,
}

/// The shared state of one managed GPU channel.
#[derive(Debug)]
pub(crate) struct SchedState {
    pub(crate) contexts: ContextTable,
    pub(crate) tests: HashMap<TestId, TestState>,
    /// `None` means the token is free: no arbitration, every registered
    /// test may proceed. `Some` names the only context allowed to run.
    pub(crate) token: Option<ContextId>,
    pub(crate) barrier: BarrierRound,
}

impl SchedState {
    pub(crate) fn new() -> Self {
        Self {
            contexts: ContextTable::new(),
            tests: HashMap::new(),
            token: None,
            barrier: BarrierRound::new(),
        }
    }

    /// Registers `test`, joining or creating its context.
    ///
    /// Idempotent: repeat calls with the same arguments leave the member
    /// list and test record unchanged.
    pub(crate) fn register(
        &mut self,
        context_name: Option<&str>,
        test: TestId,
        owner: ThreadId,
    ) -> ContextId {
        let ctx = match context_name {
            Some(name) if !name.is_empty() => self.contexts.join_named(name, test),
            _ => self.contexts.join_anonymous(test),
        };
        self.tests.entry(test).or_insert(TestState {
            phase: TestPhase::Registered,
            owner,
        });
        ctx
    }

    /// Rebinds `test` to the calling worker thread.
    pub(crate) fn bind_thread(&mut self, test: TestId, owner: ThreadId) -> bool {
        match self.tests.get_mut(&test) {
            Some(state) => {
                state.owner = owner;
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_registered(&self, test: TestId) -> bool {
        self.tests.contains_key(&test)
    }

    pub(crate) fn phase_of(&self, test: TestId) -> Option<TestPhase> {
        self.tests.get(&test).map(|s| s.phase)
    }

    pub(crate) fn set_phase(&mut self, test: TestId, phase: TestPhase) {
        if let Some(state) = self.tests.get_mut(&test) {
            state.phase = phase;
        }
    }

    /// The turn predicate: true when the token is free or names `test`.
    pub(crate) fn may_run(&self, test: TestId) -> bool {
        match self.token {
            None => true,
            // A token id that fails lookup is treated as free; unregister
            // clears the token before deleting a context, so this only
            // triggers defensively.
            Some(id) => self.contexts.get(id).is_none_or(|ctx| ctx.active() == test),
        }
    }

    /// True when the token names `test`'s context with `test` active.
    pub(crate) fn holds_token(&self, test: TestId) -> bool {
        self.token.is_some_and(|id| {
            self.contexts
                .get(id)
                .is_some_and(|ctx| ctx.contains(test) && ctx.active() == test)
        })
    }

    /// Claims exclusivity: token to `test`'s context, `test` active.
    ///
    /// Setting the active member here (not only the token) keeps the
    /// mutual-exclusion invariant honest for multi-member contexts: the
    /// acquirer, not a previously active mate, is the one running.
    pub(crate) fn acquire(&mut self, test: TestId) {
        if let Some(ctx) = self.contexts.context_of_mut(test) {
            ctx.set_active(test);
            self.token = Some(ctx.id());
        }
    }

    /// Frees the token and parks `test` back in `Registered`.
    pub(crate) fn release(&mut self, test: TestId) {
        self.token = None;
        self.set_phase(test, TestPhase::Registered);
    }

    /// Hands the token to the next context in round-robin order.
    ///
    /// Returns the receiving context, or `None` when `test` has no
    /// context (concurrently unregistered).
    pub(crate) fn advance_context(&mut self, test: TestId) -> Option<ContextId> {
        let current = self.contexts.context_of(test)?.id();
        let next = self.contexts.next_context_after(current)?;
        self.token = Some(next);
        Some(next)
    }

    /// Hands the turn to the next member of `test`'s own context.
    ///
    /// Returns the new active member, or `None` when `test` has no
    /// context.
    pub(crate) fn advance_mate(&mut self, test: TestId) -> Option<TestId> {
        let ctx = self.contexts.context_of_mut(test)?;
        let next = ctx.next_member_after(test);
        ctx.set_active(next);
        self.token = Some(ctx.id());
        Some(next)
    }

    /// Validates the unregister precondition.
    ///
    /// Legal states: token free (no arbitration in effect), or held with
    /// `test` as the active member. Anything else means a foreign context
    /// owns the channel and the caller skipped `wait_for_turn`.
    pub(crate) fn check_unregister(&self, test: TestId) -> Result<(), ContractViolation> {
        if self.token.is_none() || self.holds_token(test) {
            Ok(())
        } else {
            Err(ContractViolation::UnregisterWithoutToken { test })
        }
    }

    /// Removes `test` and its context membership.
    ///
    /// The token is cleared unconditionally: the unregistering thread can
    /// never be woken again, so leaving the token pointed anywhere would
    /// strand every waiter.
    pub(crate) fn unregister(&mut self, test: TestId) {
        self.contexts.remove_member(test);
        self.tests.remove(&test);
        self.token = None;
    }

    /// Ids of every currently registered test.
    pub(crate) fn registered_ids(&self) -> impl Iterator<Item = TestId> + '_ {
        self.tests.keys().copied()
    }
}
