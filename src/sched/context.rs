//! Execution contexts and the context table.
//!
//! A context is a group of tests that take turns holding the run token.
//! Named contexts hold every test registered under the same name, in
//! registration order; anonymous contexts hold exactly one test and
//! exist so the top-level round robin can treat solo tests uniformly.
//!
//! The table owns all contexts and hands out [`ContextId`]s. Ids are
//! allocated monotonically and never reused: the run token stores an id,
//! and a stale id from a torn-down context simply fails lookup instead
//! of aliasing a newer context.

use crate::types::{ContextId, TestId};

/// A named or anonymous group of tests sharing a turn order.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    id: ContextId,
    name: Option<String>,
    /// Insertion order is turn order.
    members: Vec<TestId>,
    active: TestId,
}

impl ExecutionContext {
    fn new(id: ContextId, name: Option<String>, first: TestId) -> Self {
        Self {
            id,
            name,
            members: vec![first],
            active: first,
        }
    }

    /// Returns this context's identifier.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Returns the context name, or `None` for an anonymous context.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the members in turn order.
    #[must_use]
    pub fn members(&self) -> &[TestId] {
        &self.members
    }

    /// Returns the member currently designated to run.
    #[must_use]
    pub fn active(&self) -> TestId {
        self.active
    }

    /// Returns true if `test` belongs to this context.
    #[must_use]
    pub fn contains(&self, test: TestId) -> bool {
        self.members.contains(&test)
    }

    /// Returns the member after `test` in circular turn order.
    ///
    /// Returns `test` itself when it is the sole member or not a member.
    #[must_use]
    pub fn next_member_after(&self, test: TestId) -> TestId {
        match self.members.iter().position(|&m| m == test) {
            Some(pos) => self.members[(pos + 1) % self.members.len()],
            None => test,
        }
    }

    pub(crate) fn set_active(&mut self, test: TestId) {
        debug_assert!(self.contains(test), "active member must be a member");
        self.active = test;
    }

    /// Appends `test` unless it is already a member.
    fn add_member(&mut self, test: TestId) {
        if !self.members.contains(&test) {
            self.members.push(test);
        }
    }

    /// Removes `test`; returns true if the context is now empty.
    ///
    /// When the removed test was the active member, the new first member
    /// becomes active.
    fn remove_member(&mut self, test: TestId) -> bool {
        self.members.retain(|&m| m != test);
        match self.members.first() {
            Some(&first) => {
                if !self.members.contains(&self.active) {
                    self.active = first;
                }
                false
            }
            None => true,
        }
    }
}

/// Ordered collection of live contexts.
///
/// Order of creation is the top-level round-robin order.
#[derive(Debug, Default)]
pub struct ContextTable {
    contexts: Vec<ExecutionContext>,
    next_id: u64,
}

impl ContextTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns true if no contexts exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Looks a context up by id.
    #[must_use]
    pub fn get(&self, id: ContextId) -> Option<&ExecutionContext> {
        self.contexts.iter().find(|c| c.id == id)
    }

    /// Returns the context `test` belongs to, if any.
    #[must_use]
    pub fn context_of(&self, test: TestId) -> Option<&ExecutionContext> {
        self.contexts.iter().find(|c| c.contains(test))
    }

    pub(crate) fn context_of_mut(&mut self, test: TestId) -> Option<&mut ExecutionContext> {
        self.contexts.iter_mut().find(|c| c.contains(test))
    }

    /// Iterates over contexts in round-robin order.
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionContext> {
        self.contexts.iter()
    }

    /// Joins `test` to the context named `name`, creating it if absent.
    ///
    /// Repeat joins with identical arguments are no-ops: a test is never
    /// appended twice to the same member list.
    pub fn join_named(&mut self, name: &str, test: TestId) -> ContextId {
        if let Some(ctx) = self
            .contexts
            .iter_mut()
            .find(|c| c.name.as_deref() == Some(name))
        {
            ctx.add_member(test);
            return ctx.id;
        }
        self.push_context(Some(name.to_string()), test)
    }

    /// Creates a fresh anonymous context for `test`.
    ///
    /// Idempotence guard: if an anonymous context already holds exactly
    /// `test`, it is reused rather than duplicated.
    pub fn join_anonymous(&mut self, test: TestId) -> ContextId {
        if let Some(ctx) = self
            .contexts
            .iter()
            .find(|c| c.name.is_none() && c.members == [test])
        {
            return ctx.id;
        }
        self.push_context(None, test)
    }

    /// Removes `test` from its context, deleting the context if it was
    /// the last member. Returns the context id when the context survives.
    pub fn remove_member(&mut self, test: TestId) -> Option<ContextId> {
        let pos = self.contexts.iter().position(|c| c.contains(test))?;
        if self.contexts[pos].remove_member(test) {
            self.contexts.remove(pos);
            None
        } else {
            Some(self.contexts[pos].id)
        }
    }

    /// Returns the context after `id` in circular round-robin order.
    ///
    /// Returns `id` itself when it is the only context; `None` when `id`
    /// is not in the table.
    #[must_use]
    pub fn next_context_after(&self, id: ContextId) -> Option<ContextId> {
        let pos = self.contexts.iter().position(|c| c.id == id)?;
        Some(self.contexts[(pos + 1) % self.contexts.len()].id)
    }

    fn push_context(&mut self, name: Option<String>, test: TestId) -> ContextId {
        self.next_id += 1;
        let id = ContextId::from_raw(self.next_id);
        self.contexts.push(ExecutionContext::new(id, name, test));
        id
    }
}
