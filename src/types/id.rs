//! Identifier types for scheduler entities.
//!
//! These types provide type-safe identifiers for the two entities the
//! scheduler arbitrates between: tests and execution contexts. A `TestId`
//! is assigned externally by the harness configuration layer; a
//! `ContextId` is allocated internally and never reused, so a token
//! holding a `ContextId` can never silently alias a later context.

use core::fmt;

/// A stable identifier for one test instance.
///
/// Assigned by the surrounding harness when the test is configured.
/// Unique while the test is registered with the scheduler.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestId(u32);

impl TestId {
    /// Creates a test ID from the harness-assigned instance number.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw instance number.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestId({})", self.0)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl From<u32> for TestId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// A unique identifier for an execution context.
///
/// Allocated monotonically by the context table. The run token stores a
/// `ContextId` rather than a reference, so tearing a context down never
/// leaves a dangling "active context" pointer behind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw allocation counter value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}
