//! Error types and error handling strategy for the scheduler.
//!
//! The scheduler has an unusually small error surface by design:
//!
//! - **Benign no-ops**: turn, yield, and rendezvous operations invoked
//!   with an unregistered [`TestId`] return silently. A test that has
//!   already torn itself down may still have harness glue calling into
//!   the scheduler on its behalf; that is not a fault.
//! - **Contract violations**: unregistering without holding the run
//!   token, or negotiating two different rendezvous points concurrently,
//!   indicate a harness bug. These are fatal: the scheduler emits a
//!   structured error event and panics. There is no recovery path
//!   because the shared command stream must be assumed corrupt.
//! - **Configuration errors**: the one recoverable surface. Malformed
//!   environment overrides are reported as [`ConfigError`] before any
//!   test runs.

use core::fmt;

use crate::types::TestId;

/// A fatal misuse of the scheduler by the surrounding harness.
///
/// Violations are never returned to the caller; they are raised through
/// [`fatal`], which logs and panics. The type exists so the diagnostic
/// text is constructed in one place and so tests can match on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// `unregister` was called while another context held the run token.
    UnregisterWithoutToken {
        /// The test that attempted to unregister.
        test: TestId,
    },
    /// `sync_all` was called with a point name that does not match the
    /// round currently in progress.
    RendezvousPointMismatch {
        /// The test whose arrival mismatched.
        test: TestId,
        /// The point name of the open round.
        open: String,
        /// The point name the arriving test asked for.
        requested: String,
    },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnregisterWithoutToken { test } => {
                write!(
                    f,
                    "{test} unregistered without holding the run token; \
                     call wait_for_turn before unregister"
                )
            }
            Self::RendezvousPointMismatch {
                test,
                open,
                requested,
            } => {
                write!(
                    f,
                    "{test} arrived at rendezvous point {requested:?} while \
                     round {open:?} is still in progress"
                )
            }
        }
    }
}

impl std::error::Error for ContractViolation {}

/// Reports a contract violation and aborts the run.
///
/// The caller must drop the scheduler state guard before invoking this,
/// so the state mutex is not poisoned by the unwind and post-mortem
/// inspection from other threads stays possible.
pub(crate) fn fatal(violation: &ContractViolation) -> ! {
    tracing::error!(violation = %violation, "scheduler contract violated; aborting run");
    panic!("scheduler contract violated: {violation}");
}

/// Error produced while resolving scheduler configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("invalid value {value:?} for {var}: expected {expected}")]
    InvalidEnvValue {
        /// The environment variable name.
        var: &'static str,
        /// The unparseable value.
        value: String,
        /// What a valid value would look like.
        expected: &'static str,
    },
}
