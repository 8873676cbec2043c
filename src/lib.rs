//! Tracesched: cooperative run-token scheduling for multi-test GPU trace
//! playback harnesses.
//!
//! # Overview
//!
//! A trace playback harness runs many independently-scripted tests
//! concurrently against one shared GPU command-submission channel. Left
//! alone they would interleave command writes and silently corrupt the
//! stream. Tracesched arbitrates: one run token decides which execution
//! context (a named group of tests, or a solo test) may touch the
//! channel, and a named rendezvous point lets unrelated tests line up at
//! checkpoints.
//!
//! # Core Guarantees
//!
//! - **Mutual exclusion**: while the token is held, exactly one test
//!   (the active member of the token's context) runs
//! - **Token-free liveness**: until someone asks for exclusivity, every
//!   registered test proceeds without blocking
//! - **Round-robin handoff**: yields rotate strictly through contexts,
//!   and through members within a context, in registration order
//! - **True blocking**: waiters park on a condition variable; there is
//!   no spin loop and no reliance on the OS scheduler's goodwill
//! - **Loud misuse**: unregistering without the token or negotiating two
//!   rendezvous points at once aborts the run with a diagnostic
//!
//! # Module Structure
//!
//! - [`types`]: identifier newtypes ([`TestId`], [`ContextId`])
//! - [`sched`]: contexts, run-token monitor, rendezvous point
//! - [`config`]: blocking-behavior tunables with env overrides
//! - [`error`]: contract violations and configuration errors
//! - [`test_utils`]: logging init and assertion macros for tests
//!
//! # Example
//!
//! ```
//! use tracesched::{Scheduler, TestId};
//!
//! let sched = Scheduler::new();
//! let test = TestId::new(0);
//! sched.register(Some("display"), test);
//!
//! // Token is free: the test runs immediately.
//! sched.wait_for_turn(test);
//!
//! // Claim exclusivity, submit commands, hand the channel back.
//! sched.acquire_turn(test);
//! sched.release_turn(test);
//!
//! sched.wait_for_turn(test);
//! sched.unregister(test);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod sched;
pub mod test_utils;
pub mod types;

pub use config::SchedConfig;
pub use error::{ConfigError, ContractViolation};
pub use sched::{ContextTable, ExecutionContext, Scheduler, TestPhase};
pub use types::{ContextId, TestId};
