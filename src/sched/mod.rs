//! The cooperative execution scheduler.
//!
//! This module implements the arbitration core: execution contexts that
//! take turns holding the run token, the per-test lifecycle table, and
//! the scheduler-wide rendezvous point.
//!
//! # Pieces
//!
//! - [`ExecutionContext`] / [`ContextTable`]: named and anonymous turn
//!   groups in round-robin order
//! - [`TestPhase`]: per-test lifecycle (`Registered`/`Waiting`/`Running`)
//! - [`Scheduler`]: the monitor tying token, contexts, and rendezvous
//!   together under one lock
//!
//! # Mutation discipline
//!
//! Only the test currently allowed to run mutates the token and active
//! member; other tests only record rendezvous arrivals or append new
//! members and contexts. Both paths go through the scheduler's single
//! lock, and every mutation notifies all waiters.

mod barrier;
mod context;
mod scheduler;
mod state;

pub use context::{ContextTable, ExecutionContext};
pub use scheduler::Scheduler;
pub use state::TestPhase;
