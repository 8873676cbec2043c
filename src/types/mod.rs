//! Core types shared across the scheduler.

mod id;

pub use id::{ContextId, TestId};
