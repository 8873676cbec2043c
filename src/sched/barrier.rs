//! Rendezvous round bookkeeping.
//!
//! One [`BarrierRound`] per scheduler tracks the single named rendezvous
//! point that may be in progress at a time. A round is open while any
//! arrival is recorded; completing a round clears the arrivals and bumps
//! a generation counter. Waiters block on the generation change rather
//! than re-reading the arrival set, so a new round opening immediately
//! after cannot be mistaken for the old round still draining.

use std::collections::HashSet;

use crate::types::TestId;

/// State of the scheduler-wide rendezvous point.
#[derive(Debug, Default)]
pub(crate) struct BarrierRound {
    /// Point name of the open round. Meaningless while `arrived` is
    /// empty; a round is open iff `arrived` is non-empty.
    point: String,
    arrived: HashSet<TestId>,
    generation: u64,
}

impl BarrierRound {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns true while a round is in progress.
    pub(crate) fn is_open(&self) -> bool {
        !self.arrived.is_empty()
    }

    /// Returns the open round's point name.
    pub(crate) fn point(&self) -> &str {
        &self.point
    }

    /// Returns the completion counter waiters block on.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Records an arrival, opening the round if necessary.
    ///
    /// The first arrival fixes the point name; the caller must have
    /// checked the name against an already-open round beforehand.
    pub(crate) fn arrive(&mut self, test: TestId, point: &str) {
        if !self.is_open() {
            self.point.clear();
            self.point.push_str(point);
        }
        debug_assert_eq!(self.point, point, "mismatch must be rejected by the caller");
        self.arrived.insert(test);
    }

    /// Returns true when every id yielded by `registered` has arrived.
    pub(crate) fn has_all<I>(&self, registered: I) -> bool
    where
        I: IntoIterator<Item = TestId>,
    {
        registered.into_iter().all(|t| self.arrived.contains(&t))
    }

    /// Closes the round: clears arrivals and bumps the generation.
    pub(crate) fn complete(&mut self) {
        self.arrived.clear();
        self.generation = self.generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u32) -> TestId {
        TestId::new(n)
    }

    #[test]
    fn first_arrival_opens_the_round() {
        let mut round = BarrierRound::new();
        assert!(!round.is_open());
        round.arrive(t(0), "post-init");
        assert!(round.is_open());
        assert_eq!(round.point(), "post-init");
        assert!(round.has_all([t(0)]));
    }

    #[test]
    fn completion_clears_and_bumps_generation() {
        let mut round = BarrierRound::new();
        round.arrive(t(0), "p");
        round.arrive(t(1), "p");
        let before = round.generation();
        round.complete();
        assert!(!round.is_open());
        assert_eq!(round.generation(), before + 1);
    }

    #[test]
    fn has_all_tracks_the_live_registration_set() {
        let mut round = BarrierRound::new();
        round.arrive(t(0), "p");
        round.arrive(t(2), "p");
        assert!(!round.has_all([t(0), t(1), t(2)]));
        // A participant unregistering mid-round shrinks the set.
        assert!(round.has_all([t(0), t(2)]));
    }

    #[test]
    fn next_round_may_reuse_or_change_the_point() {
        let mut round = BarrierRound::new();
        round.arrive(t(0), "alpha");
        round.complete();
        round.arrive(t(1), "beta");
        assert_eq!(round.point(), "beta");
    }
}
