//! Saturating demand counter for reactive back-pressure.
//!
//! The counter tracks how many more chunks the subscriber is willing to
//! accept. `u64::MAX` plays a double role: it is the initial sentinel,
//! meaning no request has been issued yet (no demand is claimable), and
//! once an explicit request has primed the counter it denotes unbounded
//! demand, which the drain loop never decrements. The first request clears
//! the sentinel to zero before accumulating, so a bounded consumer gets
//! exactly what it asked for; a primed counter saturated at `u64::MAX`
//! stays unbounded permanently.
//!
//! All operations are lock-free compare-and-swap loops so the counter can be
//! read outside the producer's transition lock. Mutation only happens inside
//! transitions, which the producer serializes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Demand value denoting an absence of back-pressure once primed.
pub const UNBOUNDED: u64 = u64::MAX;

/// Accumulated downstream demand with an unbounded sentinel.
#[derive(Debug)]
pub(crate) struct Demand {
    value: AtomicU64,
    /// Whether the initial unbounded sentinel has been cleared by an
    /// explicit request.
    primed: AtomicBool,
}

impl Demand {
    pub(crate) fn new() -> Self {
        Self {
            value: AtomicU64::new(UNBOUNDED),
            primed: AtomicBool::new(false),
        }
    }

    /// Add `n` units of demand with saturation.
    ///
    /// The first call clears the initial sentinel before adding.
    pub(crate) fn add(&self, n: u64) {
        if !self.primed.swap(true, Ordering::AcqRel) {
            let _ = self
                .value
                .compare_exchange(UNBOUNDED, 0, Ordering::AcqRel, Ordering::Acquire);
        }

        let mut current = self.value.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(n);
            match self.value.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Claim one unit of demand for an emission.
    ///
    /// Returns `true` when a unit was available. Unbounded demand is never
    /// decremented and always claims successfully; the unprimed sentinel
    /// carries no demand at all.
    pub(crate) fn claim(&self) -> bool {
        let mut current = self.value.load(Ordering::Acquire);
        loop {
            if current == UNBOUNDED {
                return self.primed.load(Ordering::Acquire);
            }
            if current == 0 {
                return false;
            }
            match self.value.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Return one previously claimed unit.
    ///
    /// The drain loop claims before popping the queue; when the pop finds the
    /// queue empty the claimed unit is handed back so demand is not lost.
    pub(crate) fn unclaim(&self) {
        let mut current = self.value.load(Ordering::Acquire);
        loop {
            if current == UNBOUNDED {
                return;
            }
            match self.value.compare_exchange_weak(
                current,
                current.saturating_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Current demand. May be stale when read outside a transition.
    pub(crate) fn get(&self) -> u64 { self.value.load(Ordering::Acquire) }
}
