//! Metric helpers for `flowline`.
//!
//! This module defines metric names and helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. All functions become no-ops
//! if the optional `metrics` Cargo feature is disabled.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking producers that completed successfully.
pub const PRODUCERS_COMPLETED: &str = "flowline_producers_completed_total";
/// Name of the counter tracking producers that terminated with a failure.
pub const PRODUCERS_TERMINATED: &str = "flowline_producers_terminated_total";
/// Name of the counter tracking content chunks arriving after end-of-body.
pub const SPURIOUS_CHUNKS: &str = "flowline_spurious_chunks_total";
/// Name of the counter tracking events with no transition in the current
/// state.
pub const INAPPROPRIATE_EVENTS: &str = "flowline_inappropriate_events_total";

/// Record a producer reaching its completed state.
#[cfg(feature = "metrics")]
pub fn inc_completed() { counter!(PRODUCERS_COMPLETED).increment(1); }

#[cfg(not(feature = "metrics"))]
pub fn inc_completed() {}

/// Record a producer terminating with a failure.
///
/// `kind` names the failure class: `"channel"`, `"unsubscribed"`,
/// `"secondary_subscription"`, or `"tear_down"`.
#[cfg(feature = "metrics")]
pub fn inc_terminated(kind: &'static str) {
    counter!(PRODUCERS_TERMINATED, "kind" => kind).increment(1);
}

#[cfg(not(feature = "metrics"))]
pub fn inc_terminated(_kind: &'static str) {}

/// Record a content chunk dropped because the body had already ended.
#[cfg(feature = "metrics")]
pub fn inc_spurious_chunk() { counter!(SPURIOUS_CHUNKS).increment(1); }

#[cfg(not(feature = "metrics"))]
pub fn inc_spurious_chunk() {}

/// Record an event that had no transition in the producer's current state.
#[cfg(feature = "metrics")]
pub fn inc_inappropriate_event() { counter!(INAPPROPRIATE_EVENTS).increment(1); }

#[cfg(not(feature = "metrics"))]
pub fn inc_inappropriate_event() {}
