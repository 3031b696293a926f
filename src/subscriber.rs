//! Downstream consumer interface for streamed body content.

use crate::error::Cause;

/// A reactive consumer of body chunks.
///
/// A producer accepts exactly one subscriber. After subscription the
/// producer delivers zero or more `on_next` calls in arrival order, followed
/// by exactly one terminal signal: `on_complete` on success or `on_error` on
/// failure. No signal follows the terminal one.
///
/// All three methods are invoked synchronously from inside a producer
/// transition and must not block or call back into the producer's event API.
pub trait ContentSubscriber<C>: Send {
    /// Deliver one chunk. Ownership of the chunk transfers to the
    /// subscriber.
    fn on_next(&mut self, chunk: C);

    /// The body completed; every chunk has been delivered.
    fn on_complete(&mut self);

    /// The transfer failed; no further chunks will be delivered.
    fn on_error(&mut self, cause: Cause);
}
