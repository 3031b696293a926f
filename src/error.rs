//! Error types for the content producer.
//!
//! Failures cross the producer boundary as a shared [`Cause`] so one
//! instance can be delivered to both the subscriber (`on_error`) and the
//! terminate collaborator. Errors the producer synthesizes itself are
//! variants of [`BodyError`].

use std::sync::Arc;

use thiserror::Error;

use crate::{origin::Origin, producer::ProducerState, stats::StatsSnapshot};

/// Shared failure cause delivered to the subscriber and collaborators.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Failures synthesized by the content producer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BodyError {
    /// The downstream consumer cancelled its subscription before the body
    /// completed. Treated as a failure, not a clean stop: buffered content
    /// can no longer be delivered.
    #[error("consumer disconnected: {message} (state={state:?})")]
    ConsumerDisconnected {
        /// Human-readable context for the disconnect.
        message: String,
        /// Producer state at the moment of the disconnect.
        state: ProducerState,
    },

    /// The grace window after channel loss expired without a subscriber
    /// draining the remaining content.
    #[error(
        "response timed out: origin={origin}, reason={reason}, \
         receivedBytes={}, receivedChunks={}, emittedBytes={}, emittedChunks={}",
        .stats.received_bytes,
        .stats.received_chunks,
        .stats.emitted_bytes,
        .stats.emitted_chunks
    )]
    ResponseTimeout {
        /// Origin the response was being read from.
        origin: Origin,
        /// Why the channel went away.
        reason: &'static str,
        /// Transfer progress at the moment the window expired.
        stats: StatsSnapshot,
    },

    /// A second subscriber attached to a producer that admits exactly one.
    #[error("secondary content subscription (state={state:?}, connection={connection})")]
    AlreadySubscribed {
        /// Producer state when the second subscription arrived.
        state: ProducerState,
        /// Logging prefix identifying the connection.
        connection: String,
    },
}

impl BodyError {
    /// Wrap this error as a shareable [`Cause`].
    #[must_use]
    pub fn into_cause(self) -> Cause { Arc::new(self) }
}

#[cfg(test)]
mod tests {
    use super::BodyError;
    use crate::{origin::Origin, producer::ProducerState, stats::StatsSnapshot};

    #[test]
    fn response_timeout_reports_transfer_progress() {
        let err = BodyError::ResponseTimeout {
            origin: Origin::new("app", "host:80"),
            reason: "channelClosed",
            stats: StatsSnapshot {
                received_chunks: 2,
                received_bytes: 64,
                emitted_chunks: 1,
                emitted_bytes: 32,
                max_queue_depth_chunks: 1,
                max_queue_depth_bytes: 32,
            },
        };

        let rendered = err.to_string();
        assert!(rendered.contains("origin=app/host:80"));
        assert!(rendered.contains("reason=channelClosed"));
        assert!(rendered.contains("receivedBytes=64"));
        assert!(rendered.contains("emittedChunks=1"));
    }

    #[test]
    fn consumer_disconnected_names_the_state() {
        let err = BodyError::ConsumerDisconnected {
            message: "the consumer unsubscribed".into(),
            state: ProducerState::Streaming,
        };
        assert!(err.to_string().contains("state=Streaming"));
    }
}
