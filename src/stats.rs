//! Per-producer transfer counters.
//!
//! Counters are monotonically non-decreasing for the lifetime of one
//! producer and are updated inside transitions but readable at any time
//! without the transition lock. `max_queue_depth_*` track the running
//! maximum of `received − emitted`, the high-water mark of buffered
//! content.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic transfer counters for one producer.
#[derive(Debug, Default)]
pub(crate) struct TransferStats {
    received_chunks: AtomicU64,
    received_bytes: AtomicU64,
    emitted_chunks: AtomicU64,
    emitted_bytes: AtomicU64,
    max_queue_depth_chunks: AtomicU64,
    max_queue_depth_bytes: AtomicU64,
}

impl TransferStats {
    pub(crate) fn new() -> Self { Self::default() }

    /// Record one enqueued chunk of `bytes` readable bytes and refresh the
    /// queue-depth high-water marks.
    pub(crate) fn record_received(&self, bytes: u64) {
        let received_chunks = self.received_chunks.fetch_add(1, Ordering::AcqRel) + 1;
        let received_bytes = self.received_bytes.fetch_add(bytes, Ordering::AcqRel) + bytes;

        let depth_chunks = received_chunks.saturating_sub(self.emitted_chunks.load(Ordering::Acquire));
        let depth_bytes = received_bytes.saturating_sub(self.emitted_bytes.load(Ordering::Acquire));
        self.max_queue_depth_chunks
            .fetch_max(depth_chunks, Ordering::AcqRel);
        self.max_queue_depth_bytes
            .fetch_max(depth_bytes, Ordering::AcqRel);
    }

    /// Record one chunk of `bytes` readable bytes delivered downstream.
    pub(crate) fn record_emitted(&self, bytes: u64) {
        self.emitted_chunks.fetch_add(1, Ordering::AcqRel);
        self.emitted_bytes.fetch_add(bytes, Ordering::AcqRel);
    }

    pub(crate) fn received_chunks(&self) -> u64 { self.received_chunks.load(Ordering::Acquire) }

    pub(crate) fn received_bytes(&self) -> u64 { self.received_bytes.load(Ordering::Acquire) }

    pub(crate) fn emitted_chunks(&self) -> u64 { self.emitted_chunks.load(Ordering::Acquire) }

    pub(crate) fn emitted_bytes(&self) -> u64 { self.emitted_bytes.load(Ordering::Acquire) }

    pub(crate) fn max_queue_depth_chunks(&self) -> u64 {
        self.max_queue_depth_chunks.load(Ordering::Acquire)
    }

    pub(crate) fn max_queue_depth_bytes(&self) -> u64 {
        self.max_queue_depth_bytes.load(Ordering::Acquire)
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received_chunks: self.received_chunks(),
            received_bytes: self.received_bytes(),
            emitted_chunks: self.emitted_chunks(),
            emitted_bytes: self.emitted_bytes(),
            max_queue_depth_chunks: self.max_queue_depth_chunks(),
            max_queue_depth_bytes: self.max_queue_depth_bytes(),
        }
    }
}

/// Point-in-time copy of the transfer counters.
///
/// Carried by warning diagnostics and the response-timeout error so a
/// stranded producer reports how far the transfer got.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Chunks accepted from the transport.
    pub received_chunks: u64,
    /// Bytes accepted from the transport.
    pub received_bytes: u64,
    /// Chunks delivered to the subscriber.
    pub emitted_chunks: u64,
    /// Bytes delivered to the subscriber.
    pub emitted_bytes: u64,
    /// Peak buffered chunk count.
    pub max_queue_depth_chunks: u64,
    /// Peak buffered byte count.
    pub max_queue_depth_bytes: u64,
}
