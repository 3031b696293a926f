//! Body chunk abstraction for the content producer.
//!
//! A chunk is one contiguous body fragment as delivered by the transport.
//! The producer treats chunks as opaque owned buffers: it takes ownership on
//! enqueue, transfers ownership to the subscriber on emission, and drops any
//! chunks still queued when it terminates. Dropping a chunk releases its
//! backing storage, so a buffer can never be released twice or leaked while
//! the producer holds it.

use bytes::{Bytes, BytesMut};

/// An owned body fragment the producer can queue and emit.
///
/// Any cheaply movable buffer type can flow through a producer; the only
/// requirement beyond `Send + 'static` is reporting how many readable bytes
/// the fragment carries, which feeds the transfer counters.
pub trait BodyChunk: Send + 'static {
    /// Number of readable bytes in this fragment.
    fn readable_bytes(&self) -> usize;
}

impl BodyChunk for Bytes {
    fn readable_bytes(&self) -> usize { self.len() }
}

impl BodyChunk for BytesMut {
    fn readable_bytes(&self) -> usize { self.len() }
}

impl BodyChunk for Vec<u8> {
    fn readable_bytes(&self) -> usize { self.len() }
}
