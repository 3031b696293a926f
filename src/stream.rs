//! Async consumer adapter for a content producer.
//!
//! [`BodyStream`] subscribes to a [`ContentProducer`] and exposes the body
//! as a [`futures::Stream`]. Polling converts into demand: whenever the
//! stream runs out of outstanding requests it asks the producer for the
//! next batch, so back-pressure follows the consumer's polling rate.
//! Dropping the stream before the terminal signal cancels the
//! subscription, which the producer treats as a consumer disconnect.

use std::{
    num::NonZeroU64,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;

use crate::{
    chunk::BodyChunk,
    error::Cause,
    producer::ContentProducer,
    subscriber::ContentSubscriber,
};

/// Chunks requested per refill when no explicit batch size is given.
const DEFAULT_DEMAND_BATCH: NonZeroU64 = NonZeroU64::new(32).unwrap();

/// Downstream signal forwarded from the producer to the stream.
enum Signal<C> {
    Chunk(C),
    Complete,
    Failed(Cause),
}

/// Subscriber half: forwards producer signals into the stream's channel.
///
/// Runs inside producer transitions, so it only performs non-blocking
/// channel sends. A send after the stream is dropped is discarded; the
/// stream's drop handler has already cancelled the subscription.
struct ChannelSubscriber<C> {
    tx: mpsc::UnboundedSender<Signal<C>>,
}

impl<C: BodyChunk> ContentSubscriber<C> for ChannelSubscriber<C> {
    fn on_next(&mut self, chunk: C) { let _ = self.tx.send(Signal::Chunk(chunk)); }

    fn on_complete(&mut self) { let _ = self.tx.send(Signal::Complete); }

    fn on_error(&mut self, cause: Cause) { let _ = self.tx.send(Signal::Failed(cause)); }
}

/// An async stream of body chunks pulled from a [`ContentProducer`].
///
/// Each poll yields the next chunk in arrival order, `Err` exactly once if
/// the transfer fails, and `None` after the body completes.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use bytes::Bytes;
/// use flowline::{BodyStream, ContentProducer, Origin};
/// use futures::StreamExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let producer: Arc<ContentProducer<Bytes>> =
///     Arc::new(ContentProducer::new(Origin::new("app", "origin:80"), "conn-1"));
/// let mut body = BodyStream::subscribe(Arc::clone(&producer));
///
/// producer.new_chunk(Bytes::from_static(b"hello"));
/// producer.last_content();
///
/// assert_eq!(body.next().await.expect("chunk").expect("no error"), "hello");
/// assert!(body.next().await.is_none());
/// # }
/// ```
pub struct BodyStream<C: BodyChunk> {
    producer: Arc<ContentProducer<C>>,
    rx: mpsc::UnboundedReceiver<Signal<C>>,
    /// Demand requested per refill; `u64::MAX` means the subscription is
    /// unbounded and never refills.
    batch: u64,
    /// Chunks still expected from demand already issued.
    outstanding: u64,
    finished: bool,
}

impl<C: BodyChunk> BodyStream<C> {
    /// Subscribe to `producer` with the default demand batch.
    #[must_use]
    pub fn subscribe(producer: Arc<ContentProducer<C>>) -> Self {
        Self::with_batch(producer, DEFAULT_DEMAND_BATCH)
    }

    /// Subscribe to `producer`, requesting `batch` chunks per refill.
    ///
    /// Smaller batches bound buffering more tightly at the cost of more
    /// frequent demand signals.
    #[must_use]
    pub fn with_batch(producer: Arc<ContentProducer<C>>, batch: NonZeroU64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        // Demand is issued before subscribing so the drain triggered by the
        // subscription is already bounded by the first batch.
        producer.request(batch.get());
        producer.on_subscribed(ChannelSubscriber { tx });
        Self {
            producer,
            rx,
            batch: batch.get(),
            outstanding: batch.get(),
            finished: false,
        }
    }

    /// Subscribe to `producer` without back-pressure: every chunk is
    /// forwarded as soon as it arrives.
    #[must_use]
    pub fn unbounded(producer: Arc<ContentProducer<C>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        producer.request(u64::MAX);
        producer.on_subscribed(ChannelSubscriber { tx });
        Self {
            producer,
            rx,
            batch: u64::MAX,
            outstanding: u64::MAX,
            finished: false,
        }
    }

    /// Whether the terminal signal has been observed.
    #[must_use]
    pub fn is_finished(&self) -> bool { self.finished }
}

impl<C: BodyChunk> Stream for BodyStream<C> {
    type Item = Result<C, Cause>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(Signal::Chunk(chunk))) => {
                    this.outstanding = this.outstanding.saturating_sub(1);
                    return Poll::Ready(Some(Ok(chunk)));
                }
                Poll::Ready(Some(Signal::Complete)) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Signal::Failed(cause))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(cause)));
                }
                // The producer side went away without a terminal signal.
                Poll::Ready(None) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => {
                    if this.outstanding > 0 {
                        return Poll::Pending;
                    }
                    // Out of demand: request the next batch. Chunks may be
                    // delivered synchronously during the call, so poll the
                    // channel again before yielding.
                    this.outstanding = this.batch;
                    this.producer.request(this.batch);
                }
            }
        }
    }
}

impl<C: BodyChunk> Drop for BodyStream<C> {
    fn drop(&mut self) {
        if !self.finished {
            self.producer.unsubscribe();
        }
    }
}
