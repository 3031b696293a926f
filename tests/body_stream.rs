//! Integration tests for the async body stream adapter and the grace
//! timer.

mod common;

use std::{num::NonZeroU64, sync::Arc, time::Duration};

use bytes::Bytes;
use flowline::{BodyStream, ContentProducer, Origin, ProducerState};
use futures::StreamExt;

use common::{channel_cause, recording_hooks};

fn test_producer() -> Arc<ContentProducer<Bytes>> {
    Arc::new(ContentProducer::new(
        Origin::new("app-01", "origin.example.net:8080"),
        "conn-1",
    ))
}

#[tokio::test]
async fn stream_yields_chunks_in_order_then_ends() {
    let producer = test_producer();
    let mut body = BodyStream::subscribe(Arc::clone(&producer));

    producer.new_chunk(Bytes::from_static(b"alpha"));
    producer.new_chunk(Bytes::from_static(b"beta"));
    producer.last_content();

    assert_eq!(body.next().await.expect("first chunk").expect("no error"), "alpha");
    assert_eq!(body.next().await.expect("second chunk").expect("no error"), "beta");
    assert!(body.next().await.is_none());
    assert!(body.is_finished());
    assert_eq!(producer.state(), ProducerState::Completed);
}

#[tokio::test]
async fn polling_converts_into_demand_batches() {
    let producer = test_producer();
    producer.new_chunk(Bytes::from_static(b"one"));
    producer.new_chunk(Bytes::from_static(b"two"));
    producer.new_chunk(Bytes::from_static(b"three"));
    producer.last_content();

    let batch = NonZeroU64::new(1).expect("non-zero batch");
    let mut body = BodyStream::with_batch(Arc::clone(&producer), batch);

    // Only the first batch has been requested so far.
    assert_eq!(producer.emitted_chunks(), 1);

    assert_eq!(body.next().await.expect("chunk").expect("no error"), "one");
    assert_eq!(body.next().await.expect("chunk").expect("no error"), "two");
    assert_eq!(producer.emitted_chunks(), 2);

    assert_eq!(body.next().await.expect("chunk").expect("no error"), "three");
    assert!(body.next().await.is_none());
    assert_eq!(producer.state(), ProducerState::Completed);
}

#[tokio::test]
async fn unbounded_subscription_forwards_without_polling() {
    let producer = test_producer();
    let mut body = BodyStream::unbounded(Arc::clone(&producer));

    for payload in [&b"a"[..], b"b", b"c"] {
        producer.new_chunk(Bytes::copy_from_slice(payload));
    }
    assert_eq!(producer.emitted_chunks(), 3);

    producer.last_content();
    let mut collected = Vec::new();
    while let Some(chunk) = body.next().await {
        collected.push(chunk.expect("no error"));
    }
    assert_eq!(collected, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn a_channel_failure_surfaces_as_a_stream_error() {
    let producer = test_producer();
    let mut body = BodyStream::subscribe(Arc::clone(&producer));

    producer.new_chunk(Bytes::from_static(b"partial"));
    producer.channel_exception(channel_cause("origin reset"));

    assert_eq!(body.next().await.expect("chunk").expect("no error"), "partial");
    let error = body
        .next()
        .await
        .expect("terminal item")
        .expect_err("stream should fail");
    assert!(error.to_string().contains("origin reset"));
    assert!(body.next().await.is_none());
    assert_eq!(producer.state(), ProducerState::Terminated);
}

#[tokio::test]
async fn dropping_the_stream_cancels_the_subscription() {
    let (log, hooks) = recording_hooks();
    let producer: Arc<ContentProducer<Bytes>> = Arc::new(ContentProducer::with_hooks(
        Origin::new("app-01", "origin.example.net:8080"),
        "conn-1",
        hooks,
    ));
    let body = BodyStream::subscribe(Arc::clone(&producer));

    producer.new_chunk(Bytes::from_static(b"undelivered"));
    drop(body);

    assert_eq!(producer.state(), ProducerState::Terminated);
    let terminations = log.terminations();
    assert_eq!(terminations.len(), 1);
    assert!(terminations[0].contains("consumer disconnected"));
}

#[tokio::test(start_paused = true)]
async fn the_grace_timer_tears_down_a_stranded_producer() {
    let producer = test_producer();
    producer.arm_tear_down_timer(Duration::from_secs(5));

    producer.new_chunk(Bytes::from_static(b"orphaned"));
    producer.last_content();
    producer.channel_inactive(channel_cause("closed"));
    assert_eq!(producer.state(), ProducerState::BufferingCompleted);

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(producer.state(), ProducerState::Terminated);
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_grace_timer_keeps_the_producer_alive() {
    let producer = test_producer();
    let cancel = producer.arm_tear_down_timer(Duration::from_secs(5));

    producer.new_chunk(Bytes::from_static(b"kept"));
    producer.last_content();
    producer.channel_inactive(channel_cause("closed"));

    cancel.cancel();
    tokio::time::sleep(Duration::from_secs(10)).await;

    // The buffered body is still waiting for a subscriber.
    assert_eq!(producer.state(), ProducerState::BufferingCompleted);
    assert_eq!(producer.received_bytes(), 4);
}

#[tokio::test(start_paused = true)]
async fn a_subscriber_inside_the_grace_window_still_drains_the_body() {
    let producer = test_producer();
    producer.arm_tear_down_timer(Duration::from_secs(5));

    producer.new_chunk(Bytes::from_static(b"late but fine"));
    producer.last_content();
    producer.channel_inactive(channel_cause("closed"));

    tokio::time::sleep(Duration::from_secs(2)).await;
    let mut body = BodyStream::subscribe(Arc::clone(&producer));

    assert_eq!(
        body.next().await.expect("chunk").expect("no error"),
        "late but fine"
    );
    assert!(body.next().await.is_none());
    assert_eq!(producer.state(), ProducerState::Completed);

    // The timer still fires, but against a completed producer it is a
    // no-op.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(producer.state(), ProducerState::Completed);
}
