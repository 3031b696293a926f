//! Shared helpers for producer integration tests.
#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use flowline::{Cause, ContentSubscriber, ProducerHooks};

/// One downstream signal observed by a recording subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Next(Vec<u8>),
    Complete,
    Error(String),
}

/// Shared log of downstream signals in delivery order.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Signal>>>);

impl Recorder {
    pub fn push(&self, signal: Signal) { self.0.lock().expect("recorder lock").push(signal); }

    pub fn signals(&self) -> Vec<Signal> { self.0.lock().expect("recorder lock").clone() }

    /// Payloads of the `Next` signals, in delivery order.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.signals()
            .into_iter()
            .filter_map(|signal| match signal {
                Signal::Next(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Terminal signals observed (there should never be more than one).
    pub fn terminals(&self) -> Vec<Signal> {
        self.signals()
            .into_iter()
            .filter(|signal| !matches!(signal, Signal::Next(_)))
            .collect()
    }
}

/// Subscriber recording every signal it receives.
pub struct RecordingSubscriber(pub Recorder);

impl ContentSubscriber<Bytes> for RecordingSubscriber {
    fn on_next(&mut self, chunk: Bytes) { self.0.push(Signal::Next(chunk.to_vec())); }

    fn on_complete(&mut self) { self.0.push(Signal::Complete); }

    fn on_error(&mut self, cause: Cause) { self.0.push(Signal::Error(cause.to_string())); }
}

/// Collaborator-side log of hook invocations.
#[derive(Default)]
pub struct HookLog {
    ask_for_more: AtomicUsize,
    completed: AtomicUsize,
    terminated: Mutex<Vec<String>>,
    tear_down: AtomicUsize,
}

impl HookLog {
    pub fn asks(&self) -> usize { self.ask_for_more.load(Ordering::SeqCst) }

    pub fn completions(&self) -> usize { self.completed.load(Ordering::SeqCst) }

    pub fn terminations(&self) -> Vec<String> {
        self.terminated.lock().expect("hook log lock").clone()
    }

    pub fn tear_downs(&self) -> usize { self.tear_down.load(Ordering::SeqCst) }
}

/// Build hooks that record every invocation into the returned log.
pub fn recording_hooks() -> (Arc<HookLog>, ProducerHooks) {
    let log = Arc::new(HookLog::default());
    let asks = Arc::clone(&log);
    let completions = Arc::clone(&log);
    let terminations = Arc::clone(&log);
    let tear_downs = Arc::clone(&log);
    let hooks = ProducerHooks {
        ask_for_more: Some(Box::new(move || {
            asks.ask_for_more.fetch_add(1, Ordering::SeqCst);
        })),
        on_complete: Some(Box::new(move || {
            completions.completed.fetch_add(1, Ordering::SeqCst);
        })),
        on_terminate: Some(Box::new(move |cause| {
            terminations
                .terminated
                .lock()
                .expect("hook log lock")
                .push(cause.to_string());
        })),
        delayed_tear_down: Some(Box::new(move || {
            tear_downs.tear_down.fetch_add(1, Ordering::SeqCst);
        })),
    };
    (log, hooks)
}

/// A channel-level failure cause for tests.
pub fn channel_cause(message: &str) -> Cause {
    Arc::new(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        message.to_owned(),
    ))
}
