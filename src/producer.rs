//! Flow-controlled producer bridging a transport channel to a reactive
//! subscriber.
//!
//! [`ContentProducer`] sits between an origin-facing connection that
//! delivers body fragments and a downstream consumer that pulls them on
//! demand. Fragments are buffered in arrival order; a demand counter
//! accumulated from `request(n)` calls gates emission; a six-state machine
//! decides how every transport and subscriber event is handled, including
//! late subscription, premature cancellation, and channel loss.
//!
//! Transitions are serialized behind a single lock, so side effects of one
//! event always complete before the next is processed. The demand counter
//! and transfer counters are atomics readable without that lock.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU8, Ordering},
    },
};

use log::warn;

use crate::{
    chunk::BodyChunk,
    demand::Demand,
    error::{BodyError, Cause},
    fsm::{StateMachine, Step, Transitions},
    hooks::ProducerHooks,
    metrics,
    origin::Origin,
    stats::{StatsSnapshot, TransferStats},
    subscriber::ContentSubscriber,
};

/// Queue depth at or above which upstream reads are paused.
///
/// `ask_for_more` fires only while the queue holds strictly fewer chunks
/// than this.
const DEMAND_THRESHOLD: usize = 1;

/// Lifecycle state of a [`ContentProducer`].
///
/// `Completed` and `Terminated` are absorbing: once reached, no event
/// changes the state again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProducerState {
    /// Chunks are arriving before a subscriber exists; buffered in order.
    Buffering = 0,
    /// A subscriber is attached; chunks are queued and drained per demand.
    Streaming = 1,
    /// End-of-body arrived before subscription; the queue holds the full
    /// body awaiting a subscriber.
    BufferingCompleted = 2,
    /// A subscriber attached after end-of-body; the residual queue is being
    /// drained.
    EmittingBufferedContent = 3,
    /// Terminal success: the body was fully delivered.
    Completed = 4,
    /// Terminal failure: buffers released, the error signal delivered.
    Terminated = 5,
}

impl ProducerState {
    /// Whether the producer has reached an absorbing state.
    #[must_use]
    pub fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Terminated) }

    /// States in which a subscription has already been accepted (or the
    /// producer is past the point of accepting one).
    fn is_subscribed(self) -> bool {
        matches!(
            self,
            Self::Streaming | Self::EmittingBufferedContent | Self::Completed | Self::Terminated
        )
    }

    fn decode(raw: u8) -> Self {
        match raw {
            0 => Self::Buffering,
            1 => Self::Streaming,
            2 => Self::BufferingCompleted,
            3 => Self::EmittingBufferedContent,
            4 => Self::Completed,
            _ => Self::Terminated,
        }
    }
}

/// Events driving the producer state machine.
enum ProducerEvent<C> {
    /// A new body fragment arrived from the transport.
    Chunk(C),
    /// The transport signalled end-of-body.
    End,
    /// The channel failed with an error.
    ChannelException(Cause),
    /// The channel closed; the cause describes why.
    ChannelInactive(Cause),
    /// A downstream consumer attached.
    Subscribed(Box<dyn ContentSubscriber<C>>),
    /// The consumer requested `n` more chunks.
    Request(u64),
    /// The consumer detached before the terminal signal.
    Unsubscribe,
    /// The grace window after channel loss expired.
    TearDown(Cause),
}

impl<C> ProducerEvent<C> {
    fn kind(&self) -> &'static str {
        match self {
            Self::Chunk(_) => "ContentChunk",
            Self::End => "ContentEnd",
            Self::ChannelException(_) => "ChannelException",
            Self::ChannelInactive(_) => "ChannelInactive",
            Self::Subscribed(_) => "ContentSubscribed",
            Self::Request(_) => "BackpressureRequest",
            Self::Unsubscribe => "Unsubscribe",
            Self::TearDown(_) => "DelayedTearDown",
        }
    }
}

/// State guarded by the transition lock.
struct Inner<C> {
    machine: StateMachine<ProducerState>,
    queue: VecDeque<C>,
    subscriber: Option<Box<dyn ContentSubscriber<C>>>,
    hooks: ProducerHooks,
    tear_down_armed: bool,
}

/// Flow-controlled body producer for one response.
///
/// Created per response in the buffering state and driven by two
/// collaborators: the transport injects chunk and channel events, the
/// subscriber injects demand and cancellation events. The producer is
/// destroyed once it reaches a terminal state and all downstream signals
/// have been delivered.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use flowline::{ContentProducer, Origin};
///
/// let producer: ContentProducer<Bytes> =
///     ContentProducer::new(Origin::new("app-01", "origin:8080"), "conn-1");
/// producer.new_chunk(Bytes::from_static(b"hello"));
/// producer.last_content();
/// assert_eq!(producer.received_bytes(), 5);
/// ```
pub struct ContentProducer<C: BodyChunk> {
    inner: Mutex<Inner<C>>,
    /// Mirror of the machine's state for lock-free reads.
    state_cell: AtomicU8,
    demand: Demand,
    stats: TransferStats,
    origin: Origin,
    prefix: String,
}

impl<C: BodyChunk> ContentProducer<C> {
    /// Create a producer with no collaborator hooks.
    #[must_use]
    pub fn new(origin: Origin, prefix: impl Into<String>) -> Self {
        Self::with_hooks(origin, prefix, ProducerHooks::default())
    }

    /// Create a producer wired to its transport collaborator.
    #[must_use]
    pub fn with_hooks(origin: Origin, prefix: impl Into<String>, hooks: ProducerHooks) -> Self {
        Self {
            inner: Mutex::new(Inner {
                machine: StateMachine::new(ProducerState::Buffering),
                queue: VecDeque::new(),
                subscriber: None,
                hooks,
                tear_down_armed: false,
            }),
            state_cell: AtomicU8::new(ProducerState::Buffering as u8),
            demand: Demand::new(),
            stats: TransferStats::new(),
            origin,
            prefix: prefix.into(),
        }
    }

    /// Enqueue one body fragment. The producer takes ownership.
    pub fn new_chunk(&self, chunk: C) { self.on_event(ProducerEvent::Chunk(chunk)); }

    /// Signal end-of-body.
    pub fn last_content(&self) { self.on_event(ProducerEvent::End); }

    /// Signal a fatal channel error.
    pub fn channel_exception(&self, cause: Cause) {
        self.on_event(ProducerEvent::ChannelException(cause));
    }

    /// Signal that the channel closed; `cause` describes why.
    pub fn channel_inactive(&self, cause: Cause) {
        self.on_event(ProducerEvent::ChannelInactive(cause));
    }

    /// Signal that the grace window after channel loss expired.
    ///
    /// Injected by the transport collaborator after `delayed_tear_down`
    /// asked it to schedule the event. Terminates a producer still waiting
    /// for a subscriber, reporting the origin and transfer progress in the
    /// cause.
    pub fn tear_down_resources(&self) {
        let cause = BodyError::ResponseTimeout {
            origin: self.origin.clone(),
            reason: "channelClosed",
            stats: self.stats.snapshot(),
        }
        .into_cause();
        self.on_event(ProducerEvent::TearDown(cause));
    }

    /// Register the sole subscriber.
    ///
    /// A second subscription is a contract violation: the newcomer receives
    /// an error signal, and if an earlier subscriber is attached the
    /// producer errors it too and terminates.
    pub fn on_subscribed(&self, subscriber: impl ContentSubscriber<C> + 'static) {
        if self.state().is_subscribed() {
            self.warn_event(self.state(), "Secondary content subscription");
        }
        self.on_event(ProducerEvent::Subscribed(Box::new(subscriber)));
    }

    /// Add `n` to the demand counter with saturation.
    ///
    /// `u64::MAX` requests unbounded delivery. Requests issued before
    /// subscription are honoured once a subscriber attaches.
    pub fn request(&self, n: u64) { self.on_event(ProducerEvent::Request(n)); }

    /// Cancel the subscription.
    ///
    /// Treated as a failure, not a clean stop: buffered chunks are released
    /// and the producer terminates with a consumer-disconnected cause.
    pub fn unsubscribe(&self) { self.on_event(ProducerEvent::Unsubscribe); }

    /// Current state. Lock-free; may trail an in-flight transition.
    #[must_use]
    pub fn state(&self) -> ProducerState {
        ProducerState::decode(self.state_cell.load(Ordering::Acquire))
    }

    /// Bytes accepted from the transport.
    #[must_use]
    pub fn received_bytes(&self) -> u64 { self.stats.received_bytes() }

    /// Chunks accepted from the transport.
    #[must_use]
    pub fn received_chunks(&self) -> u64 { self.stats.received_chunks() }

    /// Bytes delivered to the subscriber.
    #[must_use]
    pub fn emitted_bytes(&self) -> u64 { self.stats.emitted_bytes() }

    /// Chunks delivered to the subscriber.
    #[must_use]
    pub fn emitted_chunks(&self) -> u64 { self.stats.emitted_chunks() }

    /// Peak number of chunks buffered at once.
    #[must_use]
    pub fn max_queue_depth_chunks(&self) -> u64 { self.stats.max_queue_depth_chunks() }

    /// Peak number of bytes buffered at once.
    #[must_use]
    pub fn max_queue_depth_bytes(&self) -> u64 { self.stats.max_queue_depth_bytes() }

    /// Point-in-time copy of all transfer counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot { self.stats.snapshot() }

    /// Origin this producer reads from.
    #[must_use]
    pub fn origin(&self) -> &Origin { &self.origin }

    /// Replace the `delayed_tear_down` hook.
    ///
    /// Used by collaborators that can only build the hook once the producer
    /// exists, such as the grace-timer helper.
    pub(crate) fn set_tear_down_hook(&self, hook: Box<dyn FnMut() + Send + 'static>) {
        let mut guard = self.inner.lock().expect("producer lock poisoned");
        guard.hooks.delayed_tear_down = Some(hook);
    }

    /// Serialize one event through the state machine.
    fn on_event(&self, event: ProducerEvent<C>) {
        let mut guard = self.inner.lock().expect("producer lock poisoned");
        let Inner {
            machine,
            queue,
            subscriber,
            hooks,
            tear_down_armed,
        } = &mut *guard;
        let mut table = Table {
            producer: self,
            queue,
            subscriber,
            hooks,
            tear_down_armed,
        };
        machine.handle(&mut table, event);
        self.state_cell.store(machine.state() as u8, Ordering::Release);
    }

    fn already_subscribed_cause(&self, state: ProducerState) -> Cause {
        BodyError::AlreadySubscribed {
            state,
            connection: self.prefix.clone(),
        }
        .into_cause()
    }

    /// Emit the compact warning diagnostic for recoverable anomalies.
    fn warn_event(&self, state: ProducerState, message: &str) {
        let stats = self.stats.snapshot();
        warn!(
            "message=\"{message}\", prefix={prefix}, state={state:?}, \
             receivedChunks={}, receivedBytes={}, emittedChunks={}, emittedBytes={}, \
             maxQueueDepthChunks={}, maxQueueDepthBytes={}",
            stats.received_chunks,
            stats.received_bytes,
            stats.emitted_chunks,
            stats.emitted_bytes,
            stats.max_queue_depth_chunks,
            stats.max_queue_depth_bytes,
            prefix = self.prefix,
        );
    }
}

impl<C: BodyChunk> std::fmt::Debug for ContentProducer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentProducer")
            .field("state", &self.state())
            .field("origin", &self.origin)
            .field("prefix", &self.prefix)
            .field("demand", &self.demand.get())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

/// Transition table with borrowed access to the guarded state.
///
/// Built fresh for each event inside the transition lock, so handlers can
/// mutate the queue, the subscriber slot, and the hooks while reading the
/// producer's atomics.
struct Table<'a, C: BodyChunk> {
    producer: &'a ContentProducer<C>,
    queue: &'a mut VecDeque<C>,
    subscriber: &'a mut Option<Box<dyn ContentSubscriber<C>>>,
    hooks: &'a mut ProducerHooks,
    tear_down_armed: &'a mut bool,
}

impl<C: BodyChunk> Transitions for Table<'_, C> {
    type State = ProducerState;
    type Event = ProducerEvent<C>;

    fn dispatch(
        &mut self,
        state: ProducerState,
        event: ProducerEvent<C>,
    ) -> Step<ProducerState, ProducerEvent<C>> {
        use ProducerEvent as Ev;
        use ProducerState::{
            Buffering, BufferingCompleted, Completed, EmittingBufferedContent, Streaming,
            Terminated,
        };

        let next = match (state, event) {
            (Buffering, Ev::Chunk(chunk)) => {
                self.enqueue(chunk);
                self.ask_for_more();
                Buffering
            }
            (Buffering, Ev::End) => BufferingCompleted,
            (Buffering, Ev::ChannelInactive(cause) | Ev::ChannelException(cause)) => {
                self.release_and_terminate(&cause, "channel")
            }
            (Buffering, Ev::Subscribed(subscriber)) => {
                *self.subscriber = Some(subscriber);
                self.drain();
                self.ask_for_more();
                Streaming
            }
            (Buffering, Ev::Request(n)) => {
                self.producer.demand.add(n);
                self.ask_for_more();
                Buffering
            }

            (BufferingCompleted, Ev::Chunk(chunk)) => self.spurious_chunk(state, chunk),
            (BufferingCompleted, Ev::End) => BufferingCompleted,
            (BufferingCompleted, Ev::ChannelInactive(_)) => {
                self.arm_tear_down();
                BufferingCompleted
            }
            // Swallowed: the body is already fully buffered, and a
            // termination here would race a subscriber about to drain it.
            (BufferingCompleted, Ev::ChannelException(_)) => BufferingCompleted,
            (BufferingCompleted, Ev::TearDown(cause)) => {
                self.release_and_terminate(&cause, "tear_down")
            }
            (BufferingCompleted, Ev::Subscribed(subscriber)) => {
                *self.subscriber = Some(subscriber);
                if self.queue.is_empty() {
                    self.complete()
                } else {
                    self.drain();
                    if self.queue.is_empty() {
                        self.complete()
                    } else {
                        EmittingBufferedContent
                    }
                }
            }
            (BufferingCompleted, Ev::Request(n)) => {
                self.producer.demand.add(n);
                BufferingCompleted
            }

            (Streaming, Ev::Chunk(chunk)) => {
                self.enqueue(chunk);
                self.drain();
                self.ask_for_more();
                Streaming
            }
            (Streaming, Ev::End) => {
                if self.queue.is_empty() {
                    self.complete()
                } else {
                    EmittingBufferedContent
                }
            }
            (Streaming, Ev::ChannelInactive(cause) | Ev::ChannelException(cause)) => {
                self.emit_error_and_terminate(cause, "channel")
            }
            (Streaming, Ev::Subscribed(subscriber)) => {
                self.secondary_subscription(state, subscriber)
            }
            (Streaming, Ev::Request(n)) => {
                self.producer.demand.add(n);
                self.drain();
                self.ask_for_more();
                Streaming
            }
            (Streaming, Ev::Unsubscribe) => self.premature_unsubscribe(state),

            (EmittingBufferedContent, Ev::Chunk(chunk)) => self.spurious_chunk(state, chunk),
            // Does not happen: end-of-body was already received.
            (EmittingBufferedContent, Ev::End) => EmittingBufferedContent,
            (EmittingBufferedContent, Ev::ChannelInactive(_)) => {
                self.arm_tear_down();
                EmittingBufferedContent
            }
            (EmittingBufferedContent, Ev::ChannelException(_)) => EmittingBufferedContent,
            (EmittingBufferedContent, Ev::TearDown(cause)) => {
                self.emit_error_and_terminate(cause, "tear_down")
            }
            (EmittingBufferedContent, Ev::Subscribed(subscriber)) => {
                self.secondary_subscription(state, subscriber)
            }
            (EmittingBufferedContent, Ev::Request(n)) => {
                self.producer.demand.add(n);
                self.drain();
                // No `ask_for_more`: the response is fully received already.
                if self.queue.is_empty() {
                    self.complete()
                } else {
                    EmittingBufferedContent
                }
            }
            (EmittingBufferedContent, Ev::Unsubscribe) => self.premature_unsubscribe(state),

            (Completed, Ev::Chunk(chunk)) => self.spurious_chunk(state, chunk),
            (Completed, Ev::End | Ev::Request(_) | Ev::Unsubscribe | Ev::TearDown(_)) => Completed,
            (Completed, Ev::Subscribed(subscriber)) => self.late_subscription(state, subscriber),

            (Terminated, Ev::Chunk(chunk)) => self.spurious_chunk(state, chunk),
            (Terminated, Ev::Request(_)) => Terminated,
            (Terminated, Ev::Subscribed(subscriber)) => self.late_subscription(state, subscriber),

            (_, event) => return Step::Unhandled(event),
        };

        Step::Next(next)
    }

    fn on_inappropriate(&mut self, state: ProducerState, event: ProducerEvent<C>) {
        self.producer
            .warn_event(state, &format!("Inappropriate event={}", event.kind()));
        metrics::inc_inappropriate_event();
    }
}

impl<C: BodyChunk> Table<'_, C> {
    fn enqueue(&mut self, chunk: C) {
        self.producer
            .stats
            .record_received(chunk.readable_bytes() as u64);
        self.queue.push_back(chunk);
    }

    /// Resume upstream reads while the queue is below the demand threshold.
    fn ask_for_more(&mut self) {
        if self.queue.len() < DEMAND_THRESHOLD {
            self.hooks.ask_for_more();
        }
    }

    /// Emit queued chunks while demand allows.
    ///
    /// Each iteration claims one unit of demand before popping; when the
    /// pop finds the queue empty the claimed unit is handed back.
    fn drain(&mut self) {
        let Some(subscriber) = self.subscriber.as_mut() else {
            return;
        };
        while self.producer.demand.claim() {
            let Some(chunk) = self.queue.pop_front() else {
                self.producer.demand.unclaim();
                break;
            };
            self.producer
                .stats
                .record_emitted(chunk.readable_bytes() as u64);
            subscriber.on_next(chunk);
        }
    }

    /// Drop every chunk still queued, releasing its backing storage.
    fn release_buffers(&mut self) { self.queue.clear(); }

    fn complete(&mut self) -> ProducerState {
        if let Some(subscriber) = self.subscriber.as_mut() {
            subscriber.on_complete();
        }
        self.hooks.on_complete();
        metrics::inc_completed();
        ProducerState::Completed
    }

    /// Terminate without a downstream signal (no subscriber attached).
    fn release_and_terminate(&mut self, cause: &Cause, kind: &'static str) -> ProducerState {
        self.release_buffers();
        self.hooks.on_terminate(cause);
        metrics::inc_terminated(kind);
        ProducerState::Terminated
    }

    /// Terminate and deliver the error signal downstream.
    fn emit_error_and_terminate(&mut self, cause: Cause, kind: &'static str) -> ProducerState {
        self.release_buffers();
        if let Some(subscriber) = self.subscriber.as_mut() {
            subscriber.on_error(Arc::clone(&cause));
        }
        self.hooks.on_terminate(&cause);
        metrics::inc_terminated(kind);
        ProducerState::Terminated
    }

    fn premature_unsubscribe(&mut self, state: ProducerState) -> ProducerState {
        let cause = BodyError::ConsumerDisconnected {
            message: format!("the consumer unsubscribed (connection={})", self.producer.prefix),
            state,
        }
        .into_cause();
        self.emit_error_and_terminate(cause, "unsubscribed")
    }

    /// A second subscription while one is attached tears everything down:
    /// both parties are errored and the producer terminates.
    fn secondary_subscription(
        &mut self,
        state: ProducerState,
        mut newcomer: Box<dyn ContentSubscriber<C>>,
    ) -> ProducerState {
        self.release_buffers();
        let cause = self.producer.already_subscribed_cause(state);
        newcomer.on_error(Arc::clone(&cause));
        if let Some(subscriber) = self.subscriber.as_mut() {
            subscriber.on_error(Arc::clone(&cause));
        }
        self.hooks.on_terminate(&cause);
        metrics::inc_terminated("secondary_subscription");
        ProducerState::Terminated
    }

    /// A subscription to an already-terminal producer errors the newcomer
    /// and leaves the state unchanged.
    fn late_subscription(
        &mut self,
        state: ProducerState,
        mut newcomer: Box<dyn ContentSubscriber<C>>,
    ) -> ProducerState {
        newcomer.on_error(self.producer.already_subscribed_cause(state));
        state
    }

    fn spurious_chunk(&mut self, state: ProducerState, chunk: C) -> ProducerState {
        self.producer.warn_event(state, "Spurious content chunk");
        metrics::inc_spurious_chunk();
        drop(chunk);
        state
    }

    /// Ask the collaborator to schedule the grace-window tear-down, at most
    /// once per producer.
    fn arm_tear_down(&mut self) {
        if !*self.tear_down_armed {
            *self.tear_down_armed = true;
            self.hooks.delayed_tear_down();
        }
    }
}
