#![doc(html_root_url = "https://docs.rs/flowline/latest")]
//! Flow-controlled streaming of response bodies with demand-driven
//! back-pressure.
//!
//! This crate implements the body pipeline that sits between an
//! origin-facing transport and a reactive consumer in a reverse proxy. A
//! [`ContentProducer`] buffers body fragments as they arrive, accepts a
//! single subscriber at any point in the response lifecycle (before the
//! first byte, mid-stream, or after end-of-body), and emits chunks in
//! arrival order as the subscriber requests them. Channel loss, consumer
//! cancellation, and stranded responses all resolve to exactly one
//! terminal signal with every buffered chunk released.
//!
//! Transports drive a producer through its input API ([`ContentProducer::new_chunk`],
//! [`ContentProducer::last_content`], channel events) and observe it
//! through [`ProducerHooks`]. Async consumers usually attach through
//! [`BodyStream`], which converts polling into demand.

pub mod chunk;
mod demand;
pub mod error;
pub mod fsm;
pub mod hooks;
pub mod metrics;
pub mod origin;
pub mod producer;
mod stats;
pub mod stream;
pub mod subscriber;
mod teardown;

pub use chunk::BodyChunk;
pub use error::{BodyError, Cause};
pub use hooks::ProducerHooks;
pub use origin::Origin;
pub use producer::{ContentProducer, ProducerState};
pub use stats::StatsSnapshot;
pub use stream::BodyStream;
pub use subscriber::ContentSubscriber;
