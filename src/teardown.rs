//! Grace-window scheduling for delayed tear-down.
//!
//! When a channel goes away before any subscriber attaches, the producer
//! asks its collaborator to schedule a tear-down after a grace period, so
//! an imminent subscriber still gets a window to drain the buffered body.
//! This module supplies that collaborator side: a timer task that fires
//! `tear_down_resources` unless cancelled first. The producer is held
//! weakly, so a pending timer never extends its lifetime.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::{runtime::Handle, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{chunk::BodyChunk, producer::ContentProducer};

impl<C: BodyChunk> ContentProducer<C> {
    /// Install a grace timer as this producer's delayed tear-down hook.
    ///
    /// When the producer later requests a delayed tear-down, a task is
    /// spawned on the current runtime that sleeps for `grace` and then
    /// injects the tear-down event. Cancelling the returned token (for
    /// example once a subscriber drains the body to completion) disarms a
    /// pending timer.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn arm_tear_down_timer(self: &Arc<Self>, grace: Duration) -> CancellationToken {
        let token = CancellationToken::new();
        let weak = Arc::downgrade(self);
        let handle = Handle::current();
        let guard = token.clone();
        self.set_tear_down_hook(Box::new(move || {
            spawn_tear_down(&handle, weak.clone(), grace, guard.clone());
        }));
        token
    }
}

fn spawn_tear_down<C: BodyChunk>(
    handle: &Handle,
    producer: Weak<ContentProducer<C>>,
    grace: Duration,
    cancel: CancellationToken,
) {
    handle.spawn(async move {
        tokio::select! {
            () = cancel.cancelled() => {}
            () = sleep(grace) => {
                if let Some(producer) = producer.upgrade() {
                    producer.tear_down_resources();
                }
            }
        }
    });
}
