//! Collaborator callbacks invoked by the content producer.
//!
//! This module defines [`ProducerHooks`], a container for the optional
//! callbacks a transport adapter wires into a producer. Every hook runs
//! synchronously inside a producer transition: implementations must be
//! non-blocking and must not call back into the producer's event API.

use crate::error::Cause;

/// Type alias for the upstream demand callback.
type AskForMoreHook = Box<dyn FnMut() + Send + 'static>;

/// Type alias for the successful-completion callback.
type OnCompleteHook = Box<dyn FnMut() + Send + 'static>;

/// Type alias for the termination callback.
type OnTerminateHook = Box<dyn FnMut(&Cause) + Send + 'static>;

/// Type alias for the delayed tear-down callback.
type TearDownHook = Box<dyn FnMut() + Send + 'static>;

/// Callbacks connecting a producer to its transport collaborator.
///
/// - `ask_for_more` resumes upstream reads; it is idempotent and only
///   invoked while the buffer queue is below the demand threshold.
/// - `on_complete` fires exactly once, if and only if the producer reaches
///   its completed state.
/// - `on_terminate` fires exactly once, if and only if the producer reaches
///   its terminated state, carrying the failure cause.
/// - `delayed_tear_down` fires at most once, when the channel goes away
///   without a subscriber draining the content; the collaborator must
///   answer with a tear-down event after a grace period.
pub struct ProducerHooks {
    /// Invoked when the producer can accept more content from upstream.
    pub ask_for_more: Option<AskForMoreHook>,
    /// Invoked once the body has been fully delivered downstream.
    pub on_complete: Option<OnCompleteHook>,
    /// Invoked when the producer terminates with a failure.
    pub on_terminate: Option<OnTerminateHook>,
    /// Invoked when a grace-window tear-down should be scheduled.
    pub delayed_tear_down: Option<TearDownHook>,
}

impl Default for ProducerHooks {
    fn default() -> Self {
        Self {
            ask_for_more: None,
            on_complete: None,
            on_terminate: None,
            delayed_tear_down: None,
        }
    }
}

impl ProducerHooks {
    /// Run the `ask_for_more` hook if registered.
    pub(crate) fn ask_for_more(&mut self) {
        if let Some(hook) = &mut self.ask_for_more {
            hook();
        }
    }

    /// Run the `on_complete` hook if registered.
    pub(crate) fn on_complete(&mut self) {
        if let Some(hook) = &mut self.on_complete {
            hook();
        }
    }

    /// Run the `on_terminate` hook if registered.
    pub(crate) fn on_terminate(&mut self, cause: &Cause) {
        if let Some(hook) = &mut self.on_terminate {
            hook(cause);
        }
    }

    /// Run the `delayed_tear_down` hook if registered.
    pub(crate) fn delayed_tear_down(&mut self) {
        if let Some(hook) = &mut self.delayed_tear_down {
            hook();
        }
    }
}
