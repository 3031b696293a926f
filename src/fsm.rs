//! Table-driven state machine driver.
//!
//! [`StateMachine`] holds the current state and feeds events through a
//! [`Transitions`] table one at a time. A table maps each (state, event)
//! pair either to a handler that runs its side effects and names the next
//! state, or hands the event back as unhandled, in which case the machine
//! routes it to the table's inappropriate-event callback and leaves the
//! state unchanged.
//!
//! The driver itself is not synchronized: callers serialize dispatch by
//! holding exclusive access, typically by keeping the machine behind the
//! same lock as the data its handlers mutate. Side effects therefore always
//! complete before the next event is processed.

/// Outcome of offering an event to a transition table.
pub enum Step<S, E> {
    /// Transition to the given state (possibly the current one).
    Next(S),
    /// The (state, event) pair has no transition; the event is handed back.
    Unhandled(E),
}

/// A transition table mapping (state, event) pairs to handlers.
pub trait Transitions {
    /// State type driven by this table.
    type State: Copy;
    /// Event type consumed by this table.
    type Event;

    /// Apply `event` in `state`, running any side effects.
    ///
    /// Returns [`Step::Next`] with the state to move to, or
    /// [`Step::Unhandled`] to give the event back for inappropriate-event
    /// handling.
    fn dispatch(&mut self, state: Self::State, event: Self::Event) -> Step<Self::State, Self::Event>;

    /// Called when [`dispatch`](Self::dispatch) returned the event as
    /// unhandled. The state does not change.
    fn on_inappropriate(&mut self, state: Self::State, event: Self::Event);
}

/// Current-state holder driving a [`Transitions`] table.
///
/// # Examples
///
/// ```
/// use flowline::fsm::{StateMachine, Step, Transitions};
///
/// #[derive(Clone, Copy, PartialEq, Debug)]
/// enum Turnstile {
///     Locked,
///     Open,
/// }
///
/// enum Input {
///     Coin,
///     Push,
/// }
///
/// struct Table {
///     rejected: usize,
/// }
///
/// impl Transitions for Table {
///     type State = Turnstile;
///     type Event = Input;
///
///     fn dispatch(&mut self, state: Turnstile, event: Input) -> Step<Turnstile, Input> {
///         match (state, event) {
///             (Turnstile::Locked, Input::Coin) => Step::Next(Turnstile::Open),
///             (Turnstile::Open, Input::Push) => Step::Next(Turnstile::Locked),
///             (_, event) => Step::Unhandled(event),
///         }
///     }
///
///     fn on_inappropriate(&mut self, _state: Turnstile, _event: Input) { self.rejected += 1; }
/// }
///
/// let mut table = Table { rejected: 0 };
/// let mut machine = StateMachine::new(Turnstile::Locked);
/// machine.handle(&mut table, Input::Push); // rejected, state unchanged
/// machine.handle(&mut table, Input::Coin);
/// assert_eq!(machine.state(), Turnstile::Open);
/// assert_eq!(table.rejected, 1);
/// ```
#[derive(Debug)]
pub struct StateMachine<S> {
    current: S,
}

impl<S: Copy> StateMachine<S> {
    /// Create a machine in `initial` state.
    #[must_use]
    pub fn new(initial: S) -> Self { Self { current: initial } }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> S { self.current }

    /// Feed one event through `table`.
    ///
    /// On [`Step::Next`] the machine adopts the returned state; on
    /// [`Step::Unhandled`] the event is routed to
    /// [`Transitions::on_inappropriate`] and the state is left unchanged.
    pub fn handle<T>(&mut self, table: &mut T, event: T::Event)
    where
        T: Transitions<State = S>,
    {
        match table.dispatch(self.current, event) {
            Step::Next(next) => self.current = next,
            Step::Unhandled(event) => table.on_inappropriate(self.current, event),
        }
    }
}
