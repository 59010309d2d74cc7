//! The per-session state machine (spec §4.8):
//! `new -> initializing -> ready -> closing -> closed`.

use std::sync::atomic::{AtomicU8, Ordering};

/// One state in the session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Constructed, handshake not yet started.
    New = 0,
    /// `initialize` sent or received, handshake not yet complete.
    Initializing = 1,
    /// Handshake complete; ordinary traffic may flow.
    Ready = 2,
    /// Shutting down: tables are being drained.
    Closing = 3,
    /// Fully torn down.
    Closed = 4,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::New,
            1 => Self::Initializing,
            2 => Self::Ready,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// An atomic cell holding the current [`SessionState`], with the legal
/// transitions of spec §4.8 enforced at the call site rather than in the
/// type itself (the cell is a plain store; `Session` decides when a
/// transition is legal).
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl Default for StateCell {
    fn default() -> Self {
        Self(AtomicU8::new(SessionState::New as u8))
    }
}

impl StateCell {
    /// A cell starting at [`SessionState::New`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    #[must_use]
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Unconditionally sets the state. Any → `Closing`/`Closed` transitions
    /// (spec: "any -> closing on explicit Close, transport error, keepalive
    /// timeout, or unsupported version") are always legal, so the engine
    /// calls this directly for those; forward handshake progress goes
    /// through [`StateCell::advance_if`] instead.
    pub fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Transitions from `from` to `to`, returning `true` if the cell was in
    /// `from` at the time of the swap. Used for the forward-only handshake
    /// transitions where a stale or duplicate signal (e.g. a second
    /// `initialized` notification) must not clobber a later state.
    pub fn advance_if(&self, from: SessionState, to: SessionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// `true` if the session can still carry ordinary request/response
    /// traffic (i.e. has completed its handshake and not yet started
    /// closing).
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.get() == SessionState::Ready
    }

    /// `true` if the session has entered `Closing` or `Closed`.
    #[must_use]
    pub fn is_closing_or_closed(&self) -> bool {
        matches!(self.get(), SessionState::Closing | SessionState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_new() {
        assert_eq!(StateCell::new().get(), SessionState::New);
    }

    #[test]
    fn advance_if_only_succeeds_from_the_expected_state() {
        let cell = StateCell::new();
        assert!(!cell.advance_if(SessionState::Ready, SessionState::Closing));
        assert_eq!(cell.get(), SessionState::New);
        assert!(cell.advance_if(SessionState::New, SessionState::Initializing));
        assert_eq!(cell.get(), SessionState::Initializing);
    }

    #[test]
    fn set_is_unconditional() {
        let cell = StateCell::new();
        cell.set(SessionState::Closed);
        assert_eq!(cell.get(), SessionState::Closed);
    }

    #[test]
    fn is_ready_and_is_closing_or_closed_reflect_state() {
        let cell = StateCell::new();
        assert!(!cell.is_ready());
        cell.set(SessionState::Ready);
        assert!(cell.is_ready());
        assert!(!cell.is_closing_or_closed());
        cell.set(SessionState::Closing);
        assert!(cell.is_closing_or_closed());
    }
}
