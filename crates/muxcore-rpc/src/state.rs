//! The session state machine: `opening -> handshaking -> ready -> draining -> closed`.

use std::fmt;

/// The current lifecycle state of an [`crate::RpcSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The transport is being opened.
    Opening,
    /// The transport is open; the protocol initialize exchange is running.
    Handshaking,
    /// The initialize exchange succeeded; calls may be made.
    Ready,
    /// `close()` was requested; no new calls are accepted, in-flight calls
    /// are given a grace period to finish.
    Draining,
    /// The session is finished; all calls fail with `SessionClosed`.
    Closed,
}

impl SessionState {
    /// Whether a new call may be dispatched in this state.
    #[must_use]
    pub fn accepts_calls(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Validate a transition, returning `false` for anything not on the
    /// allowed graph (any exchange failure during handshake goes straight
    /// to `Closed`; anything else advances one step or stays put).
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Opening, Self::Handshaking)
                | (Self::Opening, Self::Closed)
                | (Self::Handshaking, Self::Ready)
                | (Self::Handshaking, Self::Closed)
                | (Self::Ready, Self::Draining)
                | (Self::Ready, Self::Closed)
                | (Self::Draining, Self::Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Opening => "opening",
            Self::Handshaking => "handshaking",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        assert!(SessionState::Opening.can_transition_to(SessionState::Handshaking));
        assert!(SessionState::Handshaking.can_transition_to(SessionState::Ready));
        assert!(SessionState::Ready.can_transition_to(SessionState::Draining));
        assert!(SessionState::Draining.can_transition_to(SessionState::Closed));
    }

    #[test]
    fn any_state_can_fail_straight_to_closed_except_draining() {
        assert!(SessionState::Opening.can_transition_to(SessionState::Closed));
        assert!(SessionState::Handshaking.can_transition_to(SessionState::Closed));
        assert!(SessionState::Ready.can_transition_to(SessionState::Closed));
    }

    #[test]
    fn no_state_reverts() {
        assert!(!SessionState::Ready.can_transition_to(SessionState::Handshaking));
        assert!(!SessionState::Closed.can_transition_to(SessionState::Ready));
        assert!(!SessionState::Draining.can_transition_to(SessionState::Ready));
    }

    #[test]
    fn only_ready_accepts_calls() {
        assert!(SessionState::Ready.accepts_calls());
        assert!(!SessionState::Opening.accepts_calls());
        assert!(!SessionState::Draining.accepts_calls());
        assert!(!SessionState::Closed.accepts_calls());
    }
}
