//! Session lifecycle state machine
//!
//! AUTHENTICATING → STREAMING → CLOSING → CLOSED, with REJECTED (from
//! AUTHENTICATING) and PREEMPTED (from AUTHENTICATING or STREAMING) as
//! alternate endings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    /// Resolving the credential
    Authenticating,
    /// Frame loop running
    Streaming,
    /// Final flush in progress
    Closing,
    /// Cleanup done
    Closed,
    /// Credential rejected; nothing registered
    Rejected,
    /// Replaced by a newer session for the same identity
    Preempted,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Authenticating, Streaming)
                | (Authenticating, Rejected)
                | (Authenticating, Preempted)
                | (Streaming, Closing)
                | (Streaming, Preempted)
                | (Preempted, Closing)
                | (Closing, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Rejected)
    }
}

/// Recorded state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: SessionState,
    pub new_state: SessionState,
    pub transitioned_at: DateTime<Utc>,
}

/// Current state plus the session's wall-clock bounds
#[derive(Debug, Clone)]
pub struct Lifecycle {
    session_id: Uuid,
    state: SessionState,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            state: SessionState::Authenticating,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Move to `new_state` if the transition is legal
    ///
    /// Illegal transitions leave the state unchanged and return `None`.
    pub fn transition_to(&mut self, new_state: SessionState) -> Option<StateTransition> {
        if !self.state.can_transition_to(new_state) {
            tracing::warn!(
                session_id = %self.session_id,
                from = ?self.state,
                to = ?new_state,
                "Ignoring illegal session transition"
            );
            return None;
        }

        let transition = StateTransition {
            session_id: self.session_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.closed_at = Some(transition.transitioned_at);
        }

        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_path() {
        let mut lifecycle = Lifecycle::new(Uuid::new_v4());
        assert_eq!(lifecycle.state(), SessionState::Authenticating);

        for next in [SessionState::Streaming, SessionState::Closing, SessionState::Closed] {
            assert!(lifecycle.transition_to(next).is_some());
        }
        assert!(lifecycle.state().is_terminal());
        assert!(lifecycle.closed_at().is_some());
    }

    #[test]
    fn test_preempted_path_still_closes() {
        let mut lifecycle = Lifecycle::new(Uuid::new_v4());
        lifecycle.transition_to(SessionState::Streaming);
        let preempted = lifecycle.transition_to(SessionState::Preempted).unwrap();
        assert_eq!(preempted.old_state, SessionState::Streaming);
        assert!(lifecycle.closed_at().is_none());

        lifecycle.transition_to(SessionState::Closing);
        let closed = lifecycle.transition_to(SessionState::Closed).unwrap();

        assert_eq!(lifecycle.state(), SessionState::Closed);
        assert_eq!(lifecycle.closed_at(), Some(closed.transitioned_at));
        assert!(lifecycle.opened_at() <= closed.transitioned_at);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut lifecycle = Lifecycle::new(Uuid::new_v4());
        assert!(lifecycle.transition_to(SessionState::Closed).is_none());
        assert_eq!(lifecycle.state(), SessionState::Authenticating);

        lifecycle.transition_to(SessionState::Rejected);
        assert!(lifecycle.transition_to(SessionState::Streaming).is_none());
        assert!(!SessionState::Closed.can_transition_to(SessionState::Streaming));
    }
}
