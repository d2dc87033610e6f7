//! Session lifecycle state machine
//!
//! `transition` is pure: it maps the current state and one event to the next
//! state plus the side effects the driver must perform. All I/O lives in the
//! driver (`gateway.rs`), so every lifecycle rule can be tested here without
//! a runtime.

use std::fmt;

use crate::types::WicketError;

// =============================================================================
// States
// =============================================================================

/// Why a session ended in `Errored`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    MissingCredential,
    PassphraseRequired,
    DecryptionFailed,
    TransportOpenFailed(String),
    TransportClosedUnexpectedly(String),
    StorageFault(String),
    Internal(String),
}

impl SessionFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::PassphraseRequired => "passphrase_required",
            Self::DecryptionFailed => "decryption_failed",
            Self::TransportOpenFailed(_) => "transport_open_failed",
            Self::TransportClosedUnexpectedly(_) => "transport_closed_unexpectedly",
            Self::StorageFault(_) => "storage_fault",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<&WicketError> for SessionFailure {
    fn from(err: &WicketError) -> Self {
        match err {
            WicketError::MissingCredential => Self::MissingCredential,
            WicketError::PassphraseRequired => Self::PassphraseRequired,
            WicketError::DecryptionFailed => Self::DecryptionFailed,
            WicketError::TransportOpenFailed(msg) => Self::TransportOpenFailed(msg.clone()),
            WicketError::TransportClosedUnexpectedly(msg) => {
                Self::TransportClosedUnexpectedly(msg.clone())
            }
            WicketError::StorageFault(msg) => Self::StorageFault(msg.clone()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<SessionFailure> for WicketError {
    fn from(failure: SessionFailure) -> Self {
        match failure {
            SessionFailure::MissingCredential => Self::MissingCredential,
            SessionFailure::PassphraseRequired => Self::PassphraseRequired,
            SessionFailure::DecryptionFailed => Self::DecryptionFailed,
            SessionFailure::TransportOpenFailed(msg) => Self::TransportOpenFailed(msg),
            SessionFailure::TransportClosedUnexpectedly(msg) => {
                Self::TransportClosedUnexpectedly(msg)
            }
            SessionFailure::StorageFault(msg) => Self::StorageFault(msg),
            SessionFailure::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err: WicketError = self.clone().into();
        write!(f, "{err}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingCredential,
    Connecting,
    Handshaking,
    Streaming,
    Closed,
    Errored(SessionFailure),
}

impl SessionState {
    /// `Closed` and `Errored` absorb every further event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Errored(_))
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// A transport is held in these states and must be released on exit.
    fn holds_transport(&self) -> bool {
        matches!(self, Self::Handshaking | Self::Streaming)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingCredential => "awaiting_credential",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
            Self::Errored(_) => "errored",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Errored(failure) => write!(f, "errored: {failure}"),
            other => f.write_str(other.name()),
        }
    }
}

// =============================================================================
// Events / Effects
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Begin the session. `requires_credential` is true when the vault must
    /// be opened before connecting.
    Start { requires_credential: bool },
    CredentialResolved,
    CredentialFailed(SessionFailure),
    TransportOpened,
    TransportOpenFailed(String),
    HandshakeSent,
    /// Remote sent a close frame.
    TransportClosed,
    /// Stream error, failed send, or EOF without a close frame.
    TransportFailed(String),
    Disconnect,
}

/// Work the driver performs after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    ResolveCredential,
    OpenTransport,
    SendHandshake,
    /// Close the transport. Emitted at most once per session.
    ReleaseTransport,
    /// Drop in-flight resolve or connect work without awaiting it.
    AbandonPending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: SessionState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn unchanged(state: &SessionState) -> Self {
        Self {
            next: state.clone(),
            effects: Vec::new(),
        }
    }

    pub fn changed(&self, from: &SessionState) -> bool {
        &self.next != from
    }
}

// =============================================================================
// Transition function
// =============================================================================

/// Compute the next state for `event`.
///
/// Pairs not listed leave the state unchanged with no effects.
pub fn transition(state: &SessionState, event: SessionEvent) -> Transition {
    use SessionEvent as E;
    use SessionState as S;

    if state.is_terminal() {
        return Transition::unchanged(state);
    }

    if event == E::Disconnect {
        let effects = match state {
            S::Idle => Vec::new(),
            S::AwaitingCredential | S::Connecting => vec![Effect::AbandonPending],
            _ => vec![Effect::ReleaseTransport],
        };
        return Transition::to(S::Closed, effects);
    }

    match (state, event) {
        (S::Idle, E::Start { requires_credential: true }) => {
            Transition::to(S::AwaitingCredential, vec![Effect::ResolveCredential])
        }
        (S::Idle, E::Start { requires_credential: false }) => {
            Transition::to(S::Connecting, vec![Effect::OpenTransport])
        }
        (S::Idle | S::AwaitingCredential, E::CredentialFailed(failure)) => {
            Transition::to(S::Errored(failure), Vec::new())
        }
        (S::AwaitingCredential, E::CredentialResolved) => {
            Transition::to(S::Connecting, vec![Effect::OpenTransport])
        }
        (S::Connecting, E::TransportOpened) => {
            Transition::to(S::Handshaking, vec![Effect::SendHandshake])
        }
        (S::Connecting, E::TransportOpenFailed(msg)) => Transition::to(
            S::Errored(SessionFailure::TransportOpenFailed(msg)),
            Vec::new(),
        ),
        (S::Handshaking, E::HandshakeSent) => Transition::to(S::Streaming, Vec::new()),
        (s, E::TransportClosed) if s.holds_transport() => {
            Transition::to(S::Closed, vec![Effect::ReleaseTransport])
        }
        (s, E::TransportFailed(msg)) if s.holds_transport() => Transition::to(
            S::Errored(SessionFailure::TransportClosedUnexpectedly(msg)),
            vec![Effect::ReleaseTransport],
        ),
        (s, _) => Transition::unchanged(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: Vec<SessionEvent>) -> (SessionState, Vec<Effect>) {
        let mut state = SessionState::Idle;
        let mut effects = Vec::new();
        for event in events {
            let t = transition(&state, event);
            state = t.next;
            effects.extend(t.effects);
        }
        (state, effects)
    }

    #[test]
    fn test_password_path_skips_credential() {
        let (state, effects) = run(vec![
            SessionEvent::Start {
                requires_credential: false,
            },
            SessionEvent::TransportOpened,
            SessionEvent::HandshakeSent,
        ]);

        assert_eq!(state, SessionState::Streaming);
        assert_eq!(effects, vec![Effect::OpenTransport, Effect::SendHandshake]);
    }

    #[test]
    fn test_key_path_resolves_first() {
        let (state, effects) = run(vec![
            SessionEvent::Start {
                requires_credential: true,
            },
            SessionEvent::CredentialResolved,
            SessionEvent::TransportOpened,
            SessionEvent::HandshakeSent,
        ]);

        assert_eq!(state, SessionState::Streaming);
        assert_eq!(
            effects,
            vec![
                Effect::ResolveCredential,
                Effect::OpenTransport,
                Effect::SendHandshake
            ]
        );
    }

    #[test]
    fn test_credential_failure_is_terminal() {
        for failure in [
            SessionFailure::MissingCredential,
            SessionFailure::PassphraseRequired,
            SessionFailure::DecryptionFailed,
        ] {
            let (state, effects) = run(vec![
                SessionEvent::Start {
                    requires_credential: true,
                },
                SessionEvent::CredentialFailed(failure.clone()),
                SessionEvent::TransportOpened,
            ]);

            assert_eq!(state, SessionState::Errored(failure));
            // No transport was ever requested
            assert_eq!(effects, vec![Effect::ResolveCredential]);
        }
    }

    #[test]
    fn test_open_failure() {
        let (state, _) = run(vec![
            SessionEvent::Start {
                requires_credential: false,
            },
            SessionEvent::TransportOpenFailed("refused".into()),
        ]);

        assert_eq!(
            state,
            SessionState::Errored(SessionFailure::TransportOpenFailed("refused".into()))
        );
    }

    #[test]
    fn test_remote_close_vs_stream_error() {
        let streaming = vec![
            SessionEvent::Start {
                requires_credential: false,
            },
            SessionEvent::TransportOpened,
            SessionEvent::HandshakeSent,
        ];

        let mut closed = streaming.clone();
        closed.push(SessionEvent::TransportClosed);
        let (state, effects) = run(closed);
        assert_eq!(state, SessionState::Closed);
        assert_eq!(effects.last(), Some(&Effect::ReleaseTransport));

        let mut failed = streaming;
        failed.push(SessionEvent::TransportFailed("reset".into()));
        let (state, _) = run(failed);
        assert_eq!(
            state,
            SessionState::Errored(SessionFailure::TransportClosedUnexpectedly("reset".into()))
        );
    }

    #[test]
    fn test_disconnect_from_each_state() {
        let cases = [
            (SessionState::Idle, vec![]),
            (SessionState::AwaitingCredential, vec![Effect::AbandonPending]),
            (SessionState::Connecting, vec![Effect::AbandonPending]),
            (SessionState::Handshaking, vec![Effect::ReleaseTransport]),
            (SessionState::Streaming, vec![Effect::ReleaseTransport]),
        ];

        for (state, expected) in cases {
            let t = transition(&state, SessionEvent::Disconnect);
            assert_eq!(t.next, SessionState::Closed, "from {state}");
            assert_eq!(t.effects, expected, "from {state}");
        }
    }

    #[test]
    fn test_release_happens_once() {
        let (state, effects) = run(vec![
            SessionEvent::Start {
                requires_credential: false,
            },
            SessionEvent::TransportOpened,
            SessionEvent::HandshakeSent,
            SessionEvent::Disconnect,
            SessionEvent::Disconnect,
            SessionEvent::TransportClosed,
            SessionEvent::TransportFailed("late".into()),
        ]);

        assert_eq!(state, SessionState::Closed);
        let releases = effects
            .iter()
            .filter(|e| **e == Effect::ReleaseTransport)
            .count();
        assert_eq!(releases, 1);
    }

    #[test]
    fn test_invalid_pairs_are_ignored() {
        let t = transition(&SessionState::Idle, SessionEvent::HandshakeSent);
        assert_eq!(t.next, SessionState::Idle);
        assert!(t.effects.is_empty());

        let t = transition(&SessionState::Connecting, SessionEvent::TransportClosed);
        assert_eq!(t.next, SessionState::Connecting);
        assert!(!t.changed(&SessionState::Connecting));
    }

    #[test]
    fn test_failure_maps_from_error() {
        let failure = SessionFailure::from(&WicketError::DecryptionFailed);
        assert_eq!(failure, SessionFailure::DecryptionFailed);
        assert_eq!(failure.code(), "decryption_failed");

        let failure = SessionFailure::from(&WicketError::Http("x".into()));
        assert!(matches!(failure, SessionFailure::Internal(_)));
    }
}
