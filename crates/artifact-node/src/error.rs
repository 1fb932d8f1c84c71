//! Error types for the artifact lifecycle

use thiserror::Error;

use artifact_core::{CodecError, ConnectError, Jid, RegistrationError, TransportError};

use crate::lifecycle::LifecycleState;

/// Errors that can occur while driving an artifact
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The server rejected the credential
    #[error(
        "Could not authenticate {identity}: {reason}. Check the credential, \
         or start with auto-registration enabled to create the account"
    )]
    Authentication { identity: Jid, reason: String },

    /// In-band registration failed
    #[error("Registration of {identity} failed: {source}")]
    Registration {
        identity: Jid,
        #[source]
        source: RegistrationError,
    },

    /// Transport-level connect failure
    #[error("Connection error: {0}")]
    Connection(ConnectError),

    /// A behavior hook that must be provided was not
    #[error("Hook `{hook}` is not implemented")]
    NotImplemented { hook: &'static str },

    /// Outbound message could not be sent
    #[error("Send error: {0}")]
    Send(#[from] SendError),

    /// Operation not valid in the current lifecycle state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    /// Error raised by user behavior
    #[error("Behavior error: {0}")]
    Behavior(String),

    /// Graceful close of the session failed
    #[error("Disconnect error: {0}")]
    Disconnect(TransportError),

    /// Runtime construction or task failure
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// `stop()` was requested while `start()` was still connecting
    #[error("Start interrupted by stop")]
    Interrupted,
}

impl ArtifactError {
    /// Wrap a connect failure, keeping authentication distinct
    pub fn from_connect(identity: &Jid, err: ConnectError) -> Self {
        match err {
            ConnectError::Authentication(reason) => ArtifactError::Authentication {
                identity: identity.clone(),
                reason,
            },
            other => ArtifactError::Connection(other),
        }
    }

    /// Whether the failure was a rejected credential
    pub fn is_authentication(&self) -> bool {
        matches!(self, ArtifactError::Authentication { .. })
    }
}

/// Errors from [`ArtifactHandle::send`](crate::ArtifactHandle::send)
#[derive(Debug, Error)]
pub enum SendError {
    /// No live session
    #[error("Not connected")]
    NotConnected,

    /// The message could not be encoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The session rejected the stanza
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type alias for artifact operations
pub type ArtifactResult<T> = Result<T, ArtifactError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn jid() -> Jid {
        Jid::parse("agent@x.org").unwrap()
    }

    #[test]
    fn test_authentication_is_distinct_from_connection() {
        let auth = ArtifactError::from_connect(&jid(), ConnectError::Authentication("not-authorized".into()));
        assert!(auth.is_authentication());
        let msg = auth.to_string();
        assert!(msg.contains("agent@x.org"));
        assert!(msg.contains("auto-registration"));

        let other = ArtifactError::from_connect(&jid(), ConnectError::Unreachable("x.org".into()));
        assert!(!other.is_authentication());
        assert!(matches!(other, ArtifactError::Connection(ConnectError::Unreachable(_))));
    }

    #[test]
    fn test_send_error_conversions() {
        let err: ArtifactError = SendError::from(TransportError::SessionClosed).into();
        assert!(matches!(err, ArtifactError::Send(SendError::Transport(_))));

        let err: ArtifactError = SendError::NotConnected.into();
        assert!(err.to_string().contains("Not connected"));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = ArtifactError::InvalidState {
            operation: "run",
            state: LifecycleState::Created,
        };
        assert_eq!(err.to_string(), "Cannot run while created");
    }
}
