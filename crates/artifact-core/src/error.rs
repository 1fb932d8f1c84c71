//! Error types for artifact collaborators

use thiserror::Error;

/// Top-level error type for artifact-core
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),
}

/// Errors related to network identities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),
}

/// Errors raised while turning stanzas into messages and back
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unsupported stanza kind: {0}")]
    UnsupportedKind(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Encoding failed: {0}")]
    Encode(String),
}

impl From<postcard::Error> for CodecError {
    fn from(e: postcard::Error) -> Self {
        CodecError::MalformedPayload(e.to_string())
    }
}

/// Errors on a live session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Session closed")]
    SessionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Close failed: {0}")]
    CloseFailed(String),

    #[error("Presence update failed: {0}")]
    PresenceFailed(String),
}

/// Errors raised while establishing a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The server rejected the credential (or the account does not exist)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Certificate verification failed: {0}")]
    Certificate(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ConnectError {
    /// Whether this failure came from the credential check
    pub fn is_authentication(&self) -> bool {
        matches!(self, ConnectError::Authentication(_))
    }
}

/// Errors raised by the directory service while registering an account
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Account already registered with a different credential: {0}")]
    Conflict(String),

    #[error("Registration not allowed: {0}")]
    NotAllowed(String),

    #[error("Directory unreachable: {0}")]
    Unreachable(String),

    #[error("Certificate verification failed: {0}")]
    Certificate(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

/// Result type alias for artifact-core operations
pub type CoreResult<T> = Result<T, CoreError>;
