//! Collaborator contracts for the messaging network
//!
//! The artifact core never speaks the federated protocol itself. It talks to
//! the network through these traits:
//!
//! - [`DirectoryService`]: in-band account registration
//! - [`SessionConnector`]: authenticates and opens a [`Session`]
//! - [`Session`]: a live, authenticated stream for sending and receiving stanzas
//! - [`Presence`]: availability announcements
//!
//! ## Implementations
//!
//! - [`MemoryNetwork`](crate::memory_transport::MemoryNetwork): in-process network for tests and simulations

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConnectError, RegistrationError, TransportError};
use crate::identity::Jid;
use crate::message::Stanza;

/// Secret used to authenticate an identity
///
/// The value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a password
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret to a collaborator
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Transport security settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Verify the server certificate and identity.
    ///
    /// `false` is an insecure mode for development servers with
    /// self-signed certificates.
    pub verify_transport: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            verify_transport: true,
        }
    }
}

impl SecurityPolicy {
    /// Skip certificate verification
    pub fn insecure() -> Self {
        Self {
            verify_transport: false,
        }
    }
}

/// In-band registration of accounts
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Register `identity` with `credential`
    ///
    /// Runs over its own short-lived stream, never over a session.
    /// Registering an existing account with the same credential succeeds.
    async fn register(
        &self,
        identity: &Jid,
        credential: &Credential,
        policy: &SecurityPolicy,
    ) -> Result<(), RegistrationError>;
}

/// Opens authenticated sessions
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Authenticate and open a session for `identity`
    ///
    /// # Errors
    ///
    /// [`ConnectError::Authentication`] when the credential is rejected,
    /// other variants for transport-level failures.
    async fn connect(
        &self,
        identity: &Jid,
        credential: &Credential,
        policy: &SecurityPolicy,
    ) -> Result<Arc<dyn Session>, ConnectError>;
}

/// A live, authenticated connection to the network
#[async_trait]
pub trait Session: Send + Sync {
    /// The identity this session is bound to
    fn identity(&self) -> &Jid;

    /// Transmit a stanza
    async fn send(&self, stanza: Stanza) -> Result<(), TransportError>;

    /// Wait for the next inbound stanza
    ///
    /// Returns `None` once the session is closed and drained.
    async fn recv(&self) -> Option<Stanza>;

    /// Close the stream gracefully
    ///
    /// Closing twice is not an error.
    async fn close(&self) -> Result<(), TransportError>;

    /// Whether [`close`](Self::close) has completed
    fn is_closed(&self) -> bool;
}

/// Availability announcements for an identity
#[async_trait]
pub trait Presence: Send + Sync {
    /// Announce that the identity is online
    async fn announce_available(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Announce that the identity is going away
    async fn announce_unavailable(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("hunter2");
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("hunter2"));
        assert_eq!(credential.expose(), "hunter2");
    }

    #[test]
    fn test_security_policy_defaults_to_verify() {
        assert!(SecurityPolicy::default().verify_transport);
        assert!(!SecurityPolicy::insecure().verify_transport);
    }

    #[test]
    fn test_traits_are_object_safe() {
        fn assert_session(_: Option<Arc<dyn Session>>) {}
        fn assert_connector(_: Option<Arc<dyn SessionConnector>>) {}
        fn assert_directory(_: Option<Arc<dyn DirectoryService>>) {}
        fn assert_presence(_: Option<Arc<dyn Presence>>) {}

        assert_session(None);
        assert_connector(None);
        assert_directory(None);
        assert_presence(None);
    }
}
