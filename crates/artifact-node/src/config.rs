//! Configuration for an artifact

use std::time::Duration;

use serde::{Deserialize, Serialize};

use artifact_core::{Credential, Jid, MessageFilter, SecurityPolicy};

/// Default connect timeout in milliseconds
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Default registration timeout in milliseconds
const DEFAULT_REGISTER_TIMEOUT_MS: u64 = 10_000;
/// Default graceful disconnect timeout in milliseconds
const DEFAULT_DISCONNECT_TIMEOUT_MS: u64 = 5_000;

/// Timeouts applied by the connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Bound on authenticating and opening a session
    pub connect_timeout_ms: u64,
    /// Bound on in-band registration
    pub register_timeout_ms: u64,
    /// Bound on graceful session close
    pub disconnect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            register_timeout_ms: DEFAULT_REGISTER_TIMEOUT_MS,
            disconnect_timeout_ms: DEFAULT_DISCONNECT_TIMEOUT_MS,
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn register_timeout(&self) -> Duration {
        Duration::from_millis(self.register_timeout_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }
}

/// Configuration for an [`Artifact`](crate::Artifact)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Network identity
    pub jid: Jid,
    /// Password for `jid`
    pub credential: Credential,
    /// Transport security
    #[serde(default)]
    pub security: SecurityPolicy,
    /// Connection timeouts
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Which inbound stanzas reach the mailbox
    #[serde(default)]
    pub filter: MessageFilter,
}

impl ArtifactConfig {
    /// Configuration with default security, timeouts and filter
    pub fn new(jid: Jid, credential: impl Into<Credential>) -> Self {
        Self {
            jid,
            credential: credential.into(),
            security: SecurityPolicy::default(),
            connection: ConnectionConfig::default(),
            filter: MessageFilter::default(),
        }
    }

    /// Set the security policy
    pub fn with_security(mut self, security: SecurityPolicy) -> Self {
        self.security = security;
        self
    }

    /// Skip transport verification (development servers only)
    pub fn insecure(self) -> Self {
        self.with_security(SecurityPolicy::insecure())
    }

    /// Set the connection timeouts
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connection.connect_timeout_ms =
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the inbound message filter
    pub fn with_filter(mut self, filter: MessageFilter) -> Self {
        self.filter = filter;
        self
    }
}
