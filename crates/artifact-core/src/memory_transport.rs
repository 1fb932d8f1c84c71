//! In-memory messaging network for testing
//!
//! Implements every collaborator contract (directory, connector, session,
//! presence) against a single in-process server, so artifact lifecycles can
//! be exercised without a real federated deployment.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use artifact_core::{Credential, Jid, MemoryNetwork, SecurityPolicy, SessionConnector};
//!
//! let network = MemoryNetwork::new("example.org");
//! let alice = Jid::parse("alice@example.org")?;
//! network.register_account(&alice, Credential::new("secret"));
//!
//! let session = network
//!     .connect(&alice, &Credential::new("secret"), &SecurityPolicy::default())
//!     .await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::error::{ConnectError, RegistrationError, TransportError};
use crate::identity::Jid;
use crate::message::Stanza;
use crate::transport::{Credential, DirectoryService, Presence, SecurityPolicy, Session, SessionConnector};

/// Availability of an identity as seen by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    /// Online
    Available,
    /// Offline or gone away
    Unavailable,
}

/// Server behaviour knobs
#[derive(Debug, Clone)]
pub struct MemoryNetworkConfig {
    /// The single domain this server is authoritative for
    pub domain: String,
    /// Whether in-band registration is permitted
    pub open_registration: bool,
    /// Whether the server certificate chains to a trusted root.
    ///
    /// When `false`, clients that verify transport security are refused.
    pub trusted_certificate: bool,
    /// Artificial delay before a connect attempt is answered
    pub connect_delay: Duration,
}

impl MemoryNetworkConfig {
    /// Default settings for `domain`
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into().to_ascii_lowercase(),
            open_registration: true,
            trusted_certificate: true,
            connect_delay: Duration::ZERO,
        }
    }
}

struct SessionSlot {
    id: u64,
    tx: mpsc::UnboundedSender<Stanza>,
}

struct NetworkInner {
    config: MemoryNetworkConfig,
    accounts: DashMap<Jid, Credential>,
    sessions: DashMap<Jid, SessionSlot>,
    offline: DashMap<Jid, Vec<Stanza>>,
    presence: DashMap<Jid, PresenceState>,
    next_session_id: AtomicU64,
}

impl NetworkInner {
    fn check_domain(&self, identity: &Jid) -> bool {
        identity.domain() == self.config.domain
    }

    /// Deliver to a live session, fall back to offline storage
    fn route(&self, stanza: Stanza) -> Result<(), TransportError> {
        let to = stanza.to.clone();

        if !self.check_domain(&to) {
            return Err(TransportError::SendFailed(format!(
                "no route to domain {}",
                to.domain()
            )));
        }
        if !self.accounts.contains_key(&to) {
            return Err(TransportError::SendFailed(format!("recipient {} not found", to)));
        }

        // The offline entry is held while checking for a session, so routing
        // and a concurrent login see one consistent order
        let pending = self.offline.entry(to.clone());

        let stanza = match self.sessions.get(&to) {
            Some(slot) => match slot.tx.send(stanza) {
                Ok(()) => {
                    debug!(recipient = %to, "Delivered stanza");
                    return Ok(());
                }
                Err(mpsc::error::SendError(stanza)) => stanza,
            },
            None => stanza,
        };

        debug!(recipient = %to, "Recipient offline, storing stanza");
        pending.or_default().push(stanza);
        Ok(())
    }

    fn release(&self, identity: &Jid, session_id: u64) {
        if self
            .sessions
            .remove_if(identity, |_, slot| slot.id == session_id)
            .is_some()
        {
            debug!(identity = %identity, session_id, "Session released");
        }
    }
}

/// A single-domain in-process messaging server
///
/// Cloning yields another handle to the same server.
#[derive(Clone)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl MemoryNetwork {
    /// Create a server for `domain` with default settings
    pub fn new(domain: impl Into<String>) -> Self {
        Self::with_config(MemoryNetworkConfig::new(domain))
    }

    /// Create a server with explicit settings
    pub fn with_config(config: MemoryNetworkConfig) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                config,
                accounts: DashMap::new(),
                sessions: DashMap::new(),
                offline: DashMap::new(),
                presence: DashMap::new(),
                next_session_id: AtomicU64::new(1),
            }),
        }
    }

    /// The server's domain
    pub fn domain(&self) -> &str {
        &self.inner.config.domain
    }

    /// Provision an account out of band
    pub fn register_account(&self, identity: &Jid, credential: Credential) {
        self.inner.accounts.insert(identity.clone(), credential);
    }

    /// Whether an account exists
    pub fn is_registered(&self, identity: &Jid) -> bool {
        self.inner.accounts.contains_key(identity)
    }

    /// Whether a session is currently bound to `identity`
    pub fn is_online(&self, identity: &Jid) -> bool {
        self.inner.sessions.contains_key(identity)
    }

    /// Number of stanzas stored for an offline account
    pub fn offline_count(&self, identity: &Jid) -> usize {
        self.inner.offline.get(identity).map(|q| q.len()).unwrap_or(0)
    }

    /// Last announced presence of `identity`
    pub fn presence_of(&self, identity: &Jid) -> Option<PresenceState> {
        self.inner.presence.get(identity).map(|p| *p)
    }

    /// Presence collaborator bound to `identity`
    pub fn presence_for(&self, identity: &Jid) -> Arc<dyn Presence> {
        Arc::new(MemoryPresence {
            identity: identity.clone(),
            network: self.inner.clone(),
        })
    }

    /// Route a raw stanza as if it came from another server
    ///
    /// Unlike [`Session::send`], the `from` field is kept as given.
    pub fn inject(&self, stanza: Stanza) -> Result<(), TransportError> {
        self.inner.route(stanza)
    }

    fn check_certificate(&self, policy: &SecurityPolicy) -> bool {
        self.inner.config.trusted_certificate || !policy.verify_transport
    }
}

#[async_trait]
impl DirectoryService for MemoryNetwork {
    async fn register(
        &self,
        identity: &Jid,
        credential: &Credential,
        policy: &SecurityPolicy,
    ) -> Result<(), RegistrationError> {
        if !self.inner.check_domain(identity) {
            return Err(RegistrationError::Unreachable(identity.domain().to_string()));
        }
        if !self.check_certificate(policy) {
            return Err(RegistrationError::Certificate("self-signed certificate".into()));
        }
        if !self.inner.config.open_registration {
            return Err(RegistrationError::NotAllowed(self.domain().to_string()));
        }

        match self.inner.accounts.entry(identity.clone()) {
            Entry::Occupied(existing) if existing.get() == credential => {
                debug!(identity = %identity, "Account already registered");
                Ok(())
            }
            Entry::Occupied(_) => Err(RegistrationError::Conflict(identity.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(credential.clone());
                info!(identity = %identity, "Account registered");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl SessionConnector for MemoryNetwork {
    async fn connect(
        &self,
        identity: &Jid,
        credential: &Credential,
        policy: &SecurityPolicy,
    ) -> Result<Arc<dyn Session>, ConnectError> {
        if !self.inner.config.connect_delay.is_zero() {
            tokio::time::sleep(self.inner.config.connect_delay).await;
        }

        if !self.inner.check_domain(identity) {
            return Err(ConnectError::Unreachable(identity.domain().to_string()));
        }
        if !self.check_certificate(policy) {
            return Err(ConnectError::Certificate("self-signed certificate".into()));
        }

        let authorized = self
            .inner
            .accounts
            .get(identity)
            .map(|stored| stored.value() == credential)
            .unwrap_or(false);
        if !authorized {
            warn!(identity = %identity, "Authentication rejected");
            return Err(ConnectError::Authentication("not-authorized".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_session_id.fetch_add(1, Ordering::SeqCst);

        // Stored stanzas go first, and the slot is bound before the offline
        // entry is released, so nothing routed meanwhile is left behind
        let mut pending = self.inner.offline.entry(identity.clone()).or_default();
        for stanza in pending.drain(..) {
            let _ = tx.send(stanza);
        }
        self.inner
            .sessions
            .insert(identity.clone(), SessionSlot { id, tx });
        drop(pending);
        self.inner.offline.remove_if(identity, |_, queue| queue.is_empty());

        info!(identity = %identity, session_id = id, "Session bound");

        Ok(Arc::new(MemorySession {
            id,
            identity: identity.clone(),
            network: self.inner.clone(),
            inbox: Mutex::new(rx),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Session on a [`MemoryNetwork`]
pub struct MemorySession {
    id: u64,
    identity: Jid,
    network: Arc<NetworkInner>,
    inbox: Mutex<mpsc::UnboundedReceiver<Stanza>>,
    closed: AtomicBool,
}

#[async_trait]
impl Session for MemorySession {
    fn identity(&self) -> &Jid {
        &self.identity
    }

    async fn send(&self, mut stanza: Stanza) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::SessionClosed);
        }
        // The server stamps the authenticated sender
        stanza.from = Some(self.identity.clone());
        self.network.route(stanza)
    }

    async fn recv(&self) -> Option<Stanza> {
        let mut inbox = self.inbox.lock().await;
        inbox.recv().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.network.release(&self.identity, self.id);
        info!(identity = %self.identity, session_id = self.id, "Session closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.network.release(&self.identity, self.id);
    }
}

struct MemoryPresence {
    identity: Jid,
    network: Arc<NetworkInner>,
}

#[async_trait]
impl Presence for MemoryPresence {
    async fn announce_available(&self) -> Result<(), TransportError> {
        self.network
            .presence
            .insert(self.identity.clone(), PresenceState::Available);
        Ok(())
    }

    async fn announce_unavailable(&self) -> Result<(), TransportError> {
        self.network
            .presence
            .insert(self.identity.clone(), PresenceState::Unavailable);
        Ok(())
    }
}
