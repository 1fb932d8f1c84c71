//! Connection manager
//!
//! Owns the session and the liveness flag. Liveness is only ever set by the
//! lifecycle after the whole connect sequence succeeds, and is cleared on
//! every disconnect path.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use artifact_core::{
    ConnectError, Credential, DirectoryService, Jid, RegistrationError, SecurityPolicy, Session,
    SessionConnector, TransportError,
};

use crate::config::ConnectionConfig;
use crate::error::{ArtifactError, ArtifactResult};

/// Establishes, exposes and tears down an artifact's session
pub struct ConnectionManager {
    identity: Jid,
    credential: Credential,
    policy: SecurityPolicy,
    config: ConnectionConfig,
    connector: Arc<dyn SessionConnector>,
    directory: Option<Arc<dyn DirectoryService>>,
    session: RwLock<Option<Arc<dyn Session>>>,
    alive: watch::Sender<bool>,
}

impl ConnectionManager {
    pub fn new(
        identity: Jid,
        credential: Credential,
        policy: SecurityPolicy,
        config: ConnectionConfig,
        connector: Arc<dyn SessionConnector>,
        directory: Option<Arc<dyn DirectoryService>>,
    ) -> Self {
        let (alive, _) = watch::channel(false);
        Self {
            identity,
            credential,
            policy,
            config,
            connector,
            directory,
            session: RwLock::new(None),
            alive,
        }
    }

    pub fn identity(&self) -> &Jid {
        &self.identity
    }

    /// Register the account through the directory service
    pub async fn register(&self) -> ArtifactResult<()> {
        let directory = self
            .directory
            .as_ref()
            .ok_or_else(|| ArtifactError::Config("no directory service attached".into()))?;

        let timeout = self.config.register_timeout();
        let result = tokio::time::timeout(
            timeout,
            directory.register(&self.identity, &self.credential, &self.policy),
        )
        .await
        .unwrap_or(Err(RegistrationError::Timeout(self.config.register_timeout_ms)));

        match result {
            Ok(()) => {
                info!(identity = %self.identity, "Registered");
                Ok(())
            }
            Err(source) => Err(ArtifactError::Registration {
                identity: self.identity.clone(),
                source,
            }),
        }
    }

    /// Authenticate and open a session
    ///
    /// Does not set liveness.
    pub async fn connect(&self) -> ArtifactResult<Arc<dyn Session>> {
        if let Some(existing) = self.session() {
            return Ok(existing);
        }

        let timeout = self.config.connect_timeout();
        let session = tokio::time::timeout(
            timeout,
            self.connector
                .connect(&self.identity, &self.credential, &self.policy),
        )
        .await
        .unwrap_or(Err(ConnectError::Timeout(self.config.connect_timeout_ms)))
        .map_err(|e| ArtifactError::from_connect(&self.identity, e))?;

        if !self.policy.verify_transport {
            warn!(identity = %self.identity, "Transport verification disabled");
        }
        info!(identity = %self.identity, "Connected");

        *self.session.write() = Some(session.clone());
        Ok(session)
    }

    /// The current session, if any
    pub fn session(&self) -> Option<Arc<dyn Session>> {
        self.session.read().clone()
    }

    pub fn mark_alive(&self) {
        self.alive.send_replace(true);
    }

    pub fn clear_alive(&self) {
        self.alive.send_if_modified(|alive| std::mem::replace(alive, false));
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    /// Subscribe to liveness changes
    pub fn alive_changes(&self) -> watch::Receiver<bool> {
        self.alive.subscribe()
    }

    /// Gracefully close the session
    ///
    /// No-op when not alive. Liveness is cleared on every path, including
    /// close failure and timeout.
    pub async fn disconnect(&self) -> ArtifactResult<()> {
        if !self.is_alive() {
            debug!(identity = %self.identity, "Disconnect skipped, not alive");
            return Ok(());
        }

        let session = self.session.write().take();
        let result = match session {
            Some(session) => self.close(session).await,
            None => Ok(()),
        };

        self.clear_alive();
        if result.is_ok() {
            info!(identity = %self.identity, "Disconnected");
        }
        result
    }

    /// Close any held session regardless of liveness
    pub async fn abandon(&self) {
        let session = self.session.write().take();
        if let Some(session) = session {
            if let Err(e) = self.close(session).await {
                warn!(identity = %self.identity, error = %e, "Failed to close abandoned session");
            }
        }
        self.clear_alive();
    }

    async fn close(&self, session: Arc<dyn Session>) -> ArtifactResult<()> {
        let timeout = self.config.disconnect_timeout();
        match tokio::time::timeout(timeout, session.close()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(identity = %self.identity, error = %e, "Session close failed");
                Err(ArtifactError::Disconnect(e))
            }
            Err(_) => {
                warn!(
                    identity = %self.identity,
                    timeout_ms = self.config.disconnect_timeout_ms,
                    "Session close timed out"
                );
                Err(ArtifactError::Disconnect(TransportError::CloseFailed(format!(
                    "timed out after {} ms",
                    self.config.disconnect_timeout_ms
                ))))
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let Some(session) = self.session.get_mut().take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let identity = self.identity.clone();
            handle.spawn(async move {
                if let Err(e) = session.close().await {
                    warn!(identity = %identity, error = %e, "Failed to close session on drop");
                }
            });
        }
    }
}
