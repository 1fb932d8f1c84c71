//! # Artifact Node
//!
//! Lifecycle, mailbox and dispatch for networked artifacts.
//!
//! An [`Artifact`] is a long-lived, addressable entity on a federated
//! messaging network. This crate ties together:
//! - [`ConnectionManager`]: registration, session, liveness
//! - [`DispatchBridge`]: inbound stanzas to the [`Mailbox`]
//! - [`KnowledgeStore`]: per-artifact key/value state
//! - the lifecycle state machine driving user [`ArtifactBehavior`] hooks
//!
//! ## Example
//!
//! ```rust,ignore
//! use artifact_core::{Jid, MemoryNetwork};
//! use artifact_node::{ArtifactBuilder, ArtifactConfig};
//!
//! let network = MemoryNetwork::new("example.org");
//! let config = ArtifactConfig::new(Jid::parse("bot@example.org")?, "secret");
//! let mut artifact = ArtifactBuilder::new(config).network(&network).build(MyBehavior)?;
//!
//! artifact.start(true).await?;
//! artifact.run().await?;
//! artifact.stop().await?;
//! ```

mod behavior;
mod config;
mod connection;
mod dispatch;
mod error;
mod handle;
mod knowledge;
mod lifecycle;
mod mailbox;

pub use behavior::ArtifactBehavior;
pub use config::{ArtifactConfig, ConnectionConfig};
pub use connection::ConnectionManager;
pub use dispatch::{DispatchBridge, DispatchOutcome, DispatchSnapshot, DispatchStats};
pub use error::{ArtifactError, ArtifactResult, SendError};
pub use handle::ArtifactHandle;
pub use knowledge::KnowledgeStore;
pub use lifecycle::LifecycleState;
pub use mailbox::Mailbox;

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, instrument, warn};
use uuid::Uuid;

use artifact_core::{Codec, DirectoryService, MemoryNetwork, PostcardCodec, Presence, SessionConnector};

use handle::Shared;

/// Builder for an [`Artifact`]
pub struct ArtifactBuilder {
    config: ArtifactConfig,
    connector: Option<Arc<dyn SessionConnector>>,
    directory: Option<Arc<dyn DirectoryService>>,
    codec: Arc<dyn Codec>,
    presence: Option<Arc<dyn Presence>>,
}

impl ArtifactBuilder {
    pub fn new(config: ArtifactConfig) -> Self {
        Self {
            config,
            connector: None,
            directory: None,
            codec: Arc::new(PostcardCodec::new()),
            presence: None,
        }
    }

    /// Set the session connector (required)
    pub fn connector(mut self, connector: Arc<dyn SessionConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Set the directory service used by auto-registration
    pub fn directory(mut self, directory: Arc<dyn DirectoryService>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Replace the default postcard codec
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Attach a presence collaborator
    pub fn presence(mut self, presence: Arc<dyn Presence>) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Use an in-memory network for connector, directory and presence
    pub fn network(self, network: &MemoryNetwork) -> Self {
        let presence = network.presence_for(&self.config.jid);
        self.connector(Arc::new(network.clone()))
            .directory(Arc::new(network.clone()))
            .presence(presence)
    }

    /// Build the artifact around `behavior`
    pub fn build<B: ArtifactBehavior>(self, behavior: B) -> ArtifactResult<Artifact<B>> {
        let connector = self
            .connector
            .ok_or_else(|| ArtifactError::Config("no session connector attached".into()))?;

        let ArtifactConfig {
            jid,
            credential,
            security,
            connection,
            filter,
        } = self.config;

        let connection = ConnectionManager::new(
            jid.clone(),
            credential,
            security,
            connection,
            connector,
            self.directory,
        );
        let (state, _) = watch::channel(LifecycleState::Created);

        let shared = Shared {
            identity: jid,
            instance_id: Uuid::new_v4(),
            connection,
            mailbox: Arc::new(Mailbox::new()),
            knowledge: KnowledgeStore::new(),
            codec: self.codec,
            presence: self.presence,
            filter,
            stats: Arc::new(DispatchStats::default()),
            state,
            lifecycle: Mutex::new(()),
            tasks: parking_lot::Mutex::new(JoinSet::new()),
        };

        Ok(Artifact {
            handle: ArtifactHandle::new(shared),
            behavior,
        })
    }
}

/// A networked artifact driving a user [`ArtifactBehavior`]
///
/// `Created → Connecting → Running → Stopping → Stopped`. See
/// [`start`](Self::start), [`run`](Self::run) and [`stop`](Self::stop).
pub struct Artifact<B: ArtifactBehavior> {
    handle: ArtifactHandle,
    behavior: B,
}

impl<B: ArtifactBehavior> Artifact<B> {
    /// Handle for sending, receiving, knowledge and stop
    pub fn handle(&self) -> &ArtifactHandle {
        &self.handle
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    /// Connect and bring the artifact to `Running`
    ///
    /// Runs `before_connect`, optionally registers the account, opens the
    /// session, wires the mailbox, then runs `after_connect` and `setup`.
    /// Liveness is set only when all of that succeeds.
    ///
    /// # Errors
    ///
    /// On any failure the session is closed, owned tasks are cancelled and
    /// the artifact returns to `Created`, so a fresh start may be attempted.
    /// A rejected credential is [`ArtifactError::Authentication`].
    #[instrument(skip(self), fields(jid = %self.handle.identity()))]
    pub async fn start(&mut self, auto_register: bool) -> ArtifactResult<()> {
        let shared = self.handle.shared.clone();
        let _guard = shared.lifecycle.lock().await;

        let state = shared.state();
        if state != LifecycleState::Created {
            return Err(ArtifactError::InvalidState {
                operation: "start",
                state,
            });
        }
        shared.set_state(LifecycleState::Connecting);

        let result = match self.connect_sequence(auto_register).await {
            Ok(()) => {
                shared.connection.mark_alive();
                if shared.transition(LifecycleState::Connecting, LifecycleState::Running) {
                    info!("Artifact running");
                    return Ok(());
                }
                Err(ArtifactError::Interrupted)
            }
            Err(e) => Err(e),
        };

        let interrupted = shared.state() == LifecycleState::Stopping;
        if let (Some(presence), Some(_)) = (&shared.presence, shared.connection.session()) {
            if let Err(e) = presence.announce_unavailable().await {
                warn!(error = %e, "Failed to announce unavailable");
            }
        }
        shared.cancel_tasks().await;
        shared.connection.abandon().await;

        if interrupted {
            shared.set_state(LifecycleState::Stopped);
            info!("Start interrupted, artifact stopped");
            Err(ArtifactError::Interrupted)
        } else {
            shared.set_state(LifecycleState::Created);
            if let Err(e) = &result {
                warn!(error = %e, "Start failed");
            }
            result
        }
    }

    async fn connect_sequence(&mut self, auto_register: bool) -> ArtifactResult<()> {
        let handle = self.handle.clone();
        let shared = &handle.shared;

        self.behavior.before_connect(&handle).await?;
        check_interrupted(shared)?;

        if auto_register {
            shared.connection.register().await?;
            check_interrupted(shared)?;
        }

        let session = shared.connection.connect().await?;
        check_interrupted(shared)?;

        if let Some(presence) = &shared.presence {
            if let Err(e) = presence.announce_available().await {
                warn!(error = %e, "Failed to announce available");
            }
        }

        let bridge = DispatchBridge::new(
            shared.identity.clone(),
            shared.filter.clone(),
            shared.codec.clone(),
            shared.mailbox.clone(),
            shared.stats.clone(),
        );
        let span = info_span!("dispatch", jid = %shared.identity);
        shared.tasks.lock().spawn(bridge.run(session).instrument(span));

        self.behavior.after_connect(&handle).await?;
        check_interrupted(shared)?;

        self.behavior.setup(&handle).await?;
        check_interrupted(shared)
    }

    /// Run the behavior's main body
    ///
    /// Only valid while `Running`. The connection stays up when it returns.
    #[instrument(skip(self), fields(jid = %self.handle.identity()))]
    pub async fn run(&mut self) -> ArtifactResult<()> {
        let state = self.handle.state();
        if state != LifecycleState::Running {
            return Err(ArtifactError::InvalidState {
                operation: "run",
                state,
            });
        }

        let handle = self.handle.clone();
        let result = self.behavior.run(&handle).await;
        if let Err(e) = &result {
            error!(error = %e, "Artifact run failed");
        }
        result
    }

    /// Stop the artifact; see [`ArtifactHandle::stop`]
    #[instrument(skip(self), fields(jid = %self.handle.identity()))]
    pub async fn stop(&self) -> ArtifactResult<()> {
        self.handle.stop().await
    }

    /// Start, run and stop on a dedicated single-threaded runtime
    ///
    /// Blocks the calling thread. Must not be called from within an async
    /// context.
    pub fn launch(mut self, auto_register: bool) -> ArtifactResult<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ArtifactError::Runtime(e.to_string()))?;

        runtime.block_on(async move {
            self.start(auto_register).await?;
            let result = self.run().await;
            let stopped = self.stop().await;
            result.and(stopped)
        })
    }
}

fn check_interrupted(shared: &Shared) -> ArtifactResult<()> {
    if shared.state() == LifecycleState::Stopping {
        return Err(ArtifactError::Interrupted);
    }
    Ok(())
}
