//! Shareable handle to a running artifact
//!
//! Everything user logic needs while the artifact is alive: identity,
//! liveness, send/receive, knowledge, task spawning and stop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use artifact_core::{Codec, Jid, Message, MessageFilter, Presence, Session};

use crate::connection::ConnectionManager;
use crate::dispatch::{DispatchSnapshot, DispatchStats};
use crate::error::{ArtifactError, ArtifactResult, SendError};
use crate::knowledge::KnowledgeStore;
use crate::lifecycle::LifecycleState;
use crate::mailbox::Mailbox;

/// State shared between an [`Artifact`](crate::Artifact) and its handles
pub(crate) struct Shared {
    pub(crate) identity: Jid,
    pub(crate) instance_id: Uuid,
    pub(crate) connection: ConnectionManager,
    pub(crate) mailbox: Arc<Mailbox>,
    pub(crate) knowledge: KnowledgeStore,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) presence: Option<Arc<dyn Presence>>,
    pub(crate) filter: MessageFilter,
    pub(crate) stats: Arc<DispatchStats>,
    pub(crate) state: watch::Sender<LifecycleState>,
    /// Serializes start and stop
    pub(crate) lifecycle: Mutex<()>,
    pub(crate) tasks: parking_lot::Mutex<JoinSet<()>>,
}

impl Shared {
    pub(crate) fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(identity = %self.identity, from = %previous, to = %next, "State transition");
        }
    }

    /// Move `from` to `to` only if still in `from`
    pub(crate) fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let moved = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved {
            debug!(identity = %self.identity, from = %from, to = %to, "State transition");
        }
        moved
    }

    /// Abort every task owned by the artifact and wait for them to finish
    pub(crate) async fn cancel_tasks(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        if tasks.is_empty() {
            return;
        }
        tasks.abort_all();
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    warn!(identity = %self.identity, error = %e, "Artifact task panicked");
                }
            }
        }
    }

    async fn stop(&self) -> ArtifactResult<()> {
        let _guard = self.lifecycle.lock().await;

        match self.state() {
            LifecycleState::Stopped => {
                self.connection.clear_alive();
                Ok(())
            }
            LifecycleState::Created => {
                self.set_state(LifecycleState::Stopped);
                info!(identity = %self.identity, "Artifact stopped before start");
                Ok(())
            }
            _ => self.shutdown().await,
        }
    }

    async fn shutdown(&self) -> ArtifactResult<()> {
        self.set_state(LifecycleState::Stopping);

        if let Some(presence) = &self.presence {
            if let Err(e) = presence.announce_unavailable().await {
                warn!(identity = %self.identity, error = %e, "Failed to announce unavailable");
            }
        }

        self.cancel_tasks().await;

        let result = self.connection.disconnect().await;
        // A session may still be held if liveness was never set
        self.connection.abandon().await;

        self.set_state(LifecycleState::Stopped);
        info!(identity = %self.identity, "Artifact stopped");
        result
    }
}

/// Cloneable handle to an artifact
///
/// Passed to every [`ArtifactBehavior`](crate::ArtifactBehavior) hook and
/// safe to move into spawned tasks.
#[derive(Clone)]
pub struct ArtifactHandle {
    pub(crate) shared: Arc<Shared>,
}

impl ArtifactHandle {
    pub(crate) fn new(shared: Shared) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Bare network identity
    pub fn identity(&self) -> &Jid {
        &self.shared.identity
    }

    /// Local part of the identity
    pub fn name(&self) -> &str {
        self.shared.identity.local()
    }

    /// Unique id of this artifact instance
    pub fn instance_id(&self) -> Uuid {
        self.shared.instance_id
    }

    /// Whether the full connect sequence succeeded and stop has not completed
    pub fn is_alive(&self) -> bool {
        self.shared.connection.is_alive()
    }

    /// Subscribe to liveness changes
    pub fn alive_changes(&self) -> watch::Receiver<bool> {
        self.shared.connection.alive_changes()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    /// Subscribe to lifecycle transitions
    pub fn state_changes(&self) -> watch::Receiver<LifecycleState> {
        self.shared.state.subscribe()
    }

    /// The live session, for collaborators layered on top of the artifact
    pub fn session(&self) -> Option<Arc<dyn Session>> {
        self.shared.connection.session()
    }

    /// Send a message over the live session
    ///
    /// The message is updated in place: `sender` defaults to this artifact's
    /// identity and `sent` is set once the session accepts the stanza. On
    /// failure `sent` stays false.
    pub async fn send(&self, message: &mut Message) -> ArtifactResult<()> {
        if message.sender.is_none() {
            message.sender = Some(self.shared.identity.clone());
        }

        let session = self.session().ok_or(SendError::NotConnected)?;
        let stanza = self.shared.codec.encode(message).map_err(SendError::from)?;
        session.send(stanza).await.map_err(SendError::from)?;

        message.sent = true;
        debug!(identity = %self.shared.identity, to = ?message.to, "Message sent");
        Ok(())
    }

    /// Take the next message from the mailbox
    ///
    /// `None` does not wait; `Some(timeout)` waits up to `timeout`.
    pub async fn receive(&self, timeout: Option<Duration>) -> Option<Message> {
        self.shared.mailbox.receive(timeout).await
    }

    /// Number of messages waiting in the mailbox
    pub fn mailbox_size(&self) -> usize {
        self.shared.mailbox.size()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.shared.knowledge.get(name)
    }

    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.shared.knowledge.get_as(name)
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.shared.knowledge.set(name, value)
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.shared.knowledge.remove(name)
    }

    /// Counters from the dispatch bridge
    pub fn dispatch_stats(&self) -> DispatchSnapshot {
        self.shared.stats.snapshot()
    }

    /// Spawn a task owned by this artifact
    ///
    /// The task is cancelled by `stop()`. Fails once stopping has begun.
    pub fn spawn<F>(&self, task: F) -> ArtifactResult<AbortHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ArtifactError::Runtime(e.to_string()))?;

        let mut tasks = self.shared.tasks.lock();
        let state = self.shared.state();
        if state.is_shutting_down() {
            return Err(ArtifactError::InvalidState {
                operation: "spawn",
                state,
            });
        }
        Ok(tasks.spawn_on(task, &runtime))
    }

    /// Stop the artifact
    ///
    /// Idempotent. Safe to call from a task owned by the artifact: the
    /// teardown runs detached, so it completes even though the calling task
    /// is cancelled along the way. A stop requested while `start()` is still
    /// connecting makes that start fail with [`ArtifactError::Interrupted`]
    /// and returns immediately.
    pub async fn stop(&self) -> ArtifactResult<()> {
        if self
            .shared
            .transition(LifecycleState::Connecting, LifecycleState::Stopping)
        {
            info!(identity = %self.shared.identity, "Stop requested during start");
            return Ok(());
        }

        let shared = self.shared.clone();
        tokio::spawn(async move { shared.stop().await })
            .await
            .map_err(|e| ArtifactError::Runtime(e.to_string()))?
    }
}

impl std::fmt::Debug for ArtifactHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactHandle")
            .field("identity", &self.shared.identity)
            .field("instance_id", &self.shared.instance_id)
            .field("state", &self.shared.state())
            .finish()
    }
}
