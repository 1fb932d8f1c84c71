//! User-provided artifact logic

use async_trait::async_trait;

use crate::error::{ArtifactError, ArtifactResult};
use crate::handle::ArtifactHandle;

/// Hooks run by the artifact lifecycle
///
/// `before_connect`, `after_connect` and `setup` run inside `start()`; an
/// error from any of them aborts the start. `run` is the main body, invoked by
/// [`Artifact::run`](crate::Artifact::run).
#[async_trait]
pub trait ArtifactBehavior: Send + 'static {
    /// Runs before registration and connect
    async fn before_connect(&mut self, _artifact: &ArtifactHandle) -> ArtifactResult<()> {
        Ok(())
    }

    /// Runs once the session is up and the mailbox is wired
    async fn after_connect(&mut self, _artifact: &ArtifactHandle) -> ArtifactResult<()> {
        Ok(())
    }

    /// Last step of `start()`; sending is already possible here
    async fn setup(&mut self, _artifact: &ArtifactHandle) -> ArtifactResult<()> {
        tokio::task::yield_now().await;
        Ok(())
    }

    /// Main body
    ///
    /// Must be provided: the default fails with
    /// [`ArtifactError::NotImplemented`].
    async fn run(&mut self, _artifact: &ArtifactHandle) -> ArtifactResult<()> {
        Err(ArtifactError::NotImplemented { hook: "run" })
    }
}

/// Behavior with every hook left at its default
impl ArtifactBehavior for () {}
