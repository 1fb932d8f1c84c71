//! Pre-defined artifact scenarios
//!
//! Each scenario builds a fresh in-memory network, runs a handful of
//! artifacts through their lifecycle and reports what happened.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use artifact_core::{IdentityError, Jid, MemoryNetwork, Message};
use artifact_node::{
    Artifact, ArtifactBehavior, ArtifactBuilder, ArtifactConfig, ArtifactError, ArtifactHandle,
    ArtifactResult,
};

/// Domain served by the simulated network
pub const DOMAIN: &str = "simulation.local";

/// How long an artifact waits for the next message before giving up
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Password used for every simulated account
const PASSWORD: &str = "simulation";

/// Errors raised by a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Scenario task failed: {0}")]
    Task(String),

    #[error("Unexpected outcome: {0}")]
    Unexpected(String),
}

/// Result type alias for scenarios
pub type ScenarioResult<T> = Result<T, ScenarioError>;

fn build<B: ArtifactBehavior>(
    network: &MemoryNetwork,
    local: &str,
    behavior: B,
) -> ScenarioResult<Artifact<B>> {
    let config = ArtifactConfig::new(Jid::new(local, DOMAIN)?, PASSWORD);
    Ok(ArtifactBuilder::new(config).network(network).build(behavior)?)
}

/// Run an artifact's main body on its own task
async fn run_detached<B: ArtifactBehavior>(
    mut artifact: Artifact<B>,
) -> ScenarioResult<(Artifact<B>, ArtifactResult<()>)> {
    tokio::spawn(async move {
        let result = artifact.run().await;
        (artifact, result)
    })
    .await
    .map_err(|e| ScenarioError::Task(e.to_string()))
}

// ---------------------------------------------------------------------------
// Echo
// ---------------------------------------------------------------------------

/// Replies to each message with the same body, `limit` times
pub struct Echo {
    limit: usize,
}

#[async_trait]
impl ArtifactBehavior for Echo {
    async fn run(&mut self, artifact: &ArtifactHandle) -> ArtifactResult<()> {
        for _ in 0..self.limit {
            let msg = artifact
                .receive(Some(REPLY_TIMEOUT))
                .await
                .ok_or_else(|| ArtifactError::Behavior("no message to echo".into()))?;

            let mut reply = msg.make_reply();
            reply.body = msg.body;
            artifact.send(&mut reply).await?;
        }
        Ok(())
    }
}

/// Outcome of [`run_echo_scenario`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoReport {
    pub sent: usize,
    pub replies: Vec<String>,
}

/// A client sends `count` messages to an echo artifact and collects replies
pub async fn run_echo_scenario(count: usize) -> ScenarioResult<EchoReport> {
    info!(count, "=== Running echo scenario ===");
    let network = MemoryNetwork::new(DOMAIN);

    let mut echo = build(&network, "echo", Echo { limit: count })?;
    let mut client = build(&network, "client", ())?;
    echo.start(true).await?;
    client.start(true).await?;

    let echo_jid = echo.handle().identity().clone();
    let echo_task = tokio::spawn(run_detached(echo));

    let mut replies = Vec::with_capacity(count);
    for i in 0..count {
        let mut msg = Message::text(echo_jid.clone(), format!("message {}", i));
        client.handle().send(&mut msg).await?;

        match client.handle().receive(Some(REPLY_TIMEOUT)).await {
            Some(reply) => replies.push(reply.body.unwrap_or_default()),
            None => warn!(index = i, "No echo received"),
        }
    }

    let (echo, result) = echo_task
        .await
        .map_err(|e| ScenarioError::Task(e.to_string()))??;
    result?;

    echo.stop().await?;
    client.stop().await?;

    info!(replies = replies.len(), "Echo scenario complete");
    Ok(EchoReport {
        sent: count,
        replies,
    })
}

// ---------------------------------------------------------------------------
// Ping-pong
// ---------------------------------------------------------------------------

/// Bounces a volley counter with a peer until it reaches `volleys`
pub struct Player {
    peer: Jid,
    volleys: u32,
    serve: bool,
}

impl Player {
    async fn hit(&self, artifact: &ArtifactHandle, volley: u32) -> ArtifactResult<()> {
        let word = if self.serve { "ping" } else { "pong" };
        let mut msg = Message::text(self.peer.clone(), word)
            .with_thread("rally")
            .with_metadata("volley", volley.to_string());
        artifact.send(&mut msg).await
    }
}

#[async_trait]
impl ArtifactBehavior for Player {
    async fn run(&mut self, artifact: &ArtifactHandle) -> ArtifactResult<()> {
        artifact.set("received", 0);

        if self.serve {
            self.hit(artifact, 1).await?;
            if self.volleys <= 1 {
                return Ok(());
            }
        }

        loop {
            let msg = artifact
                .receive(Some(REPLY_TIMEOUT))
                .await
                .ok_or_else(|| ArtifactError::Behavior("rally stalled".into()))?;
            let volley: u32 = msg
                .metadata("volley")
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| ArtifactError::Behavior("volley missing".into()))?;

            let received = artifact.get_as::<u32>("received").unwrap_or(0) + 1;
            artifact.set("received", received);

            if volley >= self.volleys {
                return Ok(());
            }
            self.hit(artifact, volley + 1).await?;
            if volley + 1 >= self.volleys {
                return Ok(());
            }
        }
    }
}

/// Outcome of [`run_ping_pong_scenario`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPongReport {
    pub volleys: u32,
    pub ping_received: u32,
    pub pong_received: u32,
}

/// Two artifacts rally `volleys` messages between them
pub async fn run_ping_pong_scenario(volleys: u32) -> ScenarioResult<PingPongReport> {
    info!(volleys, "=== Running ping-pong scenario ===");
    if volleys == 0 {
        return Err(ScenarioError::Unexpected("a rally needs at least one volley".into()));
    }

    let network = MemoryNetwork::new(DOMAIN);
    let ping_jid = Jid::new("ping", DOMAIN)?;
    let pong_jid = Jid::new("pong", DOMAIN)?;

    let mut ping = build(
        &network,
        "ping",
        Player {
            peer: pong_jid,
            volleys,
            serve: true,
        },
    )?;
    let mut pong = build(
        &network,
        "pong",
        Player {
            peer: ping_jid,
            volleys,
            serve: false,
        },
    )?;

    // The receiver must be online before the serve
    pong.start(true).await?;
    ping.start(true).await?;

    let pong_task = tokio::spawn(run_detached(pong));
    let (ping, ping_result) = run_detached(ping).await?;
    let (pong, pong_result) = pong_task
        .await
        .map_err(|e| ScenarioError::Task(e.to_string()))??;
    ping_result?;
    pong_result?;

    let report = PingPongReport {
        volleys,
        ping_received: ping.handle().get_as("received").unwrap_or(0),
        pong_received: pong.handle().get_as("received").unwrap_or(0),
    };

    ping.stop().await?;
    pong.stop().await?;

    info!(?report, "Ping-pong scenario complete");
    Ok(report)
}

// ---------------------------------------------------------------------------
// Authentication failure
// ---------------------------------------------------------------------------

/// Outcome of [`run_auth_failure_scenario`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailureReport {
    /// Error shown for the unregistered account
    pub error: String,
    /// Liveness right after the failed start
    pub alive_after_failure: bool,
    /// Liveness after retrying with auto-registration
    pub alive_after_register: bool,
}

/// Start an unregistered account, then retry with auto-registration
pub async fn run_auth_failure_scenario() -> ScenarioResult<AuthFailureReport> {
    info!("=== Running auth-failure scenario ===");
    let network = MemoryNetwork::new(DOMAIN);
    let mut ghost = build(&network, "ghost", ())?;

    let error = match ghost.start(false).await {
        Err(e) if e.is_authentication() => e.to_string(),
        Err(e) => return Err(e.into()),
        Ok(()) => {
            return Err(ScenarioError::Unexpected(
                "unregistered account authenticated".into(),
            ));
        }
    };
    let alive_after_failure = ghost.handle().is_alive();
    info!(error = %error, "Start without registration rejected");

    ghost.start(true).await?;
    let alive_after_register = ghost.handle().is_alive();
    ghost.stop().await?;

    Ok(AuthFailureReport {
        error,
        alive_after_failure,
        alive_after_register,
    })
}

// ---------------------------------------------------------------------------
// Offline delivery
// ---------------------------------------------------------------------------

/// Outcome of [`run_offline_scenario`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineReport {
    /// Stanzas held by the server while the recipient was away
    pub stored: usize,
    /// Bodies received after the recipient came back
    pub delivered: Vec<String>,
}

/// Messages sent to a stopped artifact arrive, in order, on its next login
pub async fn run_offline_scenario(count: usize) -> ScenarioResult<OfflineReport> {
    info!(count, "=== Running offline scenario ===");
    let network = MemoryNetwork::new(DOMAIN);

    let mut sender = build(&network, "sender", ())?;
    let mut first_visit = build(&network, "sleeper", ())?;
    sender.start(true).await?;
    first_visit.start(true).await?;
    let sleeper_jid = first_visit.handle().identity().clone();
    first_visit.stop().await?;

    for i in 0..count {
        let mut msg = Message::text(sleeper_jid.clone(), format!("while away {}", i));
        sender.handle().send(&mut msg).await?;
    }
    let stored = network.offline_count(&sleeper_jid);

    // Stopped is terminal, so the account comes back as a new instance
    let mut second_visit = build(&network, "sleeper", ())?;
    second_visit.start(false).await?;

    let mut delivered = Vec::with_capacity(count);
    while let Some(msg) = second_visit.handle().receive(Some(Duration::from_millis(200))).await {
        delivered.push(msg.body.unwrap_or_default());
    }

    second_visit.stop().await?;
    sender.stop().await?;

    info!(stored, delivered = delivered.len(), "Offline scenario complete");
    Ok(OfflineReport { stored, delivered })
}
