//! Integration tests for the artifact lifecycle
//!
//! Every artifact runs against an in-memory network, covering connect,
//! dispatch, send/receive and teardown end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use artifact_core::{
    Jid, MemoryNetwork, MemoryNetworkConfig, Message, PresenceState, RegistrationError, Stanza,
    StanzaKind, TransportError,
};
use artifact_node::{
    Artifact, ArtifactBehavior, ArtifactBuilder, ArtifactConfig, ArtifactError, ArtifactHandle,
    ArtifactResult, LifecycleState, SendError,
};

const DOMAIN: &str = "x.org";
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

fn jid(local: &str) -> Jid {
    Jid::new(local, DOMAIN).unwrap()
}

fn artifact<B: ArtifactBehavior>(network: &MemoryNetwork, local: &str, behavior: B) -> Artifact<B> {
    artifact_logging::init_testing();
    let config = ArtifactConfig::new(jid(local), "secret");
    ArtifactBuilder::new(config).network(network).build(behavior).unwrap()
}

async fn running(network: &MemoryNetwork, local: &str) -> Artifact<()> {
    let mut artifact = artifact(network, local, ());
    artifact.start(true).await.unwrap();
    artifact
}

#[tokio::test]
async fn test_lifecycle_states() {
    let network = MemoryNetwork::new(DOMAIN);
    let mut agent = artifact(&network, "agent", ());
    let handle = agent.handle().clone();

    assert_eq!(handle.state(), LifecycleState::Created);
    assert!(!handle.is_alive());
    assert_eq!(handle.name(), "agent");

    assert_ok!(agent.start(true).await);
    assert_eq!(handle.state(), LifecycleState::Running);
    assert!(handle.is_alive());
    assert!(network.is_online(handle.identity()));

    assert_ok!(agent.stop().await);
    assert_eq!(handle.state(), LifecycleState::Stopped);
    assert!(!handle.is_alive());
    assert!(!network.is_online(handle.identity()));

    // Stopped is terminal
    let err = agent.start(true).await.unwrap_err();
    assert!(matches!(
        err,
        ArtifactError::InvalidState {
            operation: "start",
            state: LifecycleState::Stopped
        }
    ));
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let network = MemoryNetwork::new(DOMAIN);
    let mut agent = running(&network, "agent").await;

    let err = agent.start(true).await.unwrap_err();
    assert!(matches!(err, ArtifactError::InvalidState { state: LifecycleState::Running, .. }));
    assert!(agent.handle().is_alive());
}

#[tokio::test]
async fn test_messages_arrive_in_order() {
    let network = MemoryNetwork::new(DOMAIN);
    let alice = running(&network, "alice").await;
    let bob = running(&network, "bob").await;

    for body in ["hello", "world"] {
        let mut msg = Message::text(jid("bob"), body);
        alice.handle().send(&mut msg).await.unwrap();
    }

    let first = bob.handle().receive(Some(RECEIVE_TIMEOUT)).await.unwrap();
    let second = bob.handle().receive(Some(RECEIVE_TIMEOUT)).await.unwrap();
    assert_eq!(first.body.as_deref(), Some("hello"));
    assert_eq!(second.body.as_deref(), Some("world"));
    assert_eq!(first.sender, Some(jid("alice")));
    assert!(!first.sent);
    assert!(bob.handle().receive(None).await.is_none());
}

#[tokio::test]
async fn test_mailbox_size_accounting() {
    let network = MemoryNetwork::new(DOMAIN);
    let alice = running(&network, "alice").await;
    let bob = running(&network, "bob").await;

    for i in 0..3 {
        let mut msg = Message::text(jid("bob"), format!("m{}", i));
        alice.handle().send(&mut msg).await.unwrap();
    }

    // Wait for the bridge to drain the session
    let deadline = Instant::now() + RECEIVE_TIMEOUT;
    while bob.handle().mailbox_size() < 3 && Instant::now() < deadline {
        tokio::task::yield_now().await;
    }
    assert_eq!(bob.handle().mailbox_size(), 3);

    bob.handle().receive(None).await.unwrap();
    assert_eq!(bob.handle().mailbox_size(), 2);
    assert_eq!(bob.handle().dispatch_stats().delivered, 3);
}

#[tokio::test]
async fn test_receive_empty_returns_immediately() {
    let network = MemoryNetwork::new(DOMAIN);
    let agent = running(&network, "agent").await;

    assert!(agent.handle().receive(None).await.is_none());
    assert_eq!(agent.handle().mailbox_size(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_receive_timeout_bounds() {
    let network = MemoryNetwork::new(DOMAIN);
    let agent = running(&network, "agent").await;

    let start = Instant::now();
    let received = agent.handle().receive(Some(Duration::from_millis(200))).await;

    assert!(received.is_none());
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(start.elapsed() < Duration::from_millis(300));
}

#[tokio::test]
async fn test_send_defaults_sender_and_marks_sent() {
    let network = MemoryNetwork::new(DOMAIN);
    let alice = running(&network, "alice").await;
    network.register_account(&jid("bob"), "pw".into());

    let mut msg = Message::text(jid("bob"), "hi");
    assert!(!msg.sent);

    alice.handle().send(&mut msg).await.unwrap();
    assert!(msg.sent);
    assert_eq!(msg.sender, Some(jid("alice")));
    // Bob is offline, so the server keeps it
    assert_eq!(network.offline_count(&jid("bob")), 1);
}

#[tokio::test]
async fn test_send_failure_leaves_sent_false() {
    let network = MemoryNetwork::new(DOMAIN);
    let mut alice = artifact(&network, "alice", ());

    let mut msg = Message::text(jid("bob"), "too early");
    let err = alice.handle().send(&mut msg).await.unwrap_err();
    assert!(matches!(err, ArtifactError::Send(SendError::NotConnected)));
    assert!(!msg.sent);

    alice.start(true).await.unwrap();

    let mut msg = Message::text(jid("nobody"), "lost");
    let err = alice.handle().send(&mut msg).await.unwrap_err();
    assert!(matches!(
        err,
        ArtifactError::Send(SendError::Transport(TransportError::SendFailed(_)))
    ));
    assert!(!msg.sent);
}

#[tokio::test]
async fn test_authentication_failure() {
    let network = MemoryNetwork::new(DOMAIN);
    let mut agent = artifact(&network, "ghost", ());

    let err = agent.start(false).await.unwrap_err();
    assert!(err.is_authentication());
    assert!(err.to_string().contains("auto-registration"));
    assert!(!agent.handle().is_alive());
    assert!(agent.handle().session().is_none());
    assert_eq!(agent.handle().state(), LifecycleState::Created);

    // A fresh start with registration succeeds
    assert_ok!(agent.start(true).await);
    assert!(agent.handle().is_alive());
}

#[tokio::test]
async fn test_registration_conflict() {
    let network = MemoryNetwork::new(DOMAIN);
    network.register_account(&jid("taken"), "someone-else".into());
    let mut agent = artifact(&network, "taken", ());

    let err = agent.start(true).await.unwrap_err();
    assert!(matches!(
        err,
        ArtifactError::Registration {
            source: RegistrationError::Conflict(_),
            ..
        }
    ));
    assert!(!agent.handle().is_alive());
}

#[tokio::test]
async fn test_self_signed_server_needs_insecure_policy() {
    let mut config = MemoryNetworkConfig::new(DOMAIN);
    config.trusted_certificate = false;
    let network = MemoryNetwork::with_config(config);

    let mut strict = artifact(&network, "strict", ());
    assert_err!(strict.start(true).await);

    let config = ArtifactConfig::new(jid("dev"), "secret").insecure();
    let mut dev = ArtifactBuilder::new(config).network(&network).build(()).unwrap();
    assert_ok!(dev.start(true).await);
    assert!(dev.handle().is_alive());
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_returns_to_created() {
    let mut config = MemoryNetworkConfig::new(DOMAIN);
    config.connect_delay = Duration::from_secs(30);
    let network = MemoryNetwork::with_config(config);

    let config =
        ArtifactConfig::new(jid("slow"), "secret").with_connect_timeout(Duration::from_secs(2));
    let mut agent = ArtifactBuilder::new(config).network(&network).build(()).unwrap();

    let err = agent.start(true).await.unwrap_err();
    assert!(matches!(err, ArtifactError::Connection(_)));
    assert_eq!(agent.handle().state(), LifecycleState::Created);
}

#[tokio::test]
async fn test_double_stop_is_noop() {
    let network = MemoryNetwork::new(DOMAIN);
    let agent = running(&network, "agent").await;

    assert_ok!(agent.stop().await);
    assert_ok!(agent.stop().await);
    assert_eq!(agent.handle().state(), LifecycleState::Stopped);
    assert!(!agent.handle().is_alive());
}

#[tokio::test]
async fn test_stop_before_start() {
    let network = MemoryNetwork::new(DOMAIN);
    let agent = artifact(&network, "idle", ());

    assert_ok!(agent.stop().await);
    assert_eq!(agent.handle().state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_knowledge_overwrite() {
    let network = MemoryNetwork::new(DOMAIN);
    let agent = artifact(&network, "agent", ());
    let handle = agent.handle();

    handle.set("k", 1);
    handle.set("k", 2);
    assert_eq!(handle.get("k"), Some(json!(2)));
    assert_eq!(handle.get_as::<i64>("k"), Some(2));
    assert!(handle.get("missing").is_none());

    assert_eq!(handle.remove("k"), Some(json!(2)));
    assert!(handle.get("k").is_none());
}

#[tokio::test]
async fn test_filter_drops_non_chat() {
    let network = MemoryNetwork::new(DOMAIN);
    let agent = running(&network, "agent").await;

    let headline = Stanza::new(StanzaKind::Headline, Some(jid("peer")), jid("agent"), vec![]);
    network.inject(headline).unwrap();

    assert!(agent.handle().receive(Some(Duration::from_millis(100))).await.is_none());
    assert_eq!(agent.handle().dispatch_stats().filtered, 1);
}

#[tokio::test]
async fn test_presence_follows_lifecycle() {
    let network = MemoryNetwork::new(DOMAIN);
    let agent = running(&network, "agent").await;
    assert_eq!(network.presence_of(&jid("agent")), Some(PresenceState::Available));

    agent.stop().await.unwrap();
    assert_eq!(network.presence_of(&jid("agent")), Some(PresenceState::Unavailable));
}

#[tokio::test]
async fn test_no_dispatch_after_stop() {
    let network = MemoryNetwork::new(DOMAIN);
    let alice = running(&network, "alice").await;
    let bob = running(&network, "bob").await;

    bob.stop().await.unwrap();

    let mut msg = Message::text(jid("bob"), "after stop");
    alice.handle().send(&mut msg).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bob.handle().mailbox_size(), 0);
    assert_eq!(network.offline_count(&jid("bob")), 1);
}

#[tokio::test]
async fn test_spawned_tasks_cancelled_on_stop() {
    let network = MemoryNetwork::new(DOMAIN);
    let agent = running(&network, "agent").await;

    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    agent
        .handle()
        .spawn(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    agent.stop().await.unwrap();
    assert!(!finished.load(Ordering::SeqCst));

    let err = agent.handle().spawn(async {}).unwrap_err();
    assert!(matches!(err, ArtifactError::InvalidState { operation: "spawn", .. }));
}

#[tokio::test]
async fn test_default_run_is_not_implemented() {
    let network = MemoryNetwork::new(DOMAIN);
    let mut agent = artifact(&network, "agent", ());

    // Not running yet
    assert!(matches!(
        agent.run().await,
        Err(ArtifactError::InvalidState { operation: "run", .. })
    ));

    agent.start(true).await.unwrap();
    let err = agent.run().await.unwrap_err();
    assert!(matches!(err, ArtifactError::NotImplemented { hook: "run" }));
    // The connection stays up
    assert!(agent.handle().is_alive());
}

/// Replies to each message until it has echoed `limit` of them
struct Echo {
    limit: usize,
    echoed: usize,
}

#[async_trait]
impl ArtifactBehavior for Echo {
    async fn run(&mut self, artifact: &ArtifactHandle) -> ArtifactResult<()> {
        while self.echoed < self.limit {
            let Some(msg) = artifact.receive(Some(RECEIVE_TIMEOUT)).await else {
                return Err(ArtifactError::Behavior("no message".into()));
            };
            let mut reply = msg.make_reply().with_body(msg.body.unwrap_or_default());
            artifact.send(&mut reply).await?;
            self.echoed += 1;
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_echo_behavior() {
    let network = MemoryNetwork::new(DOMAIN);
    let client = running(&network, "client").await;
    let mut echo = artifact(&network, "echo", Echo { limit: 2, echoed: 0 });
    echo.start(true).await.unwrap();

    let echo_task = tokio::spawn(async move {
        let result = echo.run().await;
        (echo, result)
    });

    for body in ["one", "two"] {
        let mut msg = Message::text(jid("echo"), body).with_thread("t");
        client.handle().send(&mut msg).await.unwrap();
        let reply = client.handle().receive(Some(RECEIVE_TIMEOUT)).await.unwrap();
        assert_eq!(reply.body.as_deref(), Some(body));
        assert_eq!(reply.thread.as_deref(), Some("t"));
        assert_eq!(reply.sender, Some(jid("echo")));
    }

    let (echo, result) = echo_task.await.unwrap();
    assert_ok!(result);
    assert_eq!(echo.behavior().echoed, 2);
    assert_ok!(echo.stop().await);
}

/// Sends a greeting during setup
struct Greeter {
    to: Jid,
}

#[async_trait]
impl ArtifactBehavior for Greeter {
    async fn setup(&mut self, artifact: &ArtifactHandle) -> ArtifactResult<()> {
        let mut msg = Message::text(self.to.clone(), "hello from setup");
        artifact.send(&mut msg).await
    }
}

#[tokio::test]
async fn test_send_during_setup() {
    let network = MemoryNetwork::new(DOMAIN);
    let peer = running(&network, "peer").await;
    let mut greeter = artifact(&network, "greeter", Greeter { to: jid("peer") });

    greeter.start(true).await.unwrap();

    let msg = peer.handle().receive(Some(RECEIVE_TIMEOUT)).await.unwrap();
    assert_eq!(msg.body.as_deref(), Some("hello from setup"));
}

/// Fails in after_connect
struct Faulty;

#[async_trait]
impl ArtifactBehavior for Faulty {
    async fn after_connect(&mut self, _artifact: &ArtifactHandle) -> ArtifactResult<()> {
        Err(ArtifactError::Behavior("boom".into()))
    }
}

#[tokio::test]
async fn test_hook_failure_closes_session() {
    let network = MemoryNetwork::new(DOMAIN);
    let mut agent = artifact(&network, "faulty", Faulty);

    let err = agent.start(true).await.unwrap_err();
    assert!(matches!(err, ArtifactError::Behavior(_)));
    assert!(!agent.handle().is_alive());
    assert!(agent.handle().session().is_none());
    assert!(!network.is_online(&jid("faulty")));
    assert_eq!(agent.handle().state(), LifecycleState::Created);
}

/// Requests a stop from within setup
struct Quitter;

#[async_trait]
impl ArtifactBehavior for Quitter {
    async fn setup(&mut self, artifact: &ArtifactHandle) -> ArtifactResult<()> {
        artifact.stop().await
    }
}

#[tokio::test]
async fn test_stop_during_start_interrupts() {
    let network = MemoryNetwork::new(DOMAIN);
    let mut agent = artifact(&network, "quitter", Quitter);

    let err = agent.start(true).await.unwrap_err();
    assert!(matches!(err, ArtifactError::Interrupted));
    assert_eq!(agent.handle().state(), LifecycleState::Stopped);
    assert!(!agent.handle().is_alive());
    assert!(!network.is_online(&jid("quitter")));
}

/// Stops itself from an owned task
struct SelfStopping;

#[async_trait]
impl ArtifactBehavior for SelfStopping {
    async fn run(&mut self, artifact: &ArtifactHandle) -> ArtifactResult<()> {
        let handle = artifact.clone();
        artifact.spawn(async move {
            let _ = handle.stop().await;
        })?;
        Ok(())
    }
}

#[tokio::test]
async fn test_stop_from_owned_task() {
    let network = MemoryNetwork::new(DOMAIN);
    let mut agent = artifact(&network, "selfstop", SelfStopping);
    let mut states = agent.handle().state_changes();

    agent.start(true).await.unwrap();
    agent.run().await.unwrap();

    let stopped = states.wait_for(|s| *s == LifecycleState::Stopped);
    assert_ok!(tokio::time::timeout(RECEIVE_TIMEOUT, stopped).await);
    assert!(!agent.handle().is_alive());
}

/// Counts down a knowledge entry, then returns
struct Countdown;

#[async_trait]
impl ArtifactBehavior for Countdown {
    async fn before_connect(&mut self, artifact: &ArtifactHandle) -> ArtifactResult<()> {
        artifact.set("remaining", 3);
        Ok(())
    }

    async fn run(&mut self, artifact: &ArtifactHandle) -> ArtifactResult<()> {
        while let Some(n) = artifact.get_as::<u32>("remaining").filter(|n| *n > 0) {
            artifact.set("remaining", n - 1);
        }
        Ok(())
    }
}

#[test]
fn test_launch_runs_to_completion() {
    let network = MemoryNetwork::new(DOMAIN);
    let agent = artifact(&network, "launcher", Countdown);
    let handle = agent.handle().clone();

    agent.launch(true).unwrap();

    assert_eq!(handle.state(), LifecycleState::Stopped);
    assert_eq!(handle.get_as::<u32>("remaining"), Some(0));
    assert!(!network.is_online(&jid("launcher")));
}
