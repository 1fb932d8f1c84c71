//! Artifact simulation
//!
//! Runs artifacts through their lifecycle on an in-memory network.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use artifact_logging::{ArtifactSubscriberBuilder, LogConfig};
use artifact_simulation::scenarios;

#[derive(Parser)]
#[command(
    name = "artifact-simulation",
    about = "Networked artifacts exchanging messages on an in-memory network",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSONL logs instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Write JSONL logs to a file per scenario under this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// A client talks to an echo artifact
    Echo {
        /// Number of messages to send
        #[arg(short, long, default_value = "3")]
        messages: usize,
    },

    /// Two artifacts rally a counter back and forth
    PingPong {
        /// Number of volleys in the rally
        #[arg(short, long, default_value = "10")]
        volleys: u32,
    },

    /// Connect an unregistered account, then retry with auto-registration
    AuthFailure,

    /// Messages to a stopped artifact arrive on its next login
    Offline {
        /// Number of messages sent while away
        #[arg(short, long, default_value = "3")]
        messages: usize,
    },

    /// Run every scenario
    All,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Echo { .. } => "echo",
            Commands::PingPong { .. } => "ping-pong",
            Commands::AuthFailure => "auth-failure",
            Commands::Offline { .. } => "offline",
            Commands::All => "all",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match (&cli.log_dir, cli.json) {
        (Some(dir), _) => LogConfig::per_artifact(dir, cli.command.name()),
        (None, true) => LogConfig::default(),
        (None, false) => LogConfig::development(),
    };
    let _guard = ArtifactSubscriberBuilder::new()
        .with_config(config)
        .with_level(if cli.verbose { "debug" } else { "info" })
        .try_init()?;

    match cli.command {
        Commands::Echo { messages } => echo(messages).await?,
        Commands::PingPong { volleys } => ping_pong(volleys).await?,
        Commands::AuthFailure => auth_failure().await?,
        Commands::Offline { messages } => offline(messages).await?,
        Commands::All => {
            echo(3).await?;
            ping_pong(10).await?;
            auth_failure().await?;
            offline(3).await?;
        }
    }

    info!("Simulation finished");
    Ok(())
}

async fn echo(messages: usize) -> anyhow::Result<()> {
    let report = scenarios::run_echo_scenario(messages).await?;
    println!("\n=== Echo ===");
    println!("  sent:    {}", report.sent);
    println!("  echoed:  {}", report.replies.len());
    for reply in &report.replies {
        println!("    <- {}", reply);
    }
    Ok(())
}

async fn ping_pong(volleys: u32) -> anyhow::Result<()> {
    let report = scenarios::run_ping_pong_scenario(volleys).await?;
    println!("\n=== Ping-pong ===");
    println!("  volleys:        {}", report.volleys);
    println!("  ping received:  {}", report.ping_received);
    println!("  pong received:  {}", report.pong_received);
    Ok(())
}

async fn auth_failure() -> anyhow::Result<()> {
    let report = scenarios::run_auth_failure_scenario().await?;
    println!("\n=== Auth failure ===");
    println!("  error:                {}", report.error);
    println!("  alive after failure:  {}", report.alive_after_failure);
    println!("  alive after register: {}", report.alive_after_register);
    Ok(())
}

async fn offline(messages: usize) -> anyhow::Result<()> {
    let report = scenarios::run_offline_scenario(messages).await?;
    println!("\n=== Offline delivery ===");
    println!("  stored while away: {}", report.stored);
    for body in &report.delivered {
        println!("    <- {}", body);
    }
    Ok(())
}
