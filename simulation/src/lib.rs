//! # Artifact Simulation
//!
//! Runs artifacts against an in-memory network to exercise the full
//! lifecycle: registration, authentication, dispatch, send/receive and stop.
//!
//! ## Scenarios
//!
//! - **echo**: a client sends messages, an echo artifact replies to each
//! - **ping-pong**: two artifacts bounce a counter back and forth
//! - **auth-failure**: connecting an unknown account fails, auto-registration fixes it
//! - **offline**: messages sent to a stopped artifact are delivered on its next login
//!
//! ## Example
//!
//! ```rust,ignore
//! use artifact_simulation::scenarios;
//!
//! let report = scenarios::run_echo_scenario(3).await?;
//! assert_eq!(report.echoed, 3);
//! ```

pub mod scenarios;

pub use scenarios::{
    AuthFailureReport, EchoReport, OfflineReport, PingPongReport, ScenarioError, ScenarioResult,
};
