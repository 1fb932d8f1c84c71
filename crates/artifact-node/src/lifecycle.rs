//! Lifecycle states of an artifact

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where an artifact is in its lifecycle
///
/// `Created → Connecting → Running → Stopping → Stopped`. A failed start
/// returns to `Created`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Built, never started (or a start attempt failed)
    Created,
    /// `start()` in progress
    Connecting,
    /// Connected, dispatching, hooks done
    Running,
    /// `stop()` in progress
    Stopping,
    /// Torn down
    Stopped,
}

impl LifecycleState {
    /// Whether the artifact has begun or finished shutting down
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, LifecycleState::Stopping | LifecycleState::Stopped)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Created => "created",
            LifecycleState::Connecting => "connecting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}
