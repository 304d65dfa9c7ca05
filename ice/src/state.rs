use std::fmt;

use serde::Serialize;

/// ICE socket lifecycle. `GoingToSleep`/`Sleeping` park the TURN
/// allocations while keeping the bound UDP endpoints warm for fast
/// reactivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IceSocketState {
    Pending,
    Ready,
    GoingToSleep,
    Sleeping,
    ShuttingDown,
    Shutdown,
}

impl fmt::Display for IceSocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IceSocketState::Pending => "pending",
            IceSocketState::Ready => "ready",
            IceSocketState::GoingToSleep => "going to sleep",
            IceSocketState::Sleeping => "sleeping",
            IceSocketState::ShuttingDown => "shutting down",
            IceSocketState::Shutdown => "shutdown",
        };
        write!(f, "{s}")
    }
}

/// ICE session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IceSessionState {
    /// Pairs formed, no checks sent yet.
    New,
    /// Connectivity checks in progress.
    Searching,
    /// A pair is nominated and usable.
    Ready,
    /// Every pair failed.
    Failed,
    Shutdown,
}

impl fmt::Display for IceSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IceSessionState::New => "new",
            IceSessionState::Searching => "searching",
            IceSessionState::Ready => "ready",
            IceSessionState::Failed => "failed",
            IceSessionState::Shutdown => "shutdown",
        };
        write!(f, "{s}")
    }
}
