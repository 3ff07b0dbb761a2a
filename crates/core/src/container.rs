// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container status ordering and supervisor/data-plane event vocabulary.

use serde::{Deserialize, Serialize};

/// Monotonic worker lifecycle status (§3, §4.3).
///
/// Declaration order is significant: `derive(PartialOrd, Ord)` orders by
/// variant position, giving exactly the
/// `Created < Ready < PendingStop < Stopped < Unknown` ordering the spec
/// requires for rejecting regressive transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Created,
    Ready,
    PendingStop,
    Stopped,
    Unknown,
}

crate::simple_display! {
    ContainerStatus {
        Created => "created",
        Ready => "ready",
        PendingStop => "pending_stop",
        Stopped => "stopped",
        Unknown => "unknown",
    }
}

/// Supervisor-reported process state, as returned by `ps`/`state` (§4.3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Init,
    Starting,
    Cloning,
    Running,
    Stopping,
    Stopped,
    /// Seed-only state; `switchTo` treats this as a no-op.
    ForkWait,
    Unknown,
}

crate::simple_display! {
    SupervisorState {
        Init => "init",
        Starting => "starting",
        Cloning => "cloning",
        Running => "running",
        Stopping => "stopping",
        Stopped => "stopped",
        ForkWait => "forkwait",
        Unknown => "unknown",
    }
}

impl SupervisorState {
    /// States the supervisor reports while a sandbox is still coming up.
    pub fn is_initializing(&self) -> bool {
        matches!(self, Self::Init | Self::Starting | Self::Cloning | Self::Running)
    }

    pub fn is_stopping_or_stopped(&self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }
}

/// Status-report events pushed by the data plane for a worker (§3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerEvent {
    ContainerInstalled,
    RequestDrained,
    ContainerDisconnected,
}

crate::simple_display! {
    ContainerEvent {
        ContainerInstalled => "container_installed",
        RequestDrained => "request_drained",
        ContainerDisconnected => "container_disconnected",
    }
}

impl ContainerEvent {
    /// The `updateWorkerStatusByReport` mapping from §4.3:
    /// `ContainerInstalled` → Ready, `RequestDrained`/`ContainerDisconnected` → Stopped,
    /// anything else → Unknown (there is no "anything else" in this closed enum,
    /// but the mapping is kept total for forward-compatibility with new event kinds
    /// arriving over the wire before this enum is updated to carry them).
    pub fn target_status(&self) -> ContainerStatus {
        match self {
            Self::ContainerInstalled => ContainerStatus::Ready,
            Self::RequestDrained | Self::ContainerDisconnected => ContainerStatus::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_lifecycle() {
        assert!(ContainerStatus::Created < ContainerStatus::Ready);
        assert!(ContainerStatus::Ready < ContainerStatus::PendingStop);
        assert!(ContainerStatus::PendingStop < ContainerStatus::Stopped);
        assert!(ContainerStatus::Stopped < ContainerStatus::Unknown);
    }

    #[test]
    fn report_event_mapping() {
        assert_eq!(ContainerEvent::ContainerInstalled.target_status(), ContainerStatus::Ready);
        assert_eq!(ContainerEvent::RequestDrained.target_status(), ContainerStatus::Stopped);
        assert_eq!(ContainerEvent::ContainerDisconnected.target_status(), ContainerStatus::Stopped);
    }
}
