// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker (replica) state machine (C3, §3, §4.3).

use crate::clock::Clock;
use crate::container::{ContainerEvent, ContainerStatus, SupervisorState};
use crate::error::CoreError;
use crate::ids::{Credential, WorkerName};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

/// Grace period added on top of `initializationTimeoutMs` before `ready()`
/// gives up (§4.3).
pub const READY_GRACE: Duration = Duration::from_millis(100);

/// Per-worker request-load counters reported by the data plane (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerData {
    pub max_activate_requests: u32,
    pub active_request_count: u32,
}

impl WorkerData {
    /// Capacity still available on this worker, never negative.
    pub fn request_headroom(&self) -> u32 {
        self.max_activate_requests.saturating_sub(self.active_request_count)
    }
}

/// Starting-pool entry (§3): tracks a not-yet-ready worker's admission
/// headroom so the dispatcher can pre-admit requests onto warming workers.
#[derive(Debug, Clone)]
pub struct StartingPoolEntry {
    pub worker_name: WorkerName,
    pub credential: Credential,
    pub max_activate_requests: u32,
    pub estimate_request_left: i64,
}

impl StartingPoolEntry {
    pub fn new(worker_name: WorkerName, credential: Credential, max_activate_requests: u32) -> Self {
        Self {
            worker_name,
            credential,
            max_activate_requests,
            estimate_request_left: max_activate_requests as i64,
        }
    }
}

/// Failure modes for `Worker::ready()` (§4.3).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WorkerInitError {
    #[error("worker already past ready (stopping or stopped)")]
    AlreadyStopped,
    #[error("worker stopped before becoming ready")]
    Stopped,
    #[error("initialization timeout")]
    Timeout,
    #[error("worker status channel closed")]
    Closed,
}

/// One sandboxed process instance for one function (C3).
pub struct Worker {
    pub name: WorkerName,
    pub credential: Credential,
    pub pid: Option<u32>,
    pub disposable: bool,
    pub init_timeout: Duration,
    /// Monotonic instant used for timeout arithmetic.
    pub register_time: Instant,
    /// Wall-clock register time (epoch ms), for logging/serialization only.
    pub register_time_epoch_ms: u64,
    pub supervisor_state: Option<SupervisorState>,
    pub worker_data: Option<WorkerData>,
    status_tx: watch::Sender<ContainerStatus>,
}

impl Worker {
    pub fn new(
        name: WorkerName,
        credential: Credential,
        disposable: bool,
        init_timeout: Duration,
        clock: &impl Clock,
    ) -> Self {
        let (status_tx, _rx) = watch::channel(ContainerStatus::Created);
        Self {
            name,
            credential,
            pid: None,
            disposable,
            init_timeout,
            register_time: Instant::now(),
            register_time_epoch_ms: clock.epoch_ms(),
            supervisor_state: None,
            worker_data: None,
            status_tx,
        }
    }

    pub fn status(&self) -> ContainerStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ContainerStatus> {
        self.status_tx.subscribe()
    }

    /// Whether this worker counts toward broker/capacity bookkeeping (§3:
    /// "Only workers in {Ready, PendingStop} count toward capacity").
    pub fn counts_toward_capacity(&self) -> bool {
        matches!(self.status(), ContainerStatus::Ready | ContainerStatus::PendingStop)
    }

    fn ready_deadline(&self) -> Instant {
        self.register_time + self.init_timeout + READY_GRACE
    }

    /// Rejects any transition where `new < current` under the
    /// `Created < Ready < PendingStop < Stopped < Unknown` ordering;
    /// otherwise sets status and logs `(old, new, event)` (§4.3).
    pub fn update_container_status(
        &mut self,
        new: ContainerStatus,
        event: &str,
    ) -> Result<(), CoreError> {
        let old = self.status();
        if new < old {
            return Err(CoreError::StatusRegression { from: old, to: new });
        }
        if new != old {
            tracing::info!(worker = %self.name, from = %old, to = %new, event, "container status transition");
            let _ = self.status_tx.send(new);
        }
        Ok(())
    }

    pub fn set_ready(&mut self) -> Result<(), CoreError> {
        self.update_container_status(ContainerStatus::Ready, "set_ready")
    }

    pub fn set_stopped(&mut self, reason: &str) -> Result<(), CoreError> {
        self.update_container_status(ContainerStatus::Stopped, reason)
    }

    /// `switchTo` policy from §4.3, driven by the latest supervisor `ps`/
    /// `state` read (`None` means the process is no longer present).
    pub fn switch_to(
        &mut self,
        supervisor_state: Option<SupervisorState>,
        now: Instant,
    ) -> Result<(), CoreError> {
        self.supervisor_state = supervisor_state;
        let Some(state) = supervisor_state else {
            if self.status() == ContainerStatus::Ready {
                return self.update_container_status(ContainerStatus::Stopped, "sandbox disappeared");
            }
            return Ok(());
        };

        if state.is_initializing() {
            if self.status() == ContainerStatus::Created
                && now.saturating_duration_since(self.register_time) > self.init_timeout
            {
                return self.update_container_status(ContainerStatus::Stopped, "connect timeout");
            }
            return Ok(());
        }

        if state.is_stopping_or_stopped() {
            return self.update_container_status(ContainerStatus::Stopped, "supervisor reported stopped");
        }

        match state {
            SupervisorState::ForkWait => Ok(()),
            SupervisorState::Unknown => {
                self.update_container_status(ContainerStatus::Unknown, "supervisor reported unknown")
            }
            _ => Ok(()),
        }
    }

    /// `updateWorkerStatusByReport` mapping from §4.3.
    pub fn update_worker_status_by_report(&mut self, event: ContainerEvent) -> Result<(), CoreError> {
        self.update_container_status(event.target_status(), &event.to_string())
    }

    /// Refresh request-load counters from a data-plane stats push, or clear
    /// them when the worker is absent from the broadcast (`Broker::sync`,
    /// §4.4 passes `None` for unmatched workers).
    pub fn sync(&mut self, stats: Option<WorkerData>) {
        self.worker_data = stats;
    }

    /// Resolves once the worker becomes `Ready`, rejects once it reaches
    /// `PendingStop` or beyond, or after `initializationTimeoutMs + 100ms`
    /// of no resolution (§4.3).
    pub async fn ready(&self) -> Result<(), WorkerInitError> {
        let status = self.status();
        if status == ContainerStatus::Ready {
            return Ok(());
        }
        if status >= ContainerStatus::PendingStop {
            return Err(WorkerInitError::AlreadyStopped);
        }

        let mut rx = self.subscribe();
        let remaining = self.ready_deadline().saturating_duration_since(Instant::now());
        let wait = async {
            loop {
                if rx.changed().await.is_err() {
                    return Err(WorkerInitError::Closed);
                }
                let current = *rx.borrow();
                if current == ContainerStatus::Ready {
                    return Ok(());
                }
                if current >= ContainerStatus::PendingStop {
                    return Err(WorkerInitError::Stopped);
                }
            }
        };

        match tokio::time::timeout(remaining, wait).await {
            Ok(result) => result,
            Err(_) => Err(WorkerInitError::Timeout),
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
