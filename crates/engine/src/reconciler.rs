// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State Reconciler (C8, §4.8): the periodic tick that reconciles worker
//! status against the supervisor and data plane, plus the event-driven
//! fast path for status reports.

use crate::event::WorkerStoppedEvent;
use crate::snapshot::Snapshot;
use ncp_core::{Clock, ContainerEvent, FunctionName, ProfileRegistry, SupervisorState, WorkerName};
use ncp_dataplane::{DataPlaneClient, WorkerStats};
use ncp_supervisor::{PsEntry, SupervisorClient};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Log dirs are deleted this long after a worker is confirmed stopped
/// (§4.8 step 5). Reuse would cancel a pending deletion, but in practice
/// worker names are unique, so that case does not arise.
pub const LOG_RETENTION: Duration = Duration::from_secs(5 * 60);

fn parse_supervisor_state(raw: &str) -> SupervisorState {
    match raw {
        "init" => SupervisorState::Init,
        "starting" => SupervisorState::Starting,
        "cloning" => SupervisorState::Cloning,
        "running" => SupervisorState::Running,
        "stopping" => SupervisorState::Stopping,
        "stopped" => SupervisorState::Stopped,
        "forkwait" => SupervisorState::ForkWait,
        _ => SupervisorState::Unknown,
    }
}

/// Drives one reconcile tick (§4.8): `ps` → `switchTo` per worker →
/// data-plane stats → `Snapshot::sync` → `Snapshot::correct`.
pub struct StateReconciler<C: Clock> {
    log_dir: PathBuf,
    log_retention: Duration,
    clock: C,
}

impl<C: Clock> StateReconciler<C> {
    pub fn new(log_dir: PathBuf, clock: C) -> Self {
        Self { log_dir, log_retention: LOG_RETENTION, clock }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn with_retention(log_dir: PathBuf, clock: C, log_retention: Duration) -> Self {
        Self { log_dir, log_retention, clock }
    }

    /// One tick (§4.8 steps 1-5). Returns the `WorkerStopped` events
    /// `Snapshot::correct` emitted, after scheduling their log-dir cleanup.
    pub async fn tick(
        &self,
        snapshot: &Arc<SyncMutex<Snapshot>>,
        supervisor: &dyn SupervisorClient,
        data_plane_clients: &[Arc<dyn DataPlaneClient>],
        profile_registry: &ProfileRegistry,
    ) -> Vec<WorkerStoppedEvent> {
        let span = tracing::info_span!("reconcile_tick");
        let start = std::time::Instant::now();
        let events =
            self.tick_inner(snapshot, supervisor, data_plane_clients, profile_registry).instrument(span).await;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            stopped = events.len(),
            "reconcile tick complete"
        );
        events
    }

    async fn tick_inner(
        &self,
        snapshot: &Arc<SyncMutex<Snapshot>>,
        supervisor: &dyn SupervisorClient,
        data_plane_clients: &[Arc<dyn DataPlaneClient>],
        profile_registry: &ProfileRegistry,
    ) -> Vec<WorkerStoppedEvent> {
        // Step 1: ps.
        let ps_entries: Vec<PsEntry> = match supervisor.ps().await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "supervisor.ps failed, skipping this tick");
                return Vec::new();
            }
        };
        let ps_by_name: HashMap<WorkerName, (SupervisorState, u32)> = ps_entries
            .into_iter()
            .map(|e| (e.name, (parse_supervisor_state(&e.status), e.pid)))
            .collect();

        // Step 2: switchTo, synchronous. A worker's pid is learned from
        // `ps` here and latched on the worker so a later reclaim can carry
        // it in the `WorkerStopped` event (§3, §8-S1).
        let now = self.clock.now();
        {
            let mut guard = snapshot.lock();
            for broker in guard.brokers_mut() {
                for (name, worker) in broker.workers_mut() {
                    let entry = ps_by_name.get(name);
                    let state = entry.map(|(state, _)| *state);
                    if let Some((_, pid)) = entry {
                        worker.pid = Some(*pid);
                    }
                    if let Err(err) = worker.switch_to(state, now) {
                        tracing::warn!(worker = %name, error = %err, "switchTo rejected");
                    }
                }
            }
        }

        // Step 3: pull stats and bucket by broker key, then sync.
        let mut flat_stats: Vec<WorkerStats> = Vec::new();
        for client in data_plane_clients {
            flat_stats.extend(client.latest_stats());
        }

        {
            let mut guard = snapshot.lock();
            let key_by_name: HashMap<WorkerName, (FunctionName, bool)> = guard
                .brokers()
                .flat_map(|broker| {
                    broker
                        .workers()
                        .map(move |(name, _)| (name.clone(), (broker.function_name.clone(), broker.is_inspector)))
                })
                .collect();

            let mut buckets: HashMap<(FunctionName, bool), Vec<WorkerStats>> = HashMap::new();
            for stat in flat_stats {
                if let Some(key) = key_by_name.get(&stat.name) {
                    buckets.entry(key.clone()).or_default().push(stat);
                }
            }

            let entries: Vec<crate::snapshot::BrokerStatsEntry> = buckets
                .into_iter()
                .map(|((function_name, is_inspector), workers)| crate::snapshot::BrokerStatsEntry {
                    function_name,
                    is_inspector,
                    workers,
                })
                .collect();

            guard.sync(&entries, profile_registry);
        }

        // Step 4: correct, synchronous collect then async destroy.
        let events = {
            let mut guard = snapshot.lock();
            guard.correct_collect()
        };
        for event in &events {
            if let Err(err) = supervisor.destroy(&event.worker_name).await {
                tracing::warn!(worker = %event.worker_name, error = %err, "destroy failed during reconcile");
            }
        }

        // Step 5: schedule log-dir cleanup.
        for event in &events {
            self.schedule_log_cleanup(&event.worker_name);
        }

        events
    }

    fn schedule_log_cleanup(&self, worker_name: &WorkerName) {
        let stdout = self.log_dir.join(format!("{}.stdout.log", worker_name.as_str()));
        let stderr = self.log_dir.join(format!("{}.stderr.log", worker_name.as_str()));
        let retention = self.log_retention;
        let worker_name = worker_name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            if let Err(err) = tokio::fs::remove_file(&stdout).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(worker = %worker_name, path = %stdout.display(), error = %err, "failed to remove stdout log");
                }
            }
            if let Err(err) = tokio::fs::remove_file(&stderr).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(worker = %worker_name, path = %stderr.display(), error = %err, "failed to remove stderr log");
                }
            }
        });
    }

    /// Event-driven fast path (§4.8): applied synchronously, independent of
    /// the tick.
    pub fn apply_status_report(
        &self,
        snapshot: &Arc<SyncMutex<Snapshot>>,
        function_name: &FunctionName,
        is_inspector: bool,
        worker_name: &WorkerName,
        event: ContainerEvent,
    ) {
        let mut guard = snapshot.lock();
        let Some(broker) = guard.broker_mut(function_name, is_inspector) else {
            tracing::warn!(function = %function_name, worker = %worker_name, "status report for unknown broker");
            return;
        };
        let Some(worker) = broker.worker_mut(worker_name) else {
            tracing::warn!(function = %function_name, worker = %worker_name, "status report for unknown worker");
            return;
        };
        if let Err(err) = worker.update_worker_status_by_report(event) {
            tracing::warn!(worker = %worker_name, error = %err, "status report rejected");
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
