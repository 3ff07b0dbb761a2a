// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capacity Manager (C6, §4.6): virtual memory budget accounting and the
//! `autoScale` expand/shrink cycle.

use crate::launcher::{LaunchOptions, WorkerLauncher};
use crate::snapshot::Snapshot;
use ncp_core::{Clock, Credential, FunctionName, ProfileRegistry, WorkerName};
use ncp_dataplane::{DataPlaneClient, ReduceCapacityBroker, ReduceCapacityRequest, ReduceCapacityWorkerRef};
use ncp_supervisor::SupervisorClient;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::Instrument;

/// Sum of `resource_limit.memory_bytes` over every worker that still
/// counts toward capacity (`Ready` or `PendingStop`, per
/// `Worker::counts_toward_capacity`), one term per broker.
///
/// Brokers whose profile has already been cleared (drained, about to be
/// dropped by `Snapshot::correct`) are skipped: their original
/// `memory_bytes` is no longer available, and any workers left on them are
/// already past `PendingStop` on their way out. This is a pragmatic
/// approximation, not exact accounting during churn — the spec's own
/// Non-goals (§1) explicitly exclude exact accounting in that window.
pub fn virtual_memory_used(snapshot: &Snapshot) -> u64 {
    snapshot
        .brokers()
        .filter_map(|broker| {
            let profile = broker.profile.as_ref()?;
            let count = broker.workers().filter(|(_, w)| w.counts_toward_capacity()).count() as u64;
            Some(count * profile.resource_limit.memory_bytes)
        })
        .sum()
}

/// Outcome of one `autoScale` cycle (§4.6), surfaced for logging/metrics.
#[derive(Debug, Default)]
pub struct AutoScaleReport {
    /// `(function, is_inspector, launched_count)` per broker that expanded.
    pub launched: Vec<(FunctionName, bool, usize)>,
    pub stopped: Vec<WorkerName>,
    pub errors: Vec<String>,
}

/// Drives the periodic expand/shrink cycle over every broker in a
/// `Snapshot` (§4.6).
pub struct CapacityManager {
    virtual_memory_pool_size: u64,
    shrink_redundant_times: u32,
    /// Serializes `autoScale` cycles (§4.6: "a new cycle does not start
    /// while one is active"): a second caller simply waits its turn rather
    /// than running concurrently.
    cycle_lock: AsyncMutex<()>,
}

impl CapacityManager {
    pub fn new(virtual_memory_pool_size: u64, shrink_redundant_times: u32) -> Self {
        Self { virtual_memory_pool_size, shrink_redundant_times, cycle_lock: AsyncMutex::new(()) }
    }

    pub fn virtual_memory_pool_size(&self) -> u64 {
        self.virtual_memory_pool_size
    }

    pub fn virtual_memory_available(&self, snapshot: &Snapshot) -> u64 {
        self.virtual_memory_pool_size.saturating_sub(virtual_memory_used(snapshot))
    }

    /// `autoScale` (§4.6): for every broker, compute
    /// `evaluateWaterLevel(expansionOnly=false, shrinkRedundantTimes)`,
    /// then run the expand phase (budget-clamped, via the launcher) and
    /// the shrink phase (draw victims, tell every data-plane client to
    /// `reduceCapacity`, then `supervisor.stop` each one) as two separate
    /// passes. Per-item failures are logged and do not abort the cycle
    /// (§7).
    pub async fn auto_scale<DC: Clock>(
        &self,
        snapshot: &Arc<SyncMutex<Snapshot>>,
        profile_registry: &ProfileRegistry,
        launcher: &WorkerLauncher<DC>,
        supervisor: &dyn SupervisorClient,
        data_plane_clients: &[Arc<dyn DataPlaneClient>],
    ) -> AutoScaleReport {
        let span = tracing::info_span!("autoscale_cycle");
        let _guard = self.cycle_lock.lock().await;
        let start = std::time::Instant::now();
        let report = self
            .auto_scale_inner(snapshot, profile_registry, launcher, supervisor, data_plane_clients)
            .instrument(span)
            .await;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            launched = report.launched.len(),
            stopped = report.stopped.len(),
            errors = report.errors.len(),
            "autoScale cycle complete"
        );
        report
    }

    async fn auto_scale_inner<DC: Clock>(
        &self,
        snapshot: &Arc<SyncMutex<Snapshot>>,
        profile_registry: &ProfileRegistry,
        launcher: &WorkerLauncher<DC>,
        supervisor: &dyn SupervisorClient,
        data_plane_clients: &[Arc<dyn DataPlaneClient>],
    ) -> AutoScaleReport {
        let mut report = AutoScaleReport::default();

        // Phase 0: collect per-broker deltas under one short-lived lock.
        let deltas: Vec<(FunctionName, bool, i64)> = {
            let mut guard = snapshot.lock();
            guard
                .brokers_mut()
                .map(|broker| {
                    let delta = broker.evaluate_water_level(false, self.shrink_redundant_times);
                    (broker.function_name.clone(), broker.is_inspector, delta)
                })
                .collect()
        };

        // Phase 1: expand. Clamp each broker's delta against the running
        // budget ledger before committing its launches (§4.6 step 2); the
        // ledger advances by what actually launched, not what was
        // requested, so a partial batch doesn't over-admit the next
        // broker. `try_launch` takes its own lock per call, so this runs
        // with the outer lock already released.
        let mut used = virtual_memory_used(&snapshot.lock());
        for (function_name, is_inspector, delta) in &deltas {
            if *delta <= 0 {
                continue;
            }
            let Some(profile) = profile_registry.get(function_name) else {
                report.errors.push(format!("{function_name:?} has no profile, skipping expansion"));
                continue;
            };
            let memory_limit = profile.resource_limit.memory_bytes.max(1);

            let mut n = *delta as u64;
            let need = n * memory_limit;
            if need + used > self.virtual_memory_pool_size {
                n = self.virtual_memory_pool_size.saturating_sub(used) / memory_limit;
            }
            if n == 0 {
                report.errors.push(format!("{function_name:?} expansion skipped: budget exhausted"));
                continue;
            }

            let options = LaunchOptions { inspect: *is_inspector };
            let launched = launcher
                .try_batch_launch(function_name, n as usize, options, snapshot, profile_registry, supervisor)
                .await;
            used += launched as u64 * memory_limit;
            if (launched as u64) < n {
                report.errors.push(format!(
                    "{function_name:?} requested {n} expansions, only {launched} succeeded"
                ));
            }
            report.launched.push((function_name.clone(), *is_inspector, launched));
        }

        // Phase 2: shrink. Draw victims synchronously, then notify the
        // data plane and stop them outside the lock.
        let victims: Vec<(FunctionName, bool, Vec<(WorkerName, Credential)>)> = {
            let mut guard = snapshot.lock();
            deltas
                .iter()
                .filter(|(_, _, delta)| *delta < 0)
                .filter_map(|(function_name, is_inspector, delta)| {
                    let broker = guard.broker_mut(function_name, *is_inspector)?;
                    let drawn = broker.shrink_draw((-delta) as usize);
                    if drawn.is_empty() {
                        None
                    } else {
                        Some((function_name.clone(), *is_inspector, drawn))
                    }
                })
                .collect()
        };

        if !victims.is_empty() {
            let brokers_req: Vec<ReduceCapacityBroker> = victims
                .iter()
                .map(|(function_name, is_inspector, drawn)| ReduceCapacityBroker {
                    function_name: function_name.clone(),
                    is_inspector: *is_inspector,
                    workers: drawn
                        .iter()
                        .map(|(name, credential)| ReduceCapacityWorkerRef {
                            name: name.clone(),
                            credential: credential.clone(),
                        })
                        .collect(),
                })
                .collect();
            let request = ReduceCapacityRequest { brokers: brokers_req };

            // A worker is confirmed once any data-plane client reports it
            // (only the client actually serving that worker's traffic is
            // expected to respond with a confirmation; the others drop it).
            let mut confirmed: HashSet<WorkerName> = HashSet::new();
            for client in data_plane_clients {
                match client.reduce_capacity(request.clone()).await {
                    Ok(response) => confirmed.extend(response.confirmed.into_iter().map(|w| w.name)),
                    Err(err) => {
                        tracing::warn!(error = %err, "reduceCapacity call failed");
                        report.errors.push(format!("reduceCapacity failed: {err}"));
                    }
                }
            }

            for (_, _, drawn) in &victims {
                for (name, _) in drawn {
                    if !confirmed.contains(name) {
                        continue;
                    }
                    if let Err(err) = supervisor.stop(name).await {
                        tracing::warn!(worker = %name, error = %err, "stop failed during shrink");
                        report.errors.push(format!("stop({name:?}) failed: {err}"));
                    } else {
                        report.stopped.push(name.clone());
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
#[path = "capacity_tests.rs"]
mod tests;
