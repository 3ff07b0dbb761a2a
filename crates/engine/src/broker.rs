// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker (C4, §4.4): per-(function, inspector) aggregate of workers, the
//! starting pool, and the evaluate/shrink-draw scaling policies.

use crate::error::EngineError;
use ncp_core::{
    Clock, ContainerStatus, Credential, FunctionName, Profile, ShrinkStrategy, StartingPoolEntry,
    Worker, WorkerData, WorkerName,
};
use ncp_supervisor::SupervisorClient;
use std::sync::Arc;
use tokio::time::Instant;

/// Inputs to `Broker::register` (§4.4). Process name and credential are
/// generated by the caller (`WorkerLauncher`, via `NameGen`) before the
/// worker exists, so `register` only needs to place them.
#[derive(Debug, Clone)]
pub struct RegisterMeta {
    pub worker_name: WorkerName,
    pub credential: Credential,
    pub disposable: bool,
    pub init_timeout: std::time::Duration,
    pub max_activate_requests: u32,
}

/// One (function, inspector-flag) scheduling unit (§3, §4.4).
pub struct Broker {
    pub function_name: FunctionName,
    pub is_inspector: bool,
    pub profile: Option<Arc<Profile>>,
    workers: indexmap::IndexMap<WorkerName, Worker>,
    starting_pool: indexmap::IndexMap<WorkerName, StartingPoolEntry>,
    redundant_times: u32,
}

impl Broker {
    pub fn new(function_name: FunctionName, is_inspector: bool, profile: Option<Arc<Profile>>) -> Self {
        Self {
            function_name,
            is_inspector,
            profile,
            workers: indexmap::IndexMap::new(),
            starting_pool: indexmap::IndexMap::new(),
            redundant_times: 0,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn worker(&self, name: &WorkerName) -> Option<&Worker> {
        self.workers.get(name)
    }

    pub fn worker_mut(&mut self, name: &WorkerName) -> Option<&mut Worker> {
        self.workers.get_mut(name)
    }

    pub fn workers(&self) -> impl Iterator<Item = (&WorkerName, &Worker)> {
        self.workers.iter()
    }

    pub fn workers_mut(&mut self) -> impl Iterator<Item = (&WorkerName, &mut Worker)> {
        self.workers.iter_mut()
    }

    pub fn starting_pool_len(&self) -> usize {
        self.starting_pool.len()
    }

    pub fn starting_pool(&self) -> impl Iterator<Item = &StartingPoolEntry> {
        self.starting_pool.values()
    }

    /// Requires a profile to already be set; constructs a `Worker` and
    /// seeds a matching starting-pool entry (§4.4).
    pub fn register(&mut self, meta: RegisterMeta, clock: &impl Clock) -> Result<(), EngineError> {
        if self.profile.is_none() {
            return Err(EngineError::NoFunction(self.function_name.clone()));
        }
        let worker = Worker::new(
            meta.worker_name.clone(),
            meta.credential.clone(),
            meta.disposable,
            meta.init_timeout,
            clock,
        );
        self.starting_pool.insert(
            meta.worker_name.clone(),
            StartingPoolEntry::new(meta.worker_name.clone(), meta.credential, meta.max_activate_requests),
        );
        self.workers.insert(meta.worker_name, worker);
        Ok(())
    }

    /// Removes from both maps without touching the supervisor — the
    /// synchronous half of `unregister`, split out so callers holding a
    /// `Snapshot` behind a lock can mutate inside the guard and issue the
    /// `destroy` call afterward, outside it (§5, §9).
    pub fn remove(&mut self, name: &WorkerName) -> bool {
        self.starting_pool.shift_remove(name);
        self.workers.shift_remove(name).is_some()
    }

    /// Removes from both maps, asks the supervisor to `destroy`, swallowing
    /// errors to a warn-log (§4.4 — unregister never fails the caller).
    pub async fn unregister(&mut self, name: &WorkerName, supervisor: &dyn SupervisorClient) {
        if self.remove(name) {
            if let Err(err) = supervisor.destroy(name).await {
                tracing::warn!(worker = %name, error = %err, "destroy failed during unregister");
            }
        }
    }

    /// Refreshes `profileSnapshot`, pushes matching stats into each worker,
    /// and prunes/updates starting-pool entries (§4.4).
    pub fn sync(&mut self, stats: &[ncp_dataplane::WorkerStats], profile: Option<Arc<Profile>>) {
        self.profile = profile;

        let by_name: std::collections::HashMap<&WorkerName, &ncp_dataplane::WorkerStats> =
            stats.iter().map(|s| (&s.name, s)).collect();

        for (name, worker) in self.workers.iter_mut() {
            let data = by_name.get(name).map(|s| WorkerData {
                max_activate_requests: s.max_activate_requests,
                active_request_count: s.active_request_count,
            });
            worker.sync(data);
        }

        let workers = &self.workers;
        self.starting_pool.retain(|name, entry| {
            let Some(worker) = workers.get(name) else {
                return false;
            };
            if worker.status() != ContainerStatus::Created {
                return false;
            }
            if let Some(stat) = by_name.get(name) {
                entry.estimate_request_left =
                    stat.max_activate_requests as i64 - stat.active_request_count as i64;
            }
            true
        });
    }

    /// Admits onto the first warming worker with headroom left, used by the
    /// data-plane dispatcher (out of scope here) to pre-admit requests
    /// without rebalancing every call (§4.4).
    pub fn prerequest_starting_pool(&mut self) -> bool {
        for entry in self.starting_pool.values_mut() {
            if entry.estimate_request_left > 0 {
                entry.estimate_request_left -= 1;
                return true;
            }
        }
        false
    }

    fn reservation_count(&self, profile: &Profile) -> u32 {
        if self.is_inspector {
            1
        } else if profile.worker.disposable {
            0
        } else {
            profile.worker.reservation_count
        }
    }

    /// Sum of `activeRequestCount`/`maxActivateRequests` over `Ready`
    /// workers only — "Running" per §4.4's waterLevel definition, distinct
    /// from `counts_toward_capacity` which also includes `PendingStop`.
    fn running_totals(&self) -> (u64, u64, usize) {
        let mut active = 0u64;
        let mut total_cap = 0u64;
        let mut count = 0usize;
        for worker in self.workers.values() {
            if worker.status() != ContainerStatus::Ready {
                continue;
            }
            if let Some(data) = &worker.worker_data {
                active += u64::from(data.active_request_count);
                total_cap += u64::from(data.max_activate_requests);
            }
            count += 1;
        }
        (active, total_cap, count)
    }

    /// Returns an integer delta: positive = expand, negative = shrink
    /// (§4.4). `shrink_redundant_times` is the engine-wide hysteresis
    /// window (`worker.shrinkRedundantTimes`, §6) — not a per-profile field.
    pub fn evaluate_water_level(&mut self, expansion_only: bool, shrink_redundant_times: u32) -> i64 {
        let Some(profile) = self.profile.clone() else {
            return if expansion_only { 0 } else { -(self.workers.len() as i64) };
        };
        if profile.worker.disposable {
            return 0;
        }

        let (active, total_cap, worker_count) = self.running_totals();
        if worker_count == 0 || total_cap == 0 {
            return 0;
        }

        let water_level = active as f64 / total_cap as f64;
        let reservation = i64::from(self.reservation_count(&profile));
        let worker_count_i = worker_count as i64;
        let per_worker = f64::from(profile.worker.max_activate_requests).max(1.0);

        if water_level <= 0.6 && worker_count_i > reservation {
            if worker_count == 1 && active > 0 {
                self.redundant_times = 0;
                return 0;
            }
            self.redundant_times += 1;
            if self.redundant_times < shrink_redundant_times {
                return 0;
            }
            self.redundant_times = 0;
            let target = active as f64 / 0.7;
            let delta = ((total_cap as f64 - target) / per_worker).floor() as i64;
            let max_shrink = worker_count_i - reservation;
            return -delta.clamp(0, max_shrink);
        }

        if water_level >= 0.8 {
            self.redundant_times = 0;
            // Target total capacity to bring water level back down to 0.7,
            // expressed directly as a worker count rather than netted
            // against `worker_count` — `autoScale`'s budget clamp (C6) is
            // what actually bounds how many of these get launched.
            let target = active as f64 / 0.7;
            let delta = (target / per_worker).ceil() as i64;
            let max_expand = (i64::from(profile.worker.replica_count_limit) - worker_count_i).max(0);
            return delta.clamp(0, max_expand);
        }

        self.redundant_times = 0;
        0
    }

    /// Selects `n` victims via the profile's `shrinkStrategy` (unknown
    /// strategies already fall back to `Lcc` at deserialization), marks
    /// each `PendingStop`, and returns `(name, credential)` pairs (§4.4).
    pub fn shrink_draw(&mut self, n: usize) -> Vec<(WorkerName, Credential)> {
        let strategy = self.profile.as_ref().map(|p| p.worker.shrink_strategy).unwrap_or_default();

        struct Candidate {
            name: WorkerName,
            credential: Credential,
            active_request_count: u32,
            register_time: Instant,
        }

        let mut candidates: Vec<Candidate> = self
            .workers
            .iter()
            .filter(|(_, w)| w.status() == ContainerStatus::Ready)
            .map(|(name, w)| Candidate {
                name: name.clone(),
                credential: w.credential.clone(),
                active_request_count: w.worker_data.map(|d| d.active_request_count).unwrap_or(0),
                register_time: w.register_time,
            })
            .collect();

        candidates.sort_by(|a, b| match strategy {
            ShrinkStrategy::Lcc => a
                .active_request_count
                .cmp(&b.active_request_count)
                .then_with(|| a.credential.as_str().cmp(b.credential.as_str())),
            ShrinkStrategy::Fifo => a.register_time.cmp(&b.register_time),
            ShrinkStrategy::Filo => b.register_time.cmp(&a.register_time),
        });

        let mut victims = Vec::with_capacity(n.min(candidates.len()));
        for candidate in candidates.into_iter().take(n) {
            if let Some(worker) = self.workers.get_mut(&candidate.name) {
                let _ = worker.update_container_status(ContainerStatus::PendingStop, "shrink_draw");
            }
            victims.push((candidate.name, candidate.credential));
        }
        victims
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
