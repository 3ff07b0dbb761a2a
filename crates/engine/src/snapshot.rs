// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot (C5, §4.5): the collection of Brokers keyed by
//! `(functionName, isInspector)`.

use crate::broker::{Broker, RegisterMeta};
use crate::error::EngineError;
use crate::event::WorkerStoppedEvent;
use ncp_core::{Clock, ContainerStatus, FunctionName, Profile, ProfileRegistry};
use ncp_supervisor::SupervisorClient;
use serde::Serialize;
use std::sync::Arc;

type BrokerKey = (FunctionName, bool);

/// One broker's slice of a `sync` call (§4.4/§4.5).
pub struct BrokerStatsEntry {
    pub function_name: FunctionName,
    pub is_inspector: bool,
    pub workers: Vec<ncp_dataplane::WorkerStats>,
}

/// Plain serde-serializable stand-in for `toProtobufObject` (§4.5, §10):
/// the actual protobuf wire encoding is telemetry-export plumbing and out
/// of scope, so this crate exposes a structure any caller can serialize to
/// JSON, protobuf, or anything else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub brokers: Vec<BrokerSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerSummary {
    pub function_name: FunctionName,
    pub is_inspector: bool,
    pub workers: Vec<WorkerSummary>,
    pub starting_pool: Vec<StartingPoolSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSummary {
    pub name: ncp_core::WorkerName,
    pub credential: ncp_core::Credential,
    pub status: ContainerStatus,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartingPoolSummary {
    pub worker_name: ncp_core::WorkerName,
    pub estimate_request_left: i64,
}

pub struct Snapshot {
    brokers: indexmap::IndexMap<BrokerKey, Broker>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self { brokers: indexmap::IndexMap::new() }
    }

    pub fn broker(&self, function_name: &FunctionName, is_inspector: bool) -> Option<&Broker> {
        self.brokers.get(&(function_name.clone(), is_inspector))
    }

    pub fn broker_mut(&mut self, function_name: &FunctionName, is_inspector: bool) -> Option<&mut Broker> {
        self.brokers.get_mut(&(function_name.clone(), is_inspector))
    }

    pub fn brokers(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.values()
    }

    pub fn brokers_mut(&mut self) -> impl Iterator<Item = &mut Broker> {
        self.brokers.values_mut()
    }

    /// Locates or creates the broker for `(function_name, is_inspector)` and
    /// delegates registration (§4.5).
    pub fn register(
        &mut self,
        function_name: FunctionName,
        is_inspector: bool,
        profile: Option<Arc<Profile>>,
        meta: RegisterMeta,
        clock: &impl Clock,
    ) -> Result<(), EngineError> {
        let key = (function_name.clone(), is_inspector);
        let broker =
            self.brokers.entry(key).or_insert_with(|| Broker::new(function_name, is_inspector, profile));
        broker.register(meta, clock)
    }

    /// For each entry whose broker exists, calls `broker.sync`; brokers
    /// absent from `broker_stats` are left untouched this tick, and stats
    /// entries naming an unknown broker are ignored (§4.5).
    pub fn sync(&mut self, broker_stats: &[BrokerStatsEntry], profile_registry: &ProfileRegistry) {
        for entry in broker_stats {
            let key = (entry.function_name.clone(), entry.is_inspector);
            if let Some(broker) = self.brokers.get_mut(&key) {
                let profile = profile_registry.get(&entry.function_name);
                broker.sync(&entry.workers, profile);
            }
        }
    }

    /// Synchronous half of `correct` (§4.5): removes every worker whose
    /// status is `Stopped` or `Unknown` from its broker's maps and returns
    /// what was removed, without calling the supervisor. Split out so a
    /// caller holding `Snapshot` behind a lock can do this inside the guard
    /// and issue `destroy` calls afterward, outside it (§5, §9:
    /// snapshot-then-act, then re-read).
    pub fn correct_collect(&mut self) -> Vec<WorkerStoppedEvent> {
        let mut gone = Vec::new();
        for (key, broker) in &self.brokers {
            for (name, worker) in broker.workers() {
                if matches!(worker.status(), ContainerStatus::Stopped | ContainerStatus::Unknown) {
                    gone.push((key.clone(), name.clone(), worker.credential.clone(), worker.pid));
                }
            }
        }

        let mut events = Vec::with_capacity(gone.len());
        for (key, name, credential, pid) in gone {
            if let Some(broker) = self.brokers.get_mut(&key) {
                broker.remove(&name);
            }
            events.push(WorkerStoppedEvent {
                function_name: key.0,
                is_inspector: key.1,
                worker_name: name,
                credential,
                pid,
            });
        }

        self.brokers.retain(|_, broker| !(broker.is_empty() && broker.profile.is_none()));
        events
    }

    /// Full `correct()` (§4.5): collects and removes stopped/unknown
    /// workers, then tells the supervisor to `destroy` each one, swallowing
    /// per-worker failures to a warn-log.
    ///
    /// Calling `correct()` twice in a row with no intervening state change
    /// produces no events the second time (§8 invariant 6): the first call
    /// already removed everything that qualified.
    pub async fn correct(&mut self, supervisor: &dyn SupervisorClient) -> Vec<WorkerStoppedEvent> {
        let events = self.correct_collect();
        for event in &events {
            if let Err(err) = supervisor.destroy(&event.worker_name).await {
                tracing::warn!(worker = %event.worker_name, error = %err, "destroy failed during correct");
            }
        }
        events
    }

    pub fn to_protobuf_object(&self) -> SnapshotSummary {
        SnapshotSummary {
            brokers: self
                .brokers
                .values()
                .map(|broker| BrokerSummary {
                    function_name: broker.function_name.clone(),
                    is_inspector: broker.is_inspector,
                    workers: broker
                        .workers()
                        .map(|(name, worker)| WorkerSummary {
                            name: name.clone(),
                            credential: worker.credential.clone(),
                            status: worker.status(),
                            pid: worker.pid,
                        })
                        .collect(),
                    starting_pool: broker
                        .starting_pool()
                        .map(|entry| StartingPoolSummary {
                            worker_name: entry.worker_name.clone(),
                            estimate_request_left: entry.estimate_request_left,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
