// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness shared by this crate's `#[cfg(test)]` modules and the
//! root end-to-end scenarios: a fully-wired in-memory world (fake clock,
//! fake supervisor, fake data plane, fake bundle writer) so tests can
//! drive `auto_scale`/`try_launch`/`tick` without touching the filesystem
//! or real time.

use crate::capacity::CapacityManager;
use crate::launcher::{FakeBundleWriter, WorkerLauncher};
use crate::reconciler::StateReconciler;
use crate::snapshot::Snapshot;
use ncp_core::{ApplyMode, FakeClock, NameGen, Profile, ProfileRegistry};
use ncp_core::test_support::FakeNameGen;
use ncp_dataplane::{DataPlaneClient, FakeDataPlaneClient};
use ncp_supervisor::FakeSupervisorClient;
use parking_lot::Mutex as SyncMutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default per-function concurrency for `WorkerLauncher` in tests —
/// matches the spec's documented default (§4.7).
pub const DEFAULT_EXPAND_CONCURRENCY: usize = 2;

/// A fully-wired, all-fake engine world for deterministic tests.
pub struct EngineHarness {
    pub registry: ProfileRegistry,
    pub snapshot: Arc<SyncMutex<Snapshot>>,
    pub supervisor: Arc<FakeSupervisorClient>,
    pub data_plane: Arc<FakeDataPlaneClient>,
    pub clock: FakeClock,
    pub name_gen: Arc<dyn NameGen>,
    pub launcher: WorkerLauncher<FakeClock>,
    pub capacity: CapacityManager,
    pub reconciler: StateReconciler<FakeClock>,
}

impl EngineHarness {
    /// `virtual_memory_pool_size` and `shrink_redundant_times` are the two
    /// knobs most tests want to vary; everything else gets a fast, inert
    /// default (no filesystem, no real sleeps).
    pub fn new(virtual_memory_pool_size: u64, shrink_redundant_times: u32) -> Self {
        let registry = ProfileRegistry::with_noop_hook();
        let snapshot = Arc::new(SyncMutex::new(Snapshot::new()));
        let supervisor = Arc::new(FakeSupervisorClient::new());
        let data_plane = Arc::new(FakeDataPlaneClient::new());
        let clock = FakeClock::new();
        let name_gen: Arc<dyn NameGen> = Arc::new(FakeNameGen::default());

        let launcher = WorkerLauncher::new(
            virtual_memory_pool_size,
            PathBuf::from("/test-bundles"),
            PathBuf::from("/test-logs"),
            name_gen.clone(),
            Arc::new(FakeBundleWriter::new()),
            DEFAULT_EXPAND_CONCURRENCY,
            Duration::ZERO,
            clock.clone(),
        );
        let capacity = CapacityManager::new(virtual_memory_pool_size, shrink_redundant_times);
        let reconciler = StateReconciler::new(PathBuf::from("/test-logs"), clock.clone());

        Self { registry, snapshot, supervisor, data_plane, clock, name_gen, launcher, capacity, reconciler }
    }

    pub async fn set_profile(&self, profile: Profile) {
        self.registry.set(vec![profile], ApplyMode::Immediately).await.expect("noop hook never fails");
    }

    pub fn data_plane_clients(&self) -> Vec<Arc<dyn DataPlaneClient>> {
        vec![self.data_plane.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncp_core::FunctionName;

    #[tokio::test(start_paused = true)]
    async fn harness_launches_a_worker_end_to_end() {
        let harness = EngineHarness::new(1 << 30, 60);
        harness.set_profile(Profile::builder().name("func").build()).await;

        let worker_name = harness
            .launcher
            .try_launch(
                &FunctionName::from("func"),
                crate::launcher::LaunchOptions::default(),
                &harness.snapshot,
                &harness.registry,
                harness.supervisor.as_ref(),
            )
            .await;

        // The fake worker never transitions past `Created` on its own, so
        // `ready()` times out; what matters here is that registration and
        // the supervisor calls happened.
        assert!(worker_name.is_err());
        assert_eq!(harness.snapshot.lock().broker(&FunctionName::from("func"), false).unwrap().worker_count(), 1);
    }
}
