// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ncpd`: runs the control plane core as two concurrent background
//! loops — the State Reconciler's tick (§4.8) and the Capacity Manager's
//! `autoScale` cycle (§4.6) — sharing one `Snapshot` and Profile Registry.
//! Boot glue, CLI parsing, and gRPC transport wiring are out of scope
//! (§1); this binary only assembles the collaborators and starts ticking.

use ncp_core::{ApplyMode, DefaultNameGen, NameGen, ProfileRegistry, SystemClock};
use ncp_daemon::Config;
use ncp_dataplane::{DataPlaneClient, NullDataPlaneClient};
use ncp_engine::{CapacityManager, FsBundleWriter, Snapshot, StateReconciler, WorkerLauncher};
use ncp_supervisor::{SupervisorClient, TurfClient};
use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use tokio::time::interval;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ncp_daemon::logging::init();
    let config = Config::load();

    let registry = Arc::new(ProfileRegistry::with_noop_hook());
    if let Some(path) = &config.profiles_file {
        let profiles = ncp_daemon::profiles::load_profiles(path)?;
        let count = profiles.len();
        registry.set(profiles, ApplyMode::Immediately).await?;
        tracing::info!(count, path = %path.display(), "loaded static profile overlay");
    }

    let snapshot = Arc::new(SyncMutex::new(Snapshot::new()));
    let supervisor: Arc<dyn SupervisorClient> = Arc::new(TurfClient::new(config.supervisor_binary.clone()));
    let data_plane_clients: Vec<Arc<dyn DataPlaneClient>> = vec![Arc::new(NullDataPlaneClient)];
    let name_gen: Arc<dyn NameGen> = Arc::new(DefaultNameGen);

    let launcher = Arc::new(WorkerLauncher::new(
        config.virtual_memory_pool_size,
        config.bundle_root.clone(),
        config.log_root.clone(),
        name_gen,
        Arc::new(FsBundleWriter::new()),
        config.expand_concurrency,
        config.expand_interval,
        SystemClock,
    ));
    let capacity = Arc::new(CapacityManager::new(config.virtual_memory_pool_size, config.shrink_redundant_times));
    let reconciler = Arc::new(StateReconciler::new(config.log_root.clone(), SystemClock));

    tracing::info!(
        virtual_memory_pool_size = config.virtual_memory_pool_size,
        reconcile_interval_ms = config.reconcile_interval.as_millis() as u64,
        autoscale_interval_ms = config.autoscale_interval.as_millis() as u64,
        "control plane starting"
    );

    let reconcile_task = tokio::spawn({
        let snapshot = snapshot.clone();
        let supervisor = supervisor.clone();
        let data_plane_clients = data_plane_clients.clone();
        let registry = registry.clone();
        let mut tick = interval(config.reconcile_interval);
        async move {
            loop {
                tick.tick().await;
                reconciler.tick(&snapshot, supervisor.as_ref(), &data_plane_clients, &registry).await;
            }
        }
    });

    let autoscale_task = tokio::spawn({
        let snapshot = snapshot.clone();
        let supervisor = supervisor.clone();
        let data_plane_clients = data_plane_clients.clone();
        let mut tick = interval(config.autoscale_interval);
        async move {
            loop {
                tick.tick().await;
                capacity.auto_scale(&snapshot, &registry, &launcher, supervisor.as_ref(), &data_plane_clients).await;
            }
        }
    });

    let (reconcile_result, autoscale_result) = tokio::join!(reconcile_task, autoscale_task);
    reconcile_result?;
    autoscale_result?;
    Ok(())
}
