use super::*;
use crate::broker::RegisterMeta;
use crate::test_support::EngineHarness;
use ncp_core::{Credential, FunctionName, Profile, ShrinkStrategy, WorkerName, WorkerProfileConfig};
use ncp_dataplane::{ReduceCapacityResponse, ReduceCapacityWorkerRef, WorkerStats};

fn profile_with(memory_bytes: u64, replica_count_limit: u32, reservation_count: u32) -> Profile {
    Profile::builder()
        .name("func")
        .resource_limit(ncp_core::ResourceLimit { memory_bytes, cpu_fraction: 1.0 })
        .worker(WorkerProfileConfig {
            max_activate_requests: 10,
            replica_count_limit,
            reservation_count,
            shrink_strategy: ShrinkStrategy::Lcc,
            initialization_timeout_ms: 10_000,
            v8_options: vec![],
            exec_argv: vec![],
            fast_fail_requests_on_starting: false,
            disposable: false,
        })
        .build()
}

/// Registers a worker directly and flips it to `Ready` with the given
/// load, bypassing `WorkerLauncher` — this module exercises `CapacityManager`
/// logic against an already-steady-state `Snapshot`, not the launch path
/// (covered separately in `launcher_tests.rs`).
fn seed_ready_worker(
    harness: &EngineHarness,
    function_name: &FunctionName,
    worker_label: &str,
    active_request_count: u32,
    max_activate_requests: u32,
) {
    let profile = harness.registry.get(function_name).expect("profile must be set first");
    let worker_name = WorkerName::from(worker_label);
    let meta = RegisterMeta {
        worker_name: worker_name.clone(),
        credential: Credential::from(format!("cred-{worker_label}")),
        disposable: false,
        init_timeout: std::time::Duration::from_secs(10),
        max_activate_requests,
    };
    {
        let mut guard = harness.snapshot.lock();
        guard.register(function_name.clone(), false, Some(profile.clone()), meta, &harness.clock).unwrap();
        guard.broker_mut(function_name, false).unwrap().worker_mut(&worker_name).unwrap().set_ready().unwrap();
    }
    let stats = vec![WorkerStats { name: worker_name, active_request_count, max_activate_requests }];
    harness.snapshot.lock().broker_mut(function_name, false).unwrap().sync(&stats, Some(profile));
}

#[test]
fn virtual_memory_used_sums_only_capacity_counting_workers() {
    let harness = EngineHarness::new(1 << 30, 60);
    assert_eq!(virtual_memory_used(&harness.snapshot.lock()), 0);
}

#[tokio::test]
async fn auto_scale_expands_a_starved_broker() {
    let harness = EngineHarness::new(1 << 30, 60);
    let function_name = FunctionName::from("func");
    harness.set_profile(profile_with(1 << 20, 10, 0)).await;
    // One ready worker saturated above the 0.8 water-level threshold.
    seed_ready_worker(&harness, &function_name, "func-0", 9, 10);

    let report = harness
        .capacity
        .auto_scale(
            &harness.snapshot,
            &harness.registry,
            &harness.launcher,
            harness.supervisor.as_ref(),
            &harness.data_plane_clients(),
        )
        .await;

    assert!(!report.launched.is_empty());
    let (_, _, launched_count) = report.launched[0];
    assert!(launched_count > 0);
}

#[tokio::test]
async fn auto_scale_clamps_expansion_to_the_pool_budget() {
    // Budget only covers one more worker's worth of memory even though the
    // broker's own water-level math would ask for more.
    let memory_bytes = 1 << 20;
    let harness = EngineHarness::new(memory_bytes, 60);
    let function_name = FunctionName::from("func");
    harness.set_profile(profile_with(memory_bytes, 10, 0)).await;
    seed_ready_worker(&harness, &function_name, "func-0", 10, 10);

    let report = harness
        .capacity
        .auto_scale(
            &harness.snapshot,
            &harness.registry,
            &harness.launcher,
            harness.supervisor.as_ref(),
            &harness.data_plane_clients(),
        )
        .await;

    // The existing ready worker already consumes the whole budget, so the
    // clamp should reduce the requested expansion to zero launches.
    if let Some((_, _, launched_count)) = report.launched.first() {
        assert_eq!(*launched_count, 0);
    }
    assert!(report.errors.iter().any(|e| e.contains("budget exhausted")));
}

#[tokio::test]
async fn auto_scale_only_stops_workers_the_data_plane_confirms() {
    let harness = EngineHarness::new(1 << 30, 0);
    let function_name = FunctionName::from("func");
    harness.set_profile(profile_with(1 << 20, 10, 0)).await;
    // Three idle, over-provisioned ready workers: water level near zero
    // with worker_count (3) > reservation (0) triggers a shrink delta.
    for i in 0..3 {
        seed_ready_worker(&harness, &function_name, &format!("func-{i}"), 0, 10);
    }

    // Data plane only confirms one of the drawn victims.
    let confirmed_name = {
        let guard = harness.snapshot.lock();
        let broker = guard.broker(&function_name, false).unwrap();
        broker.workers().next().unwrap().0.clone()
    };
    harness.data_plane.queue_reduce_response(ReduceCapacityResponse {
        confirmed: vec![ReduceCapacityWorkerRef {
            name: confirmed_name.clone(),
            credential: Credential::from(format!("cred-{}", confirmed_name.as_str())),
        }],
    });

    let report = harness
        .capacity
        .auto_scale(
            &harness.snapshot,
            &harness.registry,
            &harness.launcher,
            harness.supervisor.as_ref(),
            &harness.data_plane_clients(),
        )
        .await;

    assert_eq!(report.stopped, vec![confirmed_name]);
    assert_eq!(harness.data_plane.reduce_requests().len(), 1);
}

#[tokio::test]
async fn auto_scale_cycles_serialize_via_the_cycle_lock() {
    let harness = EngineHarness::new(1 << 30, 60);
    let function_name = FunctionName::from("func");
    harness.set_profile(profile_with(1 << 20, 10, 0)).await;

    // Two concurrent calls should both complete cleanly (the second
    // waiting behind `cycle_lock`) rather than racing on the same
    // `Snapshot` state.
    let (a, b) = tokio::join!(
        harness.capacity.auto_scale(
            &harness.snapshot,
            &harness.registry,
            &harness.launcher,
            harness.supervisor.as_ref(),
            &harness.data_plane_clients(),
        ),
        harness.capacity.auto_scale(
            &harness.snapshot,
            &harness.registry,
            &harness.launcher,
            harness.supervisor.as_ref(),
            &harness.data_plane_clients(),
        ),
    );
    // With no brokers registered yet, both cycles are no-ops.
    assert!(a.launched.is_empty());
    assert!(b.launched.is_empty());
}
