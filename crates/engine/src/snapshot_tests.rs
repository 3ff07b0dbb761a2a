use super::*;
use crate::broker::RegisterMeta;
use ncp_core::{ApplyMode, Credential, ProfileRegistry, SystemClock, WorkerName};
use ncp_supervisor::FakeSupervisorClient;
use std::time::Duration;

fn register_meta(name: &str, cred: &str) -> RegisterMeta {
    RegisterMeta {
        worker_name: WorkerName::from(name),
        credential: Credential::from(cred),
        disposable: false,
        init_timeout: Duration::from_secs(10),
        max_activate_requests: 10,
    }
}

async fn registry_with_profile(name: &str) -> ProfileRegistry {
    let registry = ProfileRegistry::with_noop_hook();
    registry.set(vec![ncp_core::Profile::builder().name(name).build()], ApplyMode::Immediately).await.unwrap();
    registry
}

#[tokio::test]
async fn register_creates_broker_lazily() {
    let mut snapshot = Snapshot::new();
    let registry = registry_with_profile("func").await;
    let profile = registry.get(&FunctionName::from("func"));

    snapshot
        .register(FunctionName::from("func"), false, profile, register_meta("func-1", "cred-1"), &SystemClock)
        .unwrap();

    assert_eq!(snapshot.broker(&FunctionName::from("func"), false).unwrap().worker_count(), 1);
}

#[tokio::test]
async fn sync_ignores_entries_for_unknown_brokers() {
    let mut snapshot = Snapshot::new();
    let registry = registry_with_profile("func").await;
    let entries = vec![BrokerStatsEntry { function_name: FunctionName::from("ghost"), is_inspector: false, workers: vec![] }];
    // No broker named "ghost" exists; sync must not panic or create one.
    snapshot.sync(&entries, &registry);
    assert!(snapshot.broker(&FunctionName::from("ghost"), false).is_none());
}

#[tokio::test]
async fn correct_unregisters_stopped_workers_and_emits_events() {
    let mut snapshot = Snapshot::new();
    let registry = registry_with_profile("func").await;
    let profile = registry.get(&FunctionName::from("func"));
    snapshot
        .register(FunctionName::from("func"), false, profile, register_meta("func-1", "cred-1"), &SystemClock)
        .unwrap();
    snapshot
        .broker_mut(&FunctionName::from("func"), false)
        .unwrap()
        .worker_mut(&WorkerName::from("func-1"))
        .unwrap()
        .set_stopped("test")
        .unwrap();

    let supervisor = FakeSupervisorClient::new();
    let events = snapshot.correct(&supervisor).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].worker_name, WorkerName::from("func-1"));
    assert_eq!(supervisor.destroyed(), vec![WorkerName::from("func-1")]);
}

#[tokio::test]
async fn correct_is_idempotent_with_no_changes() {
    let mut snapshot = Snapshot::new();
    let registry = registry_with_profile("func").await;
    let profile = registry.get(&FunctionName::from("func"));
    snapshot
        .register(FunctionName::from("func"), false, profile, register_meta("func-1", "cred-1"), &SystemClock)
        .unwrap();
    snapshot
        .broker_mut(&FunctionName::from("func"), false)
        .unwrap()
        .worker_mut(&WorkerName::from("func-1"))
        .unwrap()
        .set_stopped("test")
        .unwrap();

    let supervisor = FakeSupervisorClient::new();
    let first = snapshot.correct(&supervisor).await;
    let second = snapshot.correct(&supervisor).await;
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}

#[tokio::test]
async fn correct_drops_empty_profileless_broker() {
    let mut snapshot = Snapshot::new();
    let registry = registry_with_profile("func").await;
    let profile = registry.get(&FunctionName::from("func"));
    snapshot
        .register(FunctionName::from("func"), false, profile, register_meta("func-1", "cred-1"), &SystemClock)
        .unwrap();
    snapshot
        .broker_mut(&FunctionName::from("func"), false)
        .unwrap()
        .worker_mut(&WorkerName::from("func-1"))
        .unwrap()
        .set_stopped("drain")
        .unwrap();
    snapshot.broker_mut(&FunctionName::from("func"), false).unwrap().profile = None;

    let supervisor = FakeSupervisorClient::new();
    snapshot.correct(&supervisor).await;
    assert!(snapshot.broker(&FunctionName::from("func"), false).is_none());
}

#[tokio::test]
async fn to_protobuf_object_round_trips_broker_worker_and_starting_pool_contents() {
    let mut snapshot = Snapshot::new();
    let registry = registry_with_profile("func").await;
    let profile = registry.get(&FunctionName::from("func"));
    snapshot
        .register(FunctionName::from("func"), false, profile, register_meta("func-1", "cred-1"), &SystemClock)
        .unwrap();

    let summary = snapshot.to_protobuf_object();
    assert_eq!(summary.brokers.len(), 1);
    let broker = &summary.brokers[0];
    assert_eq!(broker.function_name, FunctionName::from("func"));
    assert_eq!(broker.workers.len(), 1);
    assert_eq!(broker.workers[0].name, WorkerName::from("func-1"));
    assert_eq!(broker.starting_pool.len(), 1);
    assert_eq!(broker.starting_pool[0].estimate_request_left, 10);

    let serialized = serde_json::to_string(&summary).unwrap();
    let rebuilt: SnapshotSummary = serde_json::from_str(&serialized).unwrap();
    assert_eq!(rebuilt, summary);
}
