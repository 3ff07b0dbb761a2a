use super::*;
use crate::clock::FakeClock;
use crate::container::{ContainerEvent, ContainerStatus, SupervisorState};

fn test_worker(init_timeout_ms: u64) -> Worker {
    Worker::new(
        WorkerName::from("fn-abc123"),
        Credential::from("cred"),
        false,
        Duration::from_millis(init_timeout_ms),
        &FakeClock::new(),
    )
}

#[test]
fn starts_created_and_counts_toward_capacity_only_once_ready_or_pending_stop() {
    let worker = test_worker(1_000);
    assert_eq!(worker.status(), ContainerStatus::Created);
    assert!(!worker.counts_toward_capacity());
}

#[test]
fn set_ready_then_set_stopped_succeeds_in_order() {
    let mut worker = test_worker(1_000);
    worker.set_ready().unwrap();
    assert_eq!(worker.status(), ContainerStatus::Ready);
    assert!(worker.counts_toward_capacity());
    worker.set_stopped("drained").unwrap();
    assert_eq!(worker.status(), ContainerStatus::Stopped);
}

#[test]
fn regressive_transition_is_rejected() {
    let mut worker = test_worker(1_000);
    worker.set_ready().unwrap();
    let err = worker.update_container_status(ContainerStatus::Created, "bogus").unwrap_err();
    assert_eq!(err, CoreError::StatusRegression { from: ContainerStatus::Ready, to: ContainerStatus::Created });
    assert_eq!(worker.status(), ContainerStatus::Ready);
}

#[test]
fn update_worker_status_by_report_maps_events() {
    let mut worker = test_worker(1_000);
    worker.update_worker_status_by_report(ContainerEvent::ContainerInstalled).unwrap();
    assert_eq!(worker.status(), ContainerStatus::Ready);
    worker.update_worker_status_by_report(ContainerEvent::RequestDrained).unwrap();
    assert_eq!(worker.status(), ContainerStatus::Stopped);
}

#[test]
fn switch_to_none_stops_a_ready_worker() {
    let mut worker = test_worker(1_000);
    worker.set_ready().unwrap();
    worker.switch_to(None, Instant::now()).unwrap();
    assert_eq!(worker.status(), ContainerStatus::Stopped);
}

#[test]
fn switch_to_none_is_noop_while_still_created() {
    let mut worker = test_worker(1_000);
    worker.switch_to(None, Instant::now()).unwrap();
    assert_eq!(worker.status(), ContainerStatus::Created);
}

#[test]
fn switch_to_forkwait_is_noop() {
    let mut worker = test_worker(1_000);
    worker.switch_to(Some(SupervisorState::ForkWait), Instant::now()).unwrap();
    assert_eq!(worker.status(), ContainerStatus::Created);
}

#[test]
fn switch_to_unknown_marks_worker_unknown() {
    let mut worker = test_worker(1_000);
    worker.switch_to(Some(SupervisorState::Unknown), Instant::now()).unwrap();
    assert_eq!(worker.status(), ContainerStatus::Unknown);
}

#[test]
fn switch_to_stopping_marks_worker_stopped() {
    let mut worker = test_worker(1_000);
    worker.set_ready().unwrap();
    worker.switch_to(Some(SupervisorState::Stopping), Instant::now()).unwrap();
    assert_eq!(worker.status(), ContainerStatus::Stopped);
}

#[test]
fn switch_to_initializing_before_timeout_is_noop() {
    let worker = test_worker(10_000);
    let mut worker = worker;
    worker.switch_to(Some(SupervisorState::Starting), Instant::now()).unwrap();
    assert_eq!(worker.status(), ContainerStatus::Created);
}

#[test]
fn switch_to_initializing_past_timeout_stops_the_worker() {
    let mut worker = test_worker(10);
    let past_deadline = worker.register_time + Duration::from_millis(50);
    worker.switch_to(Some(SupervisorState::Starting), past_deadline).unwrap();
    assert_eq!(worker.status(), ContainerStatus::Stopped);
}

#[tokio::test(start_paused = true)]
async fn ready_resolves_immediately_if_already_ready() {
    let mut worker = test_worker(10_000);
    worker.set_ready().unwrap();
    assert!(worker.ready().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn ready_resolves_once_status_becomes_ready_concurrently() {
    let worker = std::sync::Arc::new(test_worker(10_000));
    let waiter = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.ready().await })
    };
    tokio::task::yield_now().await;
    worker.status_tx.send(ContainerStatus::Ready).unwrap();
    assert!(waiter.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn ready_rejects_once_stopped() {
    let mut worker = test_worker(10_000);
    worker.set_stopped("boom").unwrap();
    let err = worker.ready().await.unwrap_err();
    assert_eq!(err, WorkerInitError::AlreadyStopped);
}

#[tokio::test(start_paused = true)]
async fn ready_times_out_after_init_timeout_plus_grace() {
    let worker = test_worker(100);
    let result = worker.ready().await;
    assert_eq!(result.unwrap_err(), WorkerInitError::Timeout);
}
