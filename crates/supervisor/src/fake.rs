// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `SupervisorClient` for engine/daemon tests.

use crate::client::{PsEntry, StartOptions, StateRecord, SupervisorClient, SupervisorError};
use async_trait::async_trait;
use ncp_core::WorkerName;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A call recorded by `FakeSupervisorClient`, for asserting what the
/// engine actually told the supervisor to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(WorkerName),
    Start(WorkerName),
    Stop(WorkerName),
    Delete(WorkerName),
}

/// A canned failure for a specific worker/operation pair.
#[derive(Debug, Clone)]
pub struct FakeFailure {
    pub code: i32,
    pub message: String,
}

impl From<FakeFailure> for SupervisorError {
    fn from(f: FakeFailure) -> Self {
        SupervisorError::Fatal { code: f.code, message: f.message }
    }
}

#[derive(Default)]
struct Inner {
    ps_entries: Vec<PsEntry>,
    states: HashMap<WorkerName, StateRecord>,
    calls: Vec<Call>,
    create_failures: HashMap<WorkerName, FakeFailure>,
    stop_failures: HashMap<WorkerName, FakeFailure>,
}

/// Test double driven entirely in memory: `ps`/`state` return whatever was
/// last configured, `create`/`start`/`stop`/`delete` succeed unless a
/// failure was pre-armed for that worker, and every call is recorded.
#[derive(Default)]
pub struct FakeSupervisorClient {
    inner: Mutex<Inner>,
}

impl FakeSupervisorClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ps(&self, entries: Vec<PsEntry>) {
        self.inner.lock().ps_entries = entries;
    }

    pub fn set_state(&self, name: WorkerName, record: StateRecord) {
        self.inner.lock().states.insert(name, record);
    }

    pub fn fail_create(&self, name: WorkerName, code: i32, message: impl Into<String>) {
        self.inner.lock().create_failures.insert(name, FakeFailure { code, message: message.into() });
    }

    pub fn fail_stop(&self, name: WorkerName, code: i32, message: impl Into<String>) {
        self.inner.lock().stop_failures.insert(name, FakeFailure { code, message: message.into() });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub fn destroyed(&self) -> Vec<WorkerName> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Delete(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SupervisorClient for FakeSupervisorClient {
    async fn create(
        &self,
        name: &WorkerName,
        _bundle_path: &std::path::Path,
    ) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Create(name.clone()));
        if let Some(failure) = inner.create_failures.remove(name) {
            return Err(failure.into());
        }
        Ok(())
    }

    async fn start(&self, name: &WorkerName, _opts: StartOptions) -> Result<(), SupervisorError> {
        self.inner.lock().calls.push(Call::Start(name.clone()));
        Ok(())
    }

    async fn stop(&self, name: &WorkerName) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Stop(name.clone()));
        if let Some(failure) = inner.stop_failures.remove(name) {
            return Err(failure.into());
        }
        Ok(())
    }

    async fn delete(&self, name: &WorkerName) -> Result<(), SupervisorError> {
        self.inner.lock().calls.push(Call::Delete(name.clone()));
        Ok(())
    }

    async fn ps(&self) -> Result<Vec<PsEntry>, SupervisorError> {
        Ok(self.inner.lock().ps_entries.clone())
    }

    async fn state(&self, name: &WorkerName) -> Result<Option<StateRecord>, SupervisorError> {
        Ok(self.inner.lock().states.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn destroy_composes_stop_then_delete() {
        let client = FakeSupervisorClient::new();
        let name = WorkerName::from("hello-abc");
        client.destroy(&name).await.unwrap();
        assert_eq!(client.calls(), vec![Call::Stop(name.clone()), Call::Delete(name)]);
    }

    #[tokio::test]
    async fn armed_failure_surfaces_once_then_clears() {
        let client = FakeSupervisorClient::new();
        let name = WorkerName::from("hello-abc");
        client.fail_create(name.clone(), -22, "bad spec");
        let err = client.create(&name, std::path::Path::new("/tmp/bundle")).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Fatal { code: -22, .. }));
        client.create(&name, std::path::Path::new("/tmp/bundle")).await.unwrap();
    }
}
