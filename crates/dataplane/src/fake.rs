// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `DataPlaneClient` for engine/daemon tests.

use crate::client::{
    DataPlaneClient, DataPlaneError, ReduceCapacityRequest, ReduceCapacityResponse, WorkerStats,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Default)]
struct Inner {
    stats: Vec<WorkerStats>,
    reduce_requests: Vec<ReduceCapacityRequest>,
    scripted_responses: VecDeque<ReduceCapacityResponse>,
}

/// `latest_stats()` returns whatever was last set via `set_stats`.
/// `reduce_capacity` returns the next scripted response if one was queued,
/// otherwise confirms every worker the caller asked to drop — the
/// permissive default most tests want.
#[derive(Default)]
pub struct FakeDataPlaneClient {
    inner: Mutex<Inner>,
}

impl FakeDataPlaneClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stats(&self, stats: Vec<WorkerStats>) {
        self.inner.lock().stats = stats;
    }

    pub fn queue_reduce_response(&self, response: ReduceCapacityResponse) {
        self.inner.lock().scripted_responses.push_back(response);
    }

    pub fn reduce_requests(&self) -> Vec<ReduceCapacityRequest> {
        self.inner.lock().reduce_requests.clone()
    }
}

#[async_trait]
impl DataPlaneClient for FakeDataPlaneClient {
    fn latest_stats(&self) -> Vec<WorkerStats> {
        self.inner.lock().stats.clone()
    }

    async fn reduce_capacity(
        &self,
        request: ReduceCapacityRequest,
    ) -> Result<ReduceCapacityResponse, DataPlaneError> {
        let mut inner = self.inner.lock();
        inner.reduce_requests.push(request.clone());
        if let Some(response) = inner.scripted_responses.pop_front() {
            return Ok(response);
        }
        Ok(ReduceCapacityResponse {
            confirmed: request.brokers.into_iter().flat_map(|b| b.workers).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ReduceCapacityBroker, ReduceCapacityWorkerRef};
    use ncp_core::{Credential, FunctionName, WorkerName};

    #[tokio::test]
    async fn default_response_confirms_every_requested_worker() {
        let client = FakeDataPlaneClient::new();
        let request = ReduceCapacityRequest {
            brokers: vec![ReduceCapacityBroker {
                function_name: FunctionName::from("func"),
                is_inspector: false,
                workers: vec![ReduceCapacityWorkerRef {
                    name: WorkerName::from("func-1"),
                    credential: Credential::from("cred-1"),
                }],
            }],
        };
        let response = client.reduce_capacity(request.clone()).await.unwrap();
        assert_eq!(response.confirmed.len(), 1);
        assert_eq!(client.reduce_requests(), vec![request]);
    }

    #[tokio::test]
    async fn scripted_response_overrides_default() {
        let client = FakeDataPlaneClient::new();
        client.queue_reduce_response(ReduceCapacityResponse { confirmed: vec![] });
        let response = client.reduce_capacity(ReduceCapacityRequest::default()).await.unwrap();
        assert!(response.confirmed.is_empty());
    }
}
