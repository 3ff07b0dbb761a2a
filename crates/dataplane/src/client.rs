// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data-plane wire types and the `DataPlaneClient` seam (§6).

use async_trait::async_trait;
use ncp_core::{ContainerEvent, Credential, FunctionName, WorkerName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-worker request-load sample from a `workerStats` push (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub name: WorkerName,
    pub active_request_count: u32,
    pub max_activate_requests: u32,
}

/// A `ContainerStatusReport` event consumed off the fast path
/// (§4.8, applied synchronously via `Worker::update_worker_status_by_report`
/// independent of the reconcile tick).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReportEvent {
    pub function_name: FunctionName,
    pub name: WorkerName,
    pub is_inspector: bool,
    pub event: ContainerEvent,
    pub request_id: String,
}

/// One worker the shrink phase wants to drop (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceCapacityWorkerRef {
    pub name: WorkerName,
    pub credential: Credential,
}

/// One broker's slice of a `reduceCapacity` request (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceCapacityBroker {
    pub function_name: FunctionName,
    pub is_inspector: bool,
    pub workers: Vec<ReduceCapacityWorkerRef>,
}

/// Sent to every available data-plane client during the Capacity Manager's
/// shrink phase (§4.6 step 3).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReduceCapacityRequest {
    pub brokers: Vec<ReduceCapacityBroker>,
}

/// The data plane may refuse to drop some workers (in-flight requests);
/// only `confirmed` entries should actually be stopped (§4.6 step 3).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReduceCapacityResponse {
    pub confirmed: Vec<ReduceCapacityWorkerRef>,
}

#[derive(Debug, Error)]
pub enum DataPlaneError {
    #[error("data-plane call failed: {0}")]
    Transport(String),
}

/// The control plane's outbound calls to a connected data-plane process
/// (§6). `latest_stats` is a synchronous poll of whatever the transport
/// layer (out of scope here) most recently pushed, not an RPC of its own —
/// the reconciler calls it once per tick (§4.8 step 3).
#[async_trait]
pub trait DataPlaneClient: Send + Sync {
    fn latest_stats(&self) -> Vec<WorkerStats>;

    async fn reduce_capacity(
        &self,
        request: ReduceCapacityRequest,
    ) -> Result<ReduceCapacityResponse, DataPlaneError>;
}

/// Stand-in `DataPlaneClient` for processes that haven't wired up the real
/// transport yet (gRPC/HTTP framing is out of scope here, see §6). Reports
/// no telemetry and confirms nothing, so the capacity manager neither
/// expands on phantom load nor shrinks workers nothing agreed to drop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDataPlaneClient;

#[async_trait]
impl DataPlaneClient for NullDataPlaneClient {
    fn latest_stats(&self) -> Vec<WorkerStats> {
        Vec::new()
    }

    async fn reduce_capacity(
        &self,
        _request: ReduceCapacityRequest,
    ) -> Result<ReduceCapacityResponse, DataPlaneError> {
        Ok(ReduceCapacityResponse::default())
    }
}
