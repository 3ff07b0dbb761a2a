// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ncp-dataplane: data-plane RPC surface consumed by the control plane
//! (§6).
//!
//! Transport (gRPC/HTTP/whatever actually carries these bytes) is out of
//! scope; this crate only defines the message shapes and the
//! `DataPlaneClient` seam the engine calls through.

pub mod client;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use client::{
    DataPlaneClient, DataPlaneError, NullDataPlaneClient, ReduceCapacityBroker,
    ReduceCapacityRequest, ReduceCapacityResponse, ReduceCapacityWorkerRef, StatusReportEvent,
    WorkerStats,
};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDataPlaneClient;
