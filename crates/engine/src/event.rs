// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed event bus (§9 design note: "replace emitters with a typed event
//! bus, since events carry structured payloads").

use ncp_core::{Credential, FunctionName, WorkerName};

/// Emitted by `Snapshot::correct` for every worker it unregisters (§4.5,
/// §4.8). Carries the fields a caller needs to schedule log-dir GC and
/// tell the data plane the replica is gone, without re-reading Snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStoppedEvent {
    pub function_name: FunctionName,
    pub is_inspector: bool,
    pub worker_name: WorkerName,
    pub credential: Credential,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    WorkerStopped(WorkerStoppedEvent),
}
