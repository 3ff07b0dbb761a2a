// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ncp-engine: the reconciliation loop and scheduler.
//!
//! Worker/Broker/Snapshot (C3-C5) aggregate supervisor and data-plane
//! telemetry into scheduling state; the Capacity Manager (C6) and Worker
//! Launcher (C7) act on it to keep each function's replica count matched
//! to load; the State Reconciler (C8) is what drives both every tick.

pub mod broker;
pub mod capacity;
pub mod error;
pub mod event;
pub mod launcher;
pub mod reconciler;
pub mod snapshot;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use broker::{Broker, RegisterMeta};
pub use capacity::{virtual_memory_used, AutoScaleReport, CapacityManager};
pub use error::EngineError;
pub use event::{EngineEvent, WorkerStoppedEvent};
pub use launcher::{BundleWriter, FsBundleWriter, LaunchOptions, WorkerLauncher};
pub use reconciler::StateReconciler;
pub use snapshot::{BrokerStatsEntry, BrokerSummary, Snapshot, SnapshotSummary, StartingPoolSummary, WorkerSummary};

#[cfg(any(test, feature = "test-support"))]
pub use launcher::FakeBundleWriter;
