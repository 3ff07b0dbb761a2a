// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ncp-supervisor: Supervisor Client (C1, §4.1, §6).
//!
//! Wraps the external `turf` container supervisor: a CLI/socket process
//! manager that actually creates, starts, and tears down worker sandboxes.
//! This crate only knows how to drive that process and parse its output;
//! it has no opinion about when to call it — that's the State Reconciler
//! and Worker Launcher's job (`ncp-engine`).

pub mod client;
pub mod turf;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use client::{
    PsEntry, StartOptions, StateRecord, StateValue, SupervisorClient, SupervisorError,
};
pub use turf::TurfClient;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSupervisorClient;
