// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ncp-core: shared data model for the Noslated control plane.
//!
//! This crate has no I/O of its own. It holds the Profile/Worker/Broker
//! state machine (§3-§4 of the control plane spec) and the types every
//! other crate in the workspace shares.

pub mod clock;
pub mod container;
pub mod error;
pub mod ids;
pub mod macros;
pub mod profile;
pub mod registry;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use container::{ContainerEvent, ContainerStatus, SupervisorState};
pub use error::CoreError;
pub use ids::{Credential, DefaultNameGen, FunctionName, NameGen, WorkerName};
pub use profile::{
    ApplyMode, Profile, ProfileSource, ResourceLimit, ShrinkStrategy, WorkerProfileConfig,
};
pub use registry::{NoopPrefetchHook, ProfilePrefetchHook, ProfileRegistry};
pub use worker::{StartingPoolEntry, Worker, WorkerData, WorkerInitError, READY_GRACE};
