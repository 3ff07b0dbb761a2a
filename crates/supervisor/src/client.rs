// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SupervisorClient` trait and wire-adjacent types (§4.1, §6).

use async_trait::async_trait;
use ncp_core::WorkerName;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Supervisor return codes referenced by §6. Negative, POSIX-style.
pub mod return_code {
    pub const ENOENT: i32 = -2;
    pub const ECHILD: i32 = -10;
    pub const EAGAIN_LINUX: i32 = -11;
    pub const EAGAIN_DARWIN: i32 = -35;
    pub const EINVAL: i32 = -22;

    pub fn is_eagain(code: i32) -> bool {
        code == EAGAIN_LINUX || code == EAGAIN_DARWIN
    }

    /// Codes `stop` treats as "already gone, so this counts as success".
    pub fn is_ignorable_on_stop(code: i32) -> bool {
        code == ECHILD || code == ENOENT
    }
}

/// Errors surfaced by a supervisor call, carrying the return code so
/// callers can filter (§4.1, §7: `SupervisorTransient` vs `SupervisorFatal`).
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to launch supervisor process: {0}")]
    Spawn(String),

    #[error("supervisor call failed with code {code}: {message}")]
    Fatal { code: i32, message: String },

    #[error("supervisor call failed transiently (EAGAIN) after exhausting retries")]
    TransientRetriesExhausted,

    #[error("malformed supervisor output: {0}")]
    MalformedOutput(String),
}

impl SupervisorError {
    /// Whether this error is retry-worthy per §7's `SupervisorTransient`
    /// classification (as opposed to `SupervisorFatal`, which surfaces).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fatal { code, .. } if return_code::is_eagain(*code))
    }
}

/// One line of `turf ps` output (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsEntry {
    pub name: WorkerName,
    pub pid: u32,
    /// Raw status string as reported by the supervisor (e.g. `running`,
    /// `stopped`); mapping into `ncp_core::SupervisorState` happens at the
    /// call site since the spec does not fix the exact vocabulary turf uses
    /// beyond the `switchTo` states it already names.
    pub status: String,
}

/// A single value from `turf state <name>` output: `pid` and `rusage.*`/
/// `stat.*` keys are numeric, everything else is a string (§6).
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Numeric(f64),
    Text(String),
}

/// Parsed `turf state <name>` record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateRecord {
    pub pid: Option<u32>,
    pub fields: HashMap<String, StateValue>,
}

/// Options accepted by `turf start` (§4.1, §6).
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub seed: Option<String>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
}

/// Drives the external container supervisor ("turf") that realizes worker
/// sandboxes as OS processes (§4.1).
#[async_trait]
pub trait SupervisorClient: Send + Sync {
    async fn create(&self, name: &WorkerName, bundle_path: &Path) -> Result<(), SupervisorError>;

    async fn start(&self, name: &WorkerName, opts: StartOptions) -> Result<(), SupervisorError>;

    /// Attempts graceful stop, retries up to 3x with force after a 1s
    /// backoff on EAGAIN, and treats ECHILD/ENOENT as success (§4.1).
    async fn stop(&self, name: &WorkerName) -> Result<(), SupervisorError>;

    async fn delete(&self, name: &WorkerName) -> Result<(), SupervisorError>;

    /// `destroy = stop; delete` (§4.1). Provided so real and fake clients
    /// don't each have to restate the composition.
    async fn destroy(&self, name: &WorkerName) -> Result<(), SupervisorError> {
        self.stop(name).await?;
        self.delete(name).await
    }

    async fn ps(&self) -> Result<Vec<PsEntry>, SupervisorError>;

    async fn state(&self, name: &WorkerName) -> Result<Option<StateRecord>, SupervisorError>;
}
