// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abstract error kinds raised by the reconciliation loop and scheduler (§7).

use ncp_core::{CoreError, FunctionName, WorkerInitError};
use ncp_dataplane::DataPlaneError;
use ncp_supervisor::SupervisorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no profile registered for function {0}")]
    NoFunction(FunctionName),

    #[error("launch would exceed virtual memory pool budget")]
    NoEnoughVirtualMemory,

    #[error("failed to ensure code bundle present: {0}")]
    EnsureCodeFailed(String),

    #[error("invalid v8 option: {0}")]
    InvalidV8Option(String),

    /// Retry-worthy per §7 (EAGAIN exhausted or a fatal code carrying EAGAIN).
    #[error("supervisor call failed transiently: {0}")]
    SupervisorTransient(#[source] SupervisorError),

    /// Surfaces to the caller per §7 (non-retryable supervisor failure).
    #[error("supervisor call failed: {0}")]
    SupervisorFatal(#[source] SupervisorError),

    #[error("worker initialization timed out")]
    WorkerInitTimeout,

    #[error("worker stopped unexpectedly before becoming ready")]
    WorkerStoppedUnexpected,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    DataPlane(#[from] DataPlaneError),
}

impl From<SupervisorError> for EngineError {
    fn from(err: SupervisorError) -> Self {
        if err.is_transient() {
            Self::SupervisorTransient(err)
        } else {
            Self::SupervisorFatal(err)
        }
    }
}

impl From<WorkerInitError> for EngineError {
    fn from(err: WorkerInitError) -> Self {
        match err {
            WorkerInitError::Timeout => Self::WorkerInitTimeout,
            WorkerInitError::AlreadyStopped | WorkerInitError::Stopped | WorkerInitError::Closed => {
                Self::WorkerStoppedUnexpected
            }
        }
    }
}
