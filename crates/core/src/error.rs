// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised by the core data model itself (as opposed to adapters).

use crate::container::ContainerStatus;
use crate::ids::FunctionName;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("container status regression rejected: {from} -> {to}")]
    StatusRegression { from: ContainerStatus, to: ContainerStatus },

    #[error("no profile registered for function {0}")]
    ProfileNotFound(FunctionName),
}
