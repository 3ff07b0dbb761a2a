// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised while assembling or running the daemon, as opposed to the
//! reconciliation errors already modeled in `ncp_engine::EngineError`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to read profiles file {0}: {1}")]
    ProfilesRead(PathBuf, std::io::Error),

    #[error("failed to parse profiles file {0}: {1}")]
    ProfilesParse(PathBuf, toml::de::Error),

    #[error(transparent)]
    Profiles(#[from] ncp_core::registry::PrefetchError),
}
