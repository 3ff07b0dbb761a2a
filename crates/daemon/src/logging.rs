// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide `tracing` setup (§10): a `fmt` layer filtered by `NCP_LOG`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Must be called once, before any other
/// `tracing` call, at the top of `main`.
pub fn init() {
    let filter = EnvFilter::try_new(crate::env::log_filter()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
