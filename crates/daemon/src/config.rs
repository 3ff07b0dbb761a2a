// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: the env-var surface (§6, §10) collected into one
//! struct the rest of `main` wires up from.

use crate::env;
use ncp_core::ShrinkStrategy;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon-wide configuration, loaded once at startup from environment
/// variables (§6's recognized configuration keys plus the ambient knobs
/// `ncp-daemon` itself needs — bundle/log roots, the `turf` binary path).
#[derive(Debug, Clone)]
pub struct Config {
    pub virtual_memory_pool_size: u64,
    pub default_max_activate_requests: u32,
    pub default_replica_count_limit: u32,
    pub default_reservation_count: u32,
    pub shrink_redundant_times: u32,
    pub default_shrink_strategy: ShrinkStrategy,
    pub default_init_timeout_ms: u64,
    pub expand_concurrency: usize,
    pub expand_interval: Duration,
    pub graceful_exit_period: Duration,
    pub reconcile_interval: Duration,
    pub autoscale_interval: Duration,
    pub bundle_root: PathBuf,
    pub log_root: PathBuf,
    pub supervisor_binary: PathBuf,
    pub profiles_file: Option<PathBuf>,
}

impl Config {
    /// Read every recognized environment variable, falling back to the
    /// defaults documented in `env.rs` for anything unset.
    pub fn load() -> Self {
        Self {
            virtual_memory_pool_size: env::virtual_memory_pool_size(),
            default_max_activate_requests: env::default_max_activate_requests(),
            default_replica_count_limit: env::default_replica_count_limit(),
            default_reservation_count: env::default_reservation_count(),
            shrink_redundant_times: env::shrink_redundant_times(),
            default_shrink_strategy: env::default_shrink_strategy(),
            default_init_timeout_ms: env::default_init_timeout_ms(),
            expand_concurrency: env::expand_concurrency(),
            expand_interval: env::expand_interval(),
            graceful_exit_period: env::graceful_exit_period(),
            reconcile_interval: env::reconcile_interval(),
            autoscale_interval: env::autoscale_interval(),
            bundle_root: env::bundle_root(),
            log_root: env::log_root(),
            supervisor_binary: env::supervisor_binary(),
            profiles_file: env::profiles_file(),
        }
    }
}
