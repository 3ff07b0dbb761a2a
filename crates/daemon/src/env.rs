// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate (§6, §10).

use ncp_core::ShrinkStrategy;
use std::path::PathBuf;
use std::time::Duration;

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok()).unwrap_or(default)
}

fn duration_ms_var(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(parse_var(key, default_ms))
}

/// Global virtual-memory budget (§6 `virtualMemoryPoolSize`). Default 4 GiB.
pub fn virtual_memory_pool_size() -> u64 {
    parse_var("NCP_VIRTUAL_MEMORY_POOL_BYTES", 4 << 30)
}

/// Default per-worker concurrency (§6 `worker.maxActivateRequests`).
pub fn default_max_activate_requests() -> u32 {
    parse_var("NCP_DEFAULT_MAX_ACTIVATE_REQUESTS", 10)
}

/// Default per-function replica cap (§6 `worker.replicaCountLimit`).
pub fn default_replica_count_limit() -> u32 {
    parse_var("NCP_DEFAULT_REPLICA_COUNT_LIMIT", 10)
}

/// Minimum replicas kept post-shrink (§6 `worker.reservationCount`).
pub fn default_reservation_count() -> u32 {
    parse_var("NCP_DEFAULT_RESERVATION_COUNT", 0)
}

/// Consecutive shrink-eligible evaluations required before a shrink fires
/// (§6 `worker.shrinkRedundantTimes`; S4 uses 60).
pub fn shrink_redundant_times() -> u32 {
    parse_var("NCP_SHRINK_REDUNDANT_TIMES", 60)
}

fn parse_shrink_strategy(raw: &str) -> ShrinkStrategy {
    match raw.to_ascii_uppercase().as_str() {
        "LCC" => ShrinkStrategy::Lcc,
        "FIFO" => ShrinkStrategy::Fifo,
        "FILO" => ShrinkStrategy::Filo,
        other => {
            tracing::warn!(strategy = other, "unknown NCP_DEFAULT_SHRINK_STRATEGY, falling back to LCC");
            ShrinkStrategy::Lcc
        }
    }
}

/// Fallback victim-selection policy (§6 `worker.defaultShrinkStrategy`).
/// Unrecognized values fall back to `Lcc` with a warning, same as a
/// profile's own `shrinkStrategy` field (§9 Open Question).
pub fn default_shrink_strategy() -> ShrinkStrategy {
    std::env::var("NCP_DEFAULT_SHRINK_STRATEGY").map(|raw| parse_shrink_strategy(&raw)).unwrap_or(ShrinkStrategy::Lcc)
}

/// Default initializer timeout τ (§6 `worker.defaultInitializerTimeout`).
pub fn default_init_timeout_ms() -> u64 {
    parse_var("NCP_DEFAULT_INIT_TIMEOUT_MS", 10_000)
}

/// Bounded concurrency on launches (§6 `controlPlane.expandConcurrency`).
pub fn expand_concurrency() -> usize {
    parse_var("NCP_EXPAND_CONCURRENCY", 2)
}

/// Spacing between individual launches within a batch
/// (§6 `controlPlane.expandInterval`).
pub fn expand_interval() -> Duration {
    duration_ms_var("NCP_EXPAND_INTERVAL_MS", 0)
}

/// Upper bound on disposable-worker shutdown (§6 `turf.gracefulExitPeriodMs`).
pub fn graceful_exit_period() -> Duration {
    duration_ms_var("NCP_GRACEFUL_EXIT_PERIOD_MS", 5_000)
}

/// Interval between State Reconciler ticks (§4.8).
pub fn reconcile_interval() -> Duration {
    duration_ms_var("NCP_RECONCILE_INTERVAL_MS", 1_000)
}

/// Interval between Capacity Manager `autoScale` cycles (§4.6).
pub fn autoscale_interval() -> Duration {
    duration_ms_var("NCP_AUTOSCALE_INTERVAL_MS", 1_000)
}

/// Root directory the Worker Launcher writes OCI bundles under (§6).
pub fn bundle_root() -> PathBuf {
    std::env::var("NCP_BUNDLE_ROOT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/var/lib/ncp/bundles"))
}

/// Root directory worker stdout/stderr logs are written under and later
/// garbage-collected from (§3 "Sandbox log directories are GC'd").
pub fn log_root() -> PathBuf {
    std::env::var("NCP_LOG_ROOT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/var/lib/ncp/logs"))
}

/// Path to the `turf` supervisor binary (§4.1, §6).
pub fn supervisor_binary() -> PathBuf {
    std::env::var("NCP_TURF_BINARY").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("turf"))
}

/// Optional static-profile bootstrap overlay (not part of §6's recognized
/// keys; a convenience for running the daemon without a separate profile
/// distribution channel, same role as the teacher's config-file overlays).
pub fn profiles_file() -> Option<PathBuf> {
    std::env::var("NCP_PROFILES_FILE").ok().map(PathBuf::from)
}

/// `tracing-subscriber` `EnvFilter` directive (§10).
pub fn log_filter() -> String {
    std::env::var("NCP_LOG").unwrap_or_else(|_| "info".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        // SAFETY-equivalent: these vars are not set in the test process
        // unless another test in this binary happens to set them, which
        // none do.
        assert_eq!(virtual_memory_pool_size(), 4 << 30);
        assert_eq!(default_max_activate_requests(), 10);
        assert_eq!(shrink_redundant_times(), 60);
        assert_eq!(default_shrink_strategy(), ShrinkStrategy::Lcc);
        assert_eq!(reconcile_interval(), Duration::from_secs(1));
    }

    #[test]
    fn unknown_shrink_strategy_falls_back_to_lcc() {
        assert_eq!(parse_shrink_strategy("round_robin"), ShrinkStrategy::Lcc);
    }

    #[test]
    fn known_shrink_strategies_parse_case_insensitively() {
        assert_eq!(parse_shrink_strategy("fifo"), ShrinkStrategy::Fifo);
        assert_eq!(parse_shrink_strategy("FILO"), ShrinkStrategy::Filo);
    }
}
