// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Function profile data model (§3).

use crate::ids::FunctionName;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Resource limits applied to a worker's sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimit {
    pub memory_bytes: u64,
    pub cpu_fraction: f64,
}

/// Victim-selection policy used by `Broker::shrink_draw` (§4.4).
///
/// Deserializing an unrecognized string falls back to `Lcc` with a warning
/// rather than rejecting the profile at ingestion — preserved verbatim from
/// the source system per the spec's Open Questions (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShrinkStrategy {
    /// Lowest active-request-count, tiebreak by credential.
    Lcc,
    /// Smallest register time (first in, first out).
    Fifo,
    /// Largest register time (first in, last out).
    Filo,
}

impl Default for ShrinkStrategy {
    fn default() -> Self {
        Self::Lcc
    }
}

impl<'de> Deserialize<'de> for ShrinkStrategy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_uppercase().as_str() {
            "LCC" => Self::Lcc,
            "FIFO" => Self::Fifo,
            "FILO" => Self::Filo,
            other => {
                tracing::warn!(strategy = other, "unknown shrink strategy, falling back to LCC");
                Self::Lcc
            }
        })
    }
}

/// Where a function's code comes from (mutually exclusive per §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    SourceFile(String),
    Handler(String),
}

/// Per-function worker sizing and lifecycle policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfileConfig {
    pub max_activate_requests: u32,
    pub replica_count_limit: u32,
    pub reservation_count: u32,
    #[serde(default)]
    pub shrink_strategy: ShrinkStrategy,
    pub initialization_timeout_ms: u64,
    #[serde(default)]
    pub v8_options: Vec<String>,
    #[serde(default)]
    pub exec_argv: Vec<String>,
    #[serde(default)]
    pub fast_fail_requests_on_starting: bool,
    #[serde(default)]
    pub disposable: bool,
}

/// Immutable function profile (§3). Full profile sets are replaced
/// atomically by the Profile Registry (§4.2); individual profiles are never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: FunctionName,
    pub runtime: String,
    pub url: String,
    #[serde(default)]
    pub signature: Option<String>,
    pub source: ProfileSource,
    pub resource_limit: ResourceLimit,
    pub worker: WorkerProfileConfig,
    #[serde(default)]
    pub environments: Vec<(String, String)>,
}

/// How `ProfileRegistry::set` should resolve relative to the pluggable
/// pre-fetch hook (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// `set` resolves before the pre-fetch hook completes.
    Immediately,
    /// `set` resolves only after the pre-fetch hook completes.
    Wait,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_shrink_strategy_falls_back_to_lcc() {
        let parsed: ShrinkStrategy = serde_json::from_str("\"round_robin\"").unwrap();
        assert_eq!(parsed, ShrinkStrategy::Lcc);
    }

    #[test]
    fn known_shrink_strategies_round_trip() {
        for raw in ["LCC", "FIFO", "FILO", "lcc", "fifo", "filo"] {
            let parsed: ShrinkStrategy = serde_json::from_str(&format!("\"{raw}\"")).unwrap();
            assert_eq!(
                parsed,
                match raw.to_ascii_uppercase().as_str() {
                    "LCC" => ShrinkStrategy::Lcc,
                    "FIFO" => ShrinkStrategy::Fifo,
                    _ => ShrinkStrategy::Filo,
                }
            );
        }
    }
}
