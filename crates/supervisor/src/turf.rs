// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real `SupervisorClient` backed by the `turf` CLI (§4.1, §6).

use crate::client::{return_code, PsEntry, StartOptions, StateRecord, StateValue, SupervisorClient};
use crate::SupervisorError;
use async_trait::async_trait;
use ncp_core::WorkerName;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::Instrument;

const STOP_RETRY_BACKOFF: Duration = Duration::from_secs(1);
const STOP_MAX_RETRIES: u32 = 3;

/// Shells out to the `turf` binary for every operation. One client is
/// shared across the whole process; turf itself serializes concurrent
/// calls against the same sandbox.
#[derive(Debug, Clone)]
pub struct TurfClient {
    binary: PathBuf,
}

impl TurfClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for TurfClient {
    fn default() -> Self {
        Self::new("turf")
    }
}

struct RawOutput {
    code: i32,
    stdout: String,
    stderr: String,
}

impl TurfClient {
    async fn run(&self, args: &[&str]) -> Result<RawOutput, SupervisorError> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| SupervisorError::Spawn(e.to_string()))?;
        Ok(RawOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl SupervisorClient for TurfClient {
    async fn create(&self, name: &WorkerName, bundle_path: &Path) -> Result<(), SupervisorError> {
        let span = tracing::info_span!("supervisor.create", worker = %name);
        async {
            let start = std::time::Instant::now();
            let bundle = bundle_path.to_string_lossy().into_owned();
            let out = self.run(&["create", "-b", &bundle, name.as_str()]).await?;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            if out.code != 0 {
                tracing::error!(elapsed_ms, code = out.code, "create failed");
                return Err(SupervisorError::Fatal { code: out.code, message: out.stderr });
            }
            tracing::info!(elapsed_ms, "worker created");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn start(&self, name: &WorkerName, opts: StartOptions) -> Result<(), SupervisorError> {
        let span = tracing::info_span!("supervisor.start", worker = %name);
        async {
            let start = std::time::Instant::now();
            let mut args: Vec<String> = vec!["start".to_string()];
            if let Some(seed) = &opts.seed {
                args.push("--seed".to_string());
                args.push(seed.clone());
            }
            if let Some(path) = &opts.stdout_path {
                args.push("--stdout".to_string());
                args.push(path.to_string_lossy().into_owned());
            }
            if let Some(path) = &opts.stderr_path {
                args.push("--stderr".to_string());
                args.push(path.to_string_lossy().into_owned());
            }
            args.push(name.as_str().to_string());
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let out = self.run(&arg_refs).await?;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            if out.code != 0 {
                tracing::error!(elapsed_ms, code = out.code, "start failed");
                return Err(SupervisorError::Fatal { code: out.code, message: out.stderr });
            }
            tracing::info!(elapsed_ms, "worker started");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn stop(&self, name: &WorkerName) -> Result<(), SupervisorError> {
        let span = tracing::info_span!("supervisor.stop", worker = %name);
        async {
            let out = self.run(&["stop", name.as_str()]).await?;
            if out.code == 0 || return_code::is_ignorable_on_stop(out.code) {
                tracing::info!(code = out.code, "worker stopped");
                return Ok(());
            }
            if !return_code::is_eagain(out.code) {
                tracing::error!(code = out.code, "stop failed fatally");
                return Err(SupervisorError::Fatal { code: out.code, message: out.stderr });
            }

            tracing::warn!(code = out.code, "stop returned EAGAIN, retrying with force");
            for attempt in 1..=STOP_MAX_RETRIES {
                tokio::time::sleep(STOP_RETRY_BACKOFF).await;
                let out = self.run(&["stop", "--force", name.as_str()]).await?;
                if out.code == 0 || return_code::is_ignorable_on_stop(out.code) {
                    tracing::info!(attempt, "worker force-stopped");
                    return Ok(());
                }
                if !return_code::is_eagain(out.code) {
                    tracing::error!(attempt, code = out.code, "force stop failed fatally");
                    return Err(SupervisorError::Fatal { code: out.code, message: out.stderr });
                }
                tracing::warn!(attempt, "force stop still EAGAIN");
            }
            tracing::error!("stop retries exhausted");
            Err(SupervisorError::TransientRetriesExhausted)
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, name: &WorkerName) -> Result<(), SupervisorError> {
        let out = self.run(&["delete", name.as_str()]).await?;
        if out.code != 0 {
            return Err(SupervisorError::Fatal { code: out.code, message: out.stderr });
        }
        Ok(())
    }

    async fn ps(&self) -> Result<Vec<PsEntry>, SupervisorError> {
        let out = self.run(&["ps"]).await?;
        if out.code != 0 {
            return Err(SupervisorError::Fatal { code: out.code, message: out.stderr });
        }
        Ok(parse_ps_output(&out.stdout))
    }

    async fn state(&self, name: &WorkerName) -> Result<Option<StateRecord>, SupervisorError> {
        let out = self.run(&["state", name.as_str()]).await?;
        if out.code == return_code::ENOENT {
            return Ok(None);
        }
        if out.code != 0 {
            return Err(SupervisorError::Fatal { code: out.code, message: out.stderr });
        }
        Ok(Some(parse_state_output(&out.stdout)))
    }
}

/// Parses `turf ps` output: whitespace-delimited `<name> <pid> <status>`
/// lines (§6).
pub fn parse_ps_output(raw: &str) -> Vec<PsEntry> {
    raw.lines().filter_map(parse_ps_line).collect()
}

fn parse_ps_line(line: &str) -> Option<PsEntry> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?;
    let pid: u32 = parts.next()?.parse().ok()?;
    let status = parts.next()?.to_string();
    Some(PsEntry { name: WorkerName::from(name), pid, status })
}

/// Parses `turf state <name>` output: `key: value` lines where `pid` and
/// `stat.*`/`rusage.*` keys are numeric, everything else a string (§6).
pub fn parse_state_output(raw: &str) -> StateRecord {
    let mut record = StateRecord::default();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim();
        let value = value.trim();
        let is_numeric_key = key == "pid" || key.starts_with("stat.") || key.starts_with("rusage.");
        let parsed = if is_numeric_key {
            match value.parse::<f64>() {
                Ok(n) => StateValue::Numeric(n),
                Err(_) => StateValue::Text(value.to_string()),
            }
        } else {
            StateValue::Text(value.to_string())
        };
        if key == "pid" {
            record.pid = value.parse().ok();
        }
        record.fields.insert(key.to_string(), parsed);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ps_lines() {
        let raw = "hello-abc123 1001 running\nfoo-xyz789 1002 stopped\n";
        let entries = parse_ps_output(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, WorkerName::from("hello-abc123"));
        assert_eq!(entries[0].pid, 1001);
        assert_eq!(entries[0].status, "running");
        assert_eq!(entries[1].status, "stopped");
    }

    #[test]
    fn ignores_blank_and_malformed_ps_lines() {
        let raw = "\nhello-abc123 1001 running\nnot-a-valid-line\n";
        let entries = parse_ps_output(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, WorkerName::from("hello-abc123"));
    }

    #[test]
    fn parses_state_numeric_and_string_fields() {
        let raw = "pid: 1001\nstat.cpu_time: 12.5\nrusage.maxrss: 2048\nstatus: running\n";
        let record = parse_state_output(raw);
        assert_eq!(record.pid, Some(1001));
        assert_eq!(record.fields.get("stat.cpu_time"), Some(&StateValue::Numeric(12.5)));
        assert_eq!(record.fields.get("rusage.maxrss"), Some(&StateValue::Numeric(2048.0)));
        assert_eq!(record.fields.get("status"), Some(&StateValue::Text("running".to_string())));
    }
}
