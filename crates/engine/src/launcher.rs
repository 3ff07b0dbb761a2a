// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker Launcher (C7, §4.7): admission check, bundle preparation,
//! supervisor `create`+`start`, Snapshot registration, and the await on
//! `worker.ready()`.

use crate::capacity::virtual_memory_used;
use crate::error::EngineError;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use ncp_core::{Clock, FunctionName, NameGen, Profile, ProfileRegistry, SystemClock};
use ncp_supervisor::{StartOptions, SupervisorClient};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tracing::Instrument;

/// Inspector vs. ordinary launch (§4.7, §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchOptions {
    pub inspect: bool,
}

/// Writes the OCI-style bundle (`<bundle>/code/`, `<bundle>/config.json`)
/// for a launch, guarded by a per-bundle exclusive lock so concurrent
/// launches from the same bundle serialize around the spec write (§4.7
/// step 5, §9 design note).
#[async_trait]
pub trait BundleWriter: Send + Sync {
    async fn write(&self, bundle_path: &Path, profile: &Profile, inspect: bool) -> Result<(), EngineError>;
}

/// Real filesystem `BundleWriter`: serializes `config.json` from the
/// profile's resource limits, env, and args per §6's OCI spec fields.
pub struct FsBundleWriter {
    locks: SyncMutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl Default for FsBundleWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FsBundleWriter {
    pub fn new() -> Self {
        Self { locks: SyncMutex::new(HashMap::new()) }
    }

    fn lock_for(&self, bundle_path: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(bundle_path.to_path_buf()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    fn spec_json(profile: &Profile, inspect: bool) -> serde_json::Value {
        let memory_limit = if inspect {
            profile.resource_limit.memory_bytes * 100
        } else {
            profile.resource_limit.memory_bytes
        };
        let period_us: u64 = 1_000_000;
        let quota = (profile.resource_limit.cpu_fraction * period_us as f64) as u64;
        serde_json::json!({
            "process": {
                "args": profile.worker.exec_argv,
                "env": profile
                    .environments
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>(),
            },
            "linux": {
                "resources": {
                    "memory": { "limit": memory_limit },
                    "cpu": { "shares": 1024, "quota": quota, "period": period_us },
                },
            },
            "turf": { "runtime": profile.runtime },
        })
    }
}

#[async_trait]
impl BundleWriter for FsBundleWriter {
    async fn write(&self, bundle_path: &Path, profile: &Profile, inspect: bool) -> Result<(), EngineError> {
        let lock = self.lock_for(bundle_path);
        let _guard = lock.lock().await;

        let code_dir = bundle_path.join("code");
        tokio::fs::create_dir_all(&code_dir)
            .await
            .map_err(|e| EngineError::EnsureCodeFailed(e.to_string()))?;

        let spec = Self::spec_json(profile, inspect);
        let config_path = bundle_path.join("config.json");
        let contents = serde_json::to_vec_pretty(&spec)
            .map_err(|e| EngineError::EnsureCodeFailed(format!("serialize bundle spec: {e}")))?;
        tokio::fs::write(&config_path, contents)
            .await
            .map_err(|e| EngineError::EnsureCodeFailed(e.to_string()))?;
        Ok(())
    }
}

/// In-memory `BundleWriter` for launcher tests: records each write instead
/// of touching the filesystem.
#[derive(Default)]
pub struct FakeBundleWriter {
    writes: SyncMutex<Vec<PathBuf>>,
    fail_next: SyncMutex<bool>,
}

impl FakeBundleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_write(&self) {
        *self.fail_next.lock() = true;
    }

    pub fn writes(&self) -> Vec<PathBuf> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl BundleWriter for FakeBundleWriter {
    async fn write(&self, bundle_path: &Path, _profile: &Profile, _inspect: bool) -> Result<(), EngineError> {
        if std::mem::take(&mut *self.fail_next.lock()) {
            return Err(EngineError::EnsureCodeFailed("fake bundle write failure".into()));
        }
        self.writes.lock().push(bundle_path.to_path_buf());
        Ok(())
    }
}

/// Executes launches: admission, bundle write, supervisor create+start,
/// Snapshot registration, await ready (§4.7).
pub struct WorkerLauncher<C: Clock = SystemClock> {
    virtual_memory_pool_size: u64,
    bundle_root: PathBuf,
    log_root: PathBuf,
    name_gen: Arc<dyn NameGen>,
    bundle_writer: Arc<dyn BundleWriter>,
    concurrency: Arc<Semaphore>,
    expand_interval: tokio::time::Duration,
    clock: C,
}

impl<C: Clock> WorkerLauncher<C> {
    pub fn new(
        virtual_memory_pool_size: u64,
        bundle_root: PathBuf,
        log_root: PathBuf,
        name_gen: Arc<dyn NameGen>,
        bundle_writer: Arc<dyn BundleWriter>,
        expand_concurrency: usize,
        expand_interval: tokio::time::Duration,
        clock: C,
    ) -> Self {
        Self {
            virtual_memory_pool_size,
            bundle_root,
            log_root,
            name_gen,
            bundle_writer,
            concurrency: Arc::new(Semaphore::new(expand_concurrency.max(1))),
            expand_interval,
            clock,
        }
    }

    /// `tryLaunch` (§4.7): admission, bundle prep, supervisor create+start,
    /// register with Snapshot (which starts the ready timer), await ready.
    pub async fn try_launch(
        &self,
        function_name: &FunctionName,
        options: LaunchOptions,
        snapshot: &Arc<SyncMutex<Snapshot>>,
        profile_registry: &ProfileRegistry,
        supervisor: &dyn SupervisorClient,
    ) -> Result<ncp_core::WorkerName, EngineError> {
        let span = tracing::info_span!("launch", function = %function_name, inspect = options.inspect);
        self.try_launch_inner(function_name, options, snapshot, profile_registry, supervisor).instrument(span).await
    }

    async fn try_launch_inner(
        &self,
        function_name: &FunctionName,
        options: LaunchOptions,
        snapshot: &Arc<SyncMutex<Snapshot>>,
        profile_registry: &ProfileRegistry,
        supervisor: &dyn SupervisorClient,
    ) -> Result<ncp_core::WorkerName, EngineError> {
        let _permit = self
            .concurrency
            .acquire()
            .await
            .map_err(|_| EngineError::EnsureCodeFailed("launch concurrency semaphore closed".into()))?;

        let profile = profile_registry.get(function_name).ok_or_else(|| EngineError::NoFunction(function_name.clone()))?;

        let used = { virtual_memory_used(&snapshot.lock()) };
        if profile.resource_limit.memory_bytes + used > self.virtual_memory_pool_size {
            return Err(EngineError::NoEnoughVirtualMemory);
        }

        let worker_name = self.name_gen.worker_name(function_name);
        let credential = self.name_gen.credential();

        let bundle_path = self.bundle_root.join(worker_name.as_str());
        self.bundle_writer.write(&bundle_path, &profile, options.inspect).await?;

        supervisor.create(&worker_name, &bundle_path).await?;
        let start_opts = StartOptions {
            seed: None,
            stdout_path: Some(self.log_root.join(format!("{}.stdout.log", worker_name.as_str()))),
            stderr_path: Some(self.log_root.join(format!("{}.stderr.log", worker_name.as_str()))),
        };
        supervisor.start(&worker_name, start_opts).await?;

        let meta = crate::broker::RegisterMeta {
            worker_name: worker_name.clone(),
            credential,
            disposable: profile.worker.disposable,
            init_timeout: tokio::time::Duration::from_millis(profile.worker.initialization_timeout_ms),
            max_activate_requests: profile.worker.max_activate_requests,
        };

        {
            let mut guard = snapshot.lock();
            guard.register(
                function_name.clone(),
                options.inspect,
                Some(profile.clone()),
                meta,
                &self.clock,
            )?;
        }

        self.await_ready(snapshot, function_name, options.inspect, &worker_name).await?;

        Ok(worker_name)
    }

    /// Waits for the just-registered worker to become `Ready`, the same
    /// policy as `Worker::ready()` (§4.3), but driven from outside the
    /// `Snapshot` lock: `worker.ready()` borrows `&Worker`, which cannot
    /// outlive the guard it came from, so this re-subscribes to the
    /// worker's status channel and releases the lock before awaiting.
    async fn await_ready(
        &self,
        snapshot: &Arc<SyncMutex<Snapshot>>,
        function_name: &FunctionName,
        is_inspector: bool,
        worker_name: &ncp_core::WorkerName,
    ) -> Result<(), EngineError> {
        use ncp_core::ContainerStatus;

        let found = {
            let guard = snapshot.lock();
            guard
                .broker(function_name, is_inspector)
                .and_then(|broker| broker.worker(worker_name))
                .map(|worker| (worker.subscribe(), worker.register_time + worker.init_timeout + ncp_core::READY_GRACE))
        };
        let Some((mut rx, deadline)) = found else {
            return Err(EngineError::WorkerStoppedUnexpected);
        };

        if *rx.borrow() == ContainerStatus::Ready {
            return Ok(());
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let wait = async {
            loop {
                if rx.changed().await.is_err() {
                    return Err(ncp_core::WorkerInitError::Closed);
                }
                let current = *rx.borrow();
                if current == ContainerStatus::Ready {
                    return Ok(());
                }
                if current >= ContainerStatus::PendingStop {
                    return Err(ncp_core::WorkerInitError::Stopped);
                }
            }
        };

        match tokio::time::timeout(remaining, wait).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ncp_core::WorkerInitError::Timeout.into()),
        }
    }

    /// `tryBatchLaunch` (§4.7): issues `n` launches in parallel, spacing
    /// excess launches by `expandInterval` once concurrency is saturated
    /// (enforced by the `Semaphore` itself rather than an explicit sleep
    /// loop here). Returns how many actually succeeded; failures are
    /// logged and do not abort the batch (§7: autoScale logs and
    /// continues).
    pub async fn try_batch_launch(
        &self,
        function_name: &FunctionName,
        n: usize,
        options: LaunchOptions,
        snapshot: &Arc<SyncMutex<Snapshot>>,
        profile_registry: &ProfileRegistry,
        supervisor: &dyn SupervisorClient,
    ) -> usize {
        let mut launched = 0;
        for i in 0..n {
            if i > 0 {
                tokio::time::sleep(self.expand_interval).await;
            }
            match self.try_launch(function_name, options, snapshot, profile_registry, supervisor).await {
                Ok(_) => launched += 1,
                Err(err) => {
                    tracing::warn!(function = %function_name, error = %err, "launch failed during batch");
                }
            }
        }
        launched
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
