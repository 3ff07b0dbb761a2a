// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile Registry (C2, §4.2).
//!
//! Holds the current map of function name → profile and emits a `changed`
//! signal on replacement. Modeled on the "changed" event in
//! `oj-core::event::Event`, but using a `tokio::sync::watch<u64>` generation
//! counter instead of a queued event: every consumer (Broker::sync,
//! Capacity Manager) only cares whether the profile set has changed since it
//! last looked, not about delivery of each intermediate replacement.

use crate::ids::FunctionName;
use crate::profile::{ApplyMode, Profile};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Error surfaced by a failed pre-fetch hook invocation.
#[derive(Debug, Error)]
pub enum PrefetchError {
    #[error("profile prefetch failed: {0}")]
    Failed(String),
}

/// Pluggable hook invoked after a profile set is committed (used in the real
/// system to pre-fetch function code; out of scope here per §1, so this
/// crate only defines the seam).
#[async_trait]
pub trait ProfilePrefetchHook: Send + Sync {
    async fn on_preset_function_profile(
        &self,
        profiles: &[Profile],
        mode: ApplyMode,
    ) -> Result<(), PrefetchError>;
}

/// Default hook: does nothing, succeeds immediately.
#[derive(Debug, Default)]
pub struct NoopPrefetchHook;

#[async_trait]
impl ProfilePrefetchHook for NoopPrefetchHook {
    async fn on_preset_function_profile(
        &self,
        _profiles: &[Profile],
        _mode: ApplyMode,
    ) -> Result<(), PrefetchError> {
        Ok(())
    }
}

/// Holds the current function profile set.
///
/// `set` replaces the whole map atomically; readers always see either the
/// old set in full or the new set in full, never a partial replacement.
pub struct ProfileRegistry {
    profiles: RwLock<HashMap<FunctionName, Arc<Profile>>>,
    generation_tx: watch::Sender<u64>,
    hook: Arc<dyn ProfilePrefetchHook>,
}

impl ProfileRegistry {
    pub fn new(hook: Arc<dyn ProfilePrefetchHook>) -> Self {
        let (generation_tx, _rx) = watch::channel(0);
        Self { profiles: RwLock::new(HashMap::new()), generation_tx, hook }
    }

    pub fn with_noop_hook() -> Self {
        Self::new(Arc::new(NoopPrefetchHook))
    }

    /// Replace the whole profile set, invoking the pre-fetch hook per `mode`.
    ///
    /// `IMMEDIATELY` commits the new map, bumps the `changed` generation,
    /// and returns without waiting on the hook (the hook still runs, as a
    /// detached task). `WAIT` awaits the hook before returning.
    pub async fn set(&self, profiles: Vec<Profile>, mode: ApplyMode) -> Result<(), PrefetchError> {
        let mut map = HashMap::with_capacity(profiles.len());
        for profile in &profiles {
            map.insert(profile.name.clone(), Arc::new(profile.clone()));
        }
        {
            let mut guard = self.profiles.write();
            *guard = map;
        }
        self.generation_tx.send_modify(|g| *g += 1);

        match mode {
            ApplyMode::Wait => self.hook.on_preset_function_profile(&profiles, mode).await,
            ApplyMode::Immediately => {
                let hook = Arc::clone(&self.hook);
                tokio::spawn(async move {
                    if let Err(err) =
                        hook.on_preset_function_profile(&profiles, ApplyMode::Immediately).await
                    {
                        tracing::warn!(error = %err, "profile prefetch hook failed");
                    }
                });
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &FunctionName) -> Option<Arc<Profile>> {
        self.profiles.read().get(name).cloned()
    }

    /// Snapshot of the whole profile map, used by `Broker::sync` to refresh
    /// `profileSnapshot` (§4.4).
    pub fn snapshot(&self) -> HashMap<FunctionName, Arc<Profile>> {
        self.profiles.read().clone()
    }

    /// Subscribe to the `changed` generation counter.
    pub fn subscribe_changed(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ResourceLimit, WorkerProfileConfig};

    fn test_profile(name: &str) -> Profile {
        Profile {
            name: FunctionName::from(name),
            runtime: "nodejs".into(),
            url: "file:///tmp".into(),
            signature: None,
            source: crate::profile::ProfileSource::Handler("index.handler".into()),
            resource_limit: ResourceLimit { memory_bytes: 128 << 20, cpu_fraction: 1.0 },
            worker: WorkerProfileConfig {
                max_activate_requests: 10,
                replica_count_limit: 10,
                reservation_count: 0,
                shrink_strategy: Default::default(),
                initialization_timeout_ms: 10_000,
                v8_options: vec![],
                exec_argv: vec![],
                fast_fail_requests_on_starting: false,
                disposable: false,
            },
            environments: vec![],
        }
    }

    #[tokio::test]
    async fn set_replaces_atomically_and_bumps_generation() {
        let registry = ProfileRegistry::with_noop_hook();
        let mut rx = registry.subscribe_changed();
        assert!(registry.get(&FunctionName::from("func")).is_none());

        registry.set(vec![test_profile("func")], ApplyMode::Immediately).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
        assert!(registry.get(&FunctionName::from("func")).is_some());

        registry.set(vec![], ApplyMode::Wait).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 2);
        assert!(registry.get(&FunctionName::from("func")).is_none());
    }

    #[tokio::test]
    async fn wait_mode_awaits_hook() {
        struct FlagHook(Arc<std::sync::atomic::AtomicBool>);
        #[async_trait]
        impl ProfilePrefetchHook for FlagHook {
            async fn on_preset_function_profile(
                &self,
                _profiles: &[Profile],
                _mode: ApplyMode,
            ) -> Result<(), PrefetchError> {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        }
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let registry = ProfileRegistry::new(Arc::new(FlagHook(flag.clone())));
        registry.set(vec![test_profile("func")], ApplyMode::Wait).await.unwrap();
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }
}
