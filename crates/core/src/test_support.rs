// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders and fakes shared across the workspace, gated behind
//! `test-support` so downstream crates can depend on them in their own
//! test code without pulling proptest into release builds.

use crate::ids::{Credential, FunctionName, NameGen, WorkerName};
use crate::profile::{Profile, ProfileSource, ResourceLimit, ShrinkStrategy, WorkerProfileConfig};
use std::sync::atomic::{AtomicU64, Ordering};

crate::builder! {
    pub struct ProfileBuilder => Profile {
        into {
            name: FunctionName = "test-fn",
            runtime: String = "nodejs",
            url: String = "file:///tmp/test-fn",
        }
        option {
            signature: String = None,
        }
        set {
            source: ProfileSource = ProfileSource::Handler("index.handler".into()),
            resource_limit: ResourceLimit = ResourceLimit { memory_bytes: 128 << 20, cpu_fraction: 1.0 },
            worker: WorkerProfileConfig = WorkerProfileConfig {
                max_activate_requests: 10,
                replica_count_limit: 10,
                reservation_count: 0,
                shrink_strategy: ShrinkStrategy::Lcc,
                initialization_timeout_ms: 10_000,
                v8_options: vec![],
                exec_argv: vec![],
                fast_fail_requests_on_starting: false,
                disposable: false,
            },
            environments: Vec<(String, String)> = vec![],
        }
    }
}

/// Deterministic `NameGen` for launcher/reconciler tests: sequential
/// `{function}-{n}` names instead of random nanoids.
#[derive(Default)]
pub struct FakeNameGen {
    counter: AtomicU64,
}

impl NameGen for FakeNameGen {
    fn worker_name(&self, function: &FunctionName) -> WorkerName {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        WorkerName::new(format!("{}-{n}", function.as_str()))
    }

    fn credential(&self) -> Credential {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Credential::new(format!("cred-{n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_builder_overrides_defaults() {
        let profile = Profile::builder().name("greeter").runtime("python").build();
        assert_eq!(profile.name, FunctionName::from("greeter"));
        assert_eq!(profile.runtime, "python");
        assert_eq!(profile.worker.max_activate_requests, 10);
    }

    #[test]
    fn fake_name_gen_is_deterministic_and_unique() {
        let gen = FakeNameGen::default();
        let function = FunctionName::from("greeter");
        let a = gen.worker_name(&function);
        let b = gen.worker_name(&function);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("greeter-"));
    }
}
