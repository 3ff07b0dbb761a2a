// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Function, worker and credential identifiers.
//!
//! `WorkerName` is the supervisor process name (globally unique per §3's
//! Worker invariants); `Credential` is the opaque token handed to a worker
//! at register time. Neither has a fixed-width encoding the way oj-core's
//! `define_id!` ids do (process names are `{function}-{suffix}`, of
//! variable length), so they're hand-rolled newtypes in the same shape as
//! `oj-core::worker::WorkerId`.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(SmolStr);

        impl $name {
            pub fn new(id: impl Into<SmolStr>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(SmolStr::from(s))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(SmolStr::from(s))
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0.as_str() == *other
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }
    };
}

string_id!(FunctionName);
string_id!(WorkerName);
string_id!(Credential);

/// Generates unique worker process names and credentials for launches.
///
/// Modeled as a trait (rather than a bare free function) so launch tests can
/// inject deterministic names instead of asserting against random nanoids.
pub trait NameGen: Send + Sync + 'static {
    fn worker_name(&self, function: &FunctionName) -> WorkerName;
    fn credential(&self) -> Credential;
}

/// Production `NameGen`: `{function}-{nanoid(12)}` process names and
/// 32-character nanoid credentials.
#[derive(Debug, Clone, Default)]
pub struct DefaultNameGen;

impl NameGen for DefaultNameGen {
    fn worker_name(&self, function: &FunctionName) -> WorkerName {
        WorkerName::new(format!("{}-{}", function.as_str(), nanoid::nanoid!(12)))
    }

    fn credential(&self) -> Credential {
        Credential::new(nanoid::nanoid!(32))
    }
}
