// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional static-profile bootstrap overlay (§2 [AMBIENT] Configuration):
//! a TOML file of `[[profile]]` tables, loaded once at startup so the
//! daemon can run end-to-end without a separate profile-distribution
//! channel.

use crate::error::DaemonError;
use ncp_core::Profile;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    #[serde(default, rename = "profile")]
    profiles: Vec<Profile>,
}

/// Parse a `[[profile]] ...` TOML document into the profile set to hand to
/// `ProfileRegistry::set` at startup.
pub fn load_profiles(path: &Path) -> Result<Vec<Profile>, DaemonError> {
    let raw = std::fs::read_to_string(path).map_err(|e| DaemonError::ProfilesRead(path.to_path_buf(), e))?;
    let parsed: ProfilesFile = toml::from_str(&raw).map_err(|e| DaemonError::ProfilesParse(path.to_path_buf(), e))?;
    Ok(parsed.profiles)
}
