//! Load the profile document from disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::debug;

use crate::core::profile::ProfileDocument;

/// Read and parse a JSON profile. The top level must be an object.
pub fn load_profile(path: &Path) -> Result<ProfileDocument> {
    let raw = fs::read_to_string(path).with_context(|| format!("read profile {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&raw).with_context(|| format!("parse profile {}", path.display()))?;
    let profile = ProfileDocument::from_value(value)
        .ok_or_else(|| anyhow!("profile {} must be a JSON object", path.display()))?;
    debug!(
        path = %path.display(),
        sections = profile.section_names().len(),
        projects = profile.project_names().len(),
        "loaded profile"
    );
    Ok(profile)
}
