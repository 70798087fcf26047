//! Scaffolding for a new agent directory: `twin.toml` plus a sample profile.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{TwinConfig, resolve_relative, write_config};

const SAMPLE_PROFILE: &str = include_str!("../../assets/profile.example.json");

/// Options for `init_workspace`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing config and profile.
    pub force: bool,
}

/// Files written by `init_workspace`.
#[derive(Debug, Clone)]
pub struct InitPaths {
    pub config_path: PathBuf,
    pub profile_path: PathBuf,
}

/// Write a default config at `config_path` and a sample profile next to it.
///
/// Fails if the config already exists unless `options.force` is set. An
/// existing profile is kept unless `options.force` is set.
pub fn init_workspace(config_path: &Path, options: &InitOptions) -> Result<InitPaths> {
    if config_path.exists() && !options.force {
        return Err(anyhow!(
            "init: {} already exists (use --force to overwrite)",
            config_path.display()
        ));
    }
    let config = TwinConfig::default();
    write_config(config_path, &config)?;

    let profile_path = resolve_relative(config_path, &config.profile_path);
    if options.force || !profile_path.exists() {
        write_file(&profile_path, SAMPLE_PROFILE)?;
    }

    Ok(InitPaths {
        config_path: config_path.to_path_buf(),
        profile_path,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}
