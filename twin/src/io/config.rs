//! Agent configuration stored in `twin.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::turn::TurnLimits;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "twin.toml";

/// Agent configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to values that run
/// against a local Ollama and a local CSV lead log. Relative paths are
/// resolved against the directory containing the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TwinConfig {
    /// Static profile document (JSON).
    pub profile_path: PathBuf,

    /// Failed model calls (bad output or model errors) allowed per turn.
    pub max_parse_attempts: u32,

    /// Tool dispatches allowed per turn.
    pub max_tool_calls: u32,

    pub persona: PersonaConfig,
    pub model: ModelConfig,
    pub leads: LeadsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PersonaConfig {
    /// Name the agent speaks as. Falls back to the profile's top-level `name`.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the Ollama server.
    pub endpoint: String,
    /// Model tag, e.g. `llama3`.
    pub name: String,
    pub timeout_secs: u64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeadBackend {
    #[default]
    Csv,
    Sheets,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LeadsConfig {
    pub backend: LeadBackend,
    /// CSV file used by the `csv` backend.
    pub csv_path: PathBuf,
    pub sheets: SheetsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SheetsConfig {
    /// Explicit spreadsheet id; takes precedence over the title lookup.
    pub spreadsheet_id: Option<String>,
    /// Title searched for (and created when missing) without an explicit id.
    pub spreadsheet_title: String,
    pub worksheet: String,
    /// OAuth bearer token, obtained out of band.
    pub access_token: Option<String>,
    pub sheets_api_base: String,
    pub drive_api_base: String,
    pub timeout_secs: u64,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            profile_path: PathBuf::from("profile.json"),
            max_parse_attempts: 3,
            max_tool_calls: 6,
            persona: PersonaConfig::default(),
            model: ModelConfig::default(),
            leads: LeadsConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434".to_string(),
            name: "llama3".to_string(),
            timeout_secs: 120,
            temperature: 0.2,
        }
    }
}

impl Default for LeadsConfig {
    fn default() -> Self {
        Self {
            backend: LeadBackend::Csv,
            csv_path: PathBuf::from("leads/recruiter_leads.csv"),
            sheets: SheetsConfig::default(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            spreadsheet_title: "Recruiter Leads".to_string(),
            worksheet: "Leads".to_string(),
            access_token: None,
            sheets_api_base: "https://sheets.googleapis.com".to_string(),
            drive_api_base: "https://www.googleapis.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl TwinConfig {
    pub fn validate(&self) -> Result<()> {
        if self.profile_path.as_os_str().is_empty() {
            return Err(anyhow!("profile_path must be set"));
        }
        if self.max_parse_attempts == 0 {
            return Err(anyhow!("max_parse_attempts must be > 0"));
        }
        if self.max_tool_calls == 0 {
            return Err(anyhow!("max_tool_calls must be > 0"));
        }
        if self.model.endpoint.trim().is_empty() {
            return Err(anyhow!("model.endpoint must be set"));
        }
        if self.model.name.trim().is_empty() {
            return Err(anyhow!("model.name must be set"));
        }
        if self.model.timeout_secs == 0 {
            return Err(anyhow!("model.timeout_secs must be > 0"));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(anyhow!("model.temperature must be within 0.0..=2.0"));
        }
        match self.leads.backend {
            LeadBackend::Csv => {
                if self.leads.csv_path.as_os_str().is_empty() {
                    return Err(anyhow!("leads.csv_path must be set for the csv backend"));
                }
            }
            LeadBackend::Sheets => self.leads.sheets.validate()?,
        }
        Ok(())
    }

    pub fn turn_limits(&self) -> TurnLimits {
        TurnLimits {
            max_parse_attempts: self.max_parse_attempts,
            max_tool_calls: self.max_tool_calls,
        }
    }
}

impl SheetsConfig {
    fn validate(&self) -> Result<()> {
        let has_token = self
            .access_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty());
        if !has_token {
            return Err(anyhow!("leads.sheets.access_token must be set for the sheets backend"));
        }
        let has_id = self
            .spreadsheet_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        if !has_id && self.spreadsheet_title.trim().is_empty() {
            return Err(anyhow!(
                "leads.sheets needs a spreadsheet_id or a spreadsheet_title"
            ));
        }
        if self.worksheet.trim().is_empty() {
            return Err(anyhow!("leads.sheets.worksheet must be set"));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("leads.sheets.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Resolve `path` against the directory holding the config file.
pub fn resolve_relative(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TwinConfig::default()`.
pub fn load_config(path: &Path) -> Result<TwinConfig> {
    if !path.exists() {
        let cfg = TwinConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TwinConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &TwinConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, TwinConfig::default());
        assert_eq!(cfg.turn_limits(), TurnLimits::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("twin.toml");
        let cfg = TwinConfig {
            max_parse_attempts: 5,
            persona: PersonaConfig {
                name: Some("Sam Rivera".to_string()),
            },
            ..TwinConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("twin.toml");
        fs::write(&path, "[model]\nname = \"mistral\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.model.name, "mistral");
        assert_eq!(cfg.model.endpoint, ModelConfig::default().endpoint);
        assert_eq!(cfg.max_parse_attempts, 3);
    }

    #[test]
    fn zero_retry_budget_is_rejected() {
        let cfg = TwinConfig {
            max_parse_attempts: 0,
            ..TwinConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sheets_backend_requires_token() {
        let mut cfg = TwinConfig::default();
        cfg.leads.backend = LeadBackend::Sheets;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("access_token"));

        cfg.leads.sheets.access_token = Some("ya29.token".to_string());
        cfg.validate().expect("valid with token");
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let resolved = resolve_relative(Path::new("/etc/twin/twin.toml"), Path::new("profile.json"));
        assert_eq!(resolved, PathBuf::from("/etc/twin/profile.json"));
        let absolute = resolve_relative(Path::new("twin.toml"), Path::new("/data/p.json"));
        assert_eq!(absolute, PathBuf::from("/data/p.json"));
    }
}
