//! Wiring from `twin.toml` to a ready [`Agent`].

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::profile::ProfileDocument;
use crate::io::config::{LeadBackend, TwinConfig, load_config, resolve_relative};
use crate::io::csv_log::CsvLeadLog;
use crate::io::model::OllamaChat;
use crate::io::profile_store::load_profile;
use crate::io::prompt::persona_name;
use crate::io::sheets::GoogleSheets;
use crate::io::sink::LeadSink;
use crate::session::Agent;
use crate::tools::ToolLayer;

pub type DynSink = Box<dyn LeadSink + Send + Sync>;

/// Agent backed by the configured model server and lead sink.
pub type TwinAgent = Agent<OllamaChat, DynSink>;

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
}

/// Load the config at `config_path` and apply `overrides`.
pub fn load_settings(config_path: &Path, overrides: &Overrides) -> Result<TwinConfig> {
    let mut config = load_config(config_path)?;
    if let Some(model) = overrides.model.as_deref() {
        config.model.name = model.to_string();
        config.validate()?;
    }
    Ok(config)
}

pub fn load_profile_for(config_path: &Path, config: &TwinConfig) -> Result<ProfileDocument> {
    load_profile(&resolve_relative(config_path, &config.profile_path))
}

pub fn build_sink(config_path: &Path, config: &TwinConfig) -> Result<DynSink> {
    let sink: DynSink = match config.leads.backend {
        LeadBackend::Csv => Box::new(CsvLeadLog::new(resolve_relative(
            config_path,
            &config.leads.csv_path,
        ))),
        LeadBackend::Sheets => Box::new(
            GoogleSheets::new(&config.leads.sheets).context("configure google sheets sink")?,
        ),
    };
    Ok(sink)
}

/// Build the shared agent. Performs no network calls.
pub fn build_agent(config_path: &Path, config: &TwinConfig) -> Result<TwinAgent> {
    let profile = load_profile_for(config_path, config)?;
    let persona = persona_name(config.persona.name.as_deref(), &profile).to_string();
    let sink = build_sink(config_path, config)?;
    let model = OllamaChat::new(&config.model)?;
    info!(
        model = %model.model(),
        sink = %sink.describe(),
        persona = %persona,
        "agent ready"
    );
    Agent::new(model, ToolLayer::new(profile, sink), &persona, config.turn_limits())
}
