//! System and corrective prompts rendered from embedded templates.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::action::{ACTION_SCHEMA, ActionError};
use crate::core::profile::ProfileDocument;
use crate::core::tool::ToolName;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const CORRECTION_TEMPLATE: &str = include_str!("prompts/correction.md");

/// Persona used when neither the config nor the profile names one.
pub const DEFAULT_PERSONA: &str = "the candidate";

#[derive(Debug, Clone, Serialize)]
struct ToolContext {
    name: &'static str,
    description: &'static str,
    arguments: &'static [&'static str],
}

impl ToolContext {
    fn from_name(name: ToolName) -> Self {
        Self {
            name: name.as_str(),
            description: name.description(),
            arguments: name.arguments(),
        }
    }
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("correction", CORRECTION_TEMPLATE)
            .expect("correction template should be valid");
        Self { env }
    }

    /// Fixed system instruction for one persona and profile.
    pub fn render_system(&self, persona: &str, profile: &ProfileDocument) -> Result<String> {
        let tools: Vec<ToolContext> = ToolName::ALL.into_iter().map(ToolContext::from_name).collect();
        let template = self.env.get_template("system")?;
        let rendered = template.render(context! {
            persona => persona.trim(),
            sections => profile.section_names(),
            projects => profile.project_names(),
            tools => tools,
            schema => ACTION_SCHEMA.trim(),
        })?;
        debug!(bytes = rendered.len(), "rendered system prompt");
        Ok(rendered)
    }

    /// Corrective instruction appended after an unusable model response.
    pub fn render_correction(&self, error: &ActionError) -> Result<String> {
        let tools: Vec<&str> = ToolName::ALL.into_iter().map(ToolName::as_str).collect();
        let template = self.env.get_template("correction")?;
        let rendered = template.render(context! {
            kind => error.kind(),
            problem => error.to_string(),
            tools => tools,
            schema => ACTION_SCHEMA.trim(),
        })?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the persona name: config first, then the profile's `name`.
pub fn persona_name<'a>(configured: Option<&'a str>, profile: &'a ProfileDocument) -> &'a str {
    configured
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| profile.owner_name())
        .unwrap_or(DEFAULT_PERSONA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> ProfileDocument {
        ProfileDocument::from_value(json!({
            "name": "Sam Rivera",
            "skills": ["Rust"],
            "projects": [{"name": "Atlas"}, {"name": "Beacon"}],
        }))
        .expect("object profile")
    }

    #[test]
    fn system_prompt_lists_tools_and_outline() {
        let prompt = PromptEngine::new()
            .render_system("Sam Rivera", &profile())
            .expect("render");

        assert!(prompt.starts_with("You are Sam Rivera"));
        for tool in ToolName::ALL {
            assert!(prompt.contains(tool.as_str()), "missing {tool}");
        }
        assert!(prompt.contains("Sections: name, projects, skills"));
        assert!(prompt.contains("Projects: Atlas, Beacon"));
        assert!(prompt.contains("\"oneOf\""));
    }

    #[test]
    fn correction_names_the_problem() {
        let err = ActionError::UnknownTool {
            name: "send-email".to_string(),
        };
        let prompt = PromptEngine::new().render_correction(&err).expect("render");
        assert!(prompt.contains("(unknown_tool): unknown tool 'send-email'"));
        assert!(prompt.contains("fetch-profile-section, fetch-project-details, log-recruiter-lead"));
    }

    #[test]
    fn persona_prefers_config_then_profile() {
        let profile = profile();
        assert_eq!(persona_name(Some("Alex"), &profile), "Alex");
        assert_eq!(persona_name(Some("  "), &profile), "Sam Rivera");
        assert_eq!(persona_name(None, &ProfileDocument::default()), DEFAULT_PERSONA);
    }
}
