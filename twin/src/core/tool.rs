//! Closed set of tools the model may invoke.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::lead::LeadDraft;

/// Name of a tool in the fixed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolName {
    FetchProfileSection,
    FetchProjectDetails,
    LogRecruiterLead,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [
        ToolName::FetchProfileSection,
        ToolName::FetchProjectDetails,
        ToolName::LogRecruiterLead,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::FetchProfileSection => "fetch-profile-section",
            ToolName::FetchProjectDetails => "fetch-project-details",
            ToolName::LogRecruiterLead => "log-recruiter-lead",
        }
    }

    /// One-line description rendered into the system prompt.
    pub fn description(self) -> &'static str {
        match self {
            ToolName::FetchProfileSection => {
                "Return one section of the profile (skills, education, experience, projects, job_preferences, links, contact)."
            }
            ToolName::FetchProjectDetails => "Return the full entry of one project by its name.",
            ToolName::LogRecruiterLead => {
                "Record a recruiter's contact details once name, company, role and contact are all known."
            }
        }
    }

    /// Argument names, required ones first.
    pub fn arguments(self) -> &'static [&'static str] {
        match self {
            ToolName::FetchProfileSection => &["section"],
            ToolName::FetchProjectDetails => &["project"],
            ToolName::LogRecruiterLead => &["name", "company", "role", "contact", "notes"],
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|name| name.as_str() == raw)
            .ok_or_else(|| raw.to_string())
    }
}

/// A parsed, well-typed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "kebab-case")]
pub enum ToolCall {
    FetchProfileSection { section: String },
    FetchProjectDetails { project: String },
    LogRecruiterLead(LeadDraft),
}

impl ToolCall {
    pub fn name(&self) -> ToolName {
        match self {
            ToolCall::FetchProfileSection { .. } => ToolName::FetchProfileSection,
            ToolCall::FetchProjectDetails { .. } => ToolName::FetchProjectDetails,
            ToolCall::LogRecruiterLead(_) => ToolName::LogRecruiterLead,
        }
    }

    /// Render the call back into the action format the model emits.
    pub fn to_action_json(&self) -> Value {
        let arguments = match self {
            ToolCall::FetchProfileSection { section } => json!({ "section": section }),
            ToolCall::FetchProjectDetails { project } => json!({ "project": project }),
            ToolCall::LogRecruiterLead(draft) => json!({
                "name": draft.name,
                "company": draft.company,
                "role": draft.role,
                "contact": draft.contact,
                "notes": draft.notes,
            }),
        };
        json!({
            "action": "tool",
            "tool": self.name().as_str(),
            "arguments": arguments,
        })
    }
}
