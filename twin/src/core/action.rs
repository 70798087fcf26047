//! Defensive parsing of model output into an [`AgentAction`].
//!
//! The model is asked for exactly one JSON object per response. Parsing runs
//! in stages so each rejection carries a precise reason for the corrective
//! re-prompt:
//!
//! 1. strip one surrounding Markdown code fence, if present;
//! 2. parse JSON;
//! 3. validate the envelope against `schemas/agent_action.schema.json`;
//! 4. resolve the tool name against the closed catalog;
//! 5. deserialize the tool's arguments into their typed form.
//!
//! Nothing is repaired beyond step 1: a payload that fails any stage is
//! rejected as a whole.

use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::lead::LeadDraft;
use crate::core::tool::{ToolCall, ToolName};

/// JSON Schema every model response must satisfy.
pub const ACTION_SCHEMA: &str = include_str!("../../schemas/agent_action.schema.json");

static ACTION_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(ACTION_SCHEMA).expect("embedded action schema should be valid json");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("embedded action schema should compile")
});

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```[A-Za-z]*[ \t]*\n?(.*?)\s*```\s*$").unwrap());

/// Parsed form of a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAction {
    FinalReply(String),
    ToolCall(ToolCall),
}

/// Why a model response could not be turned into an [`AgentAction`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("response is not valid JSON: {0}")]
    Malformed(String),
    #[error("response does not match the action schema: {}", .0.join("; "))]
    Schema(Vec<String>),
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: ToolName, message: String },
}

impl ActionError {
    /// Stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::Malformed(_) => "malformed",
            ActionError::Schema(_) => "schema",
            ActionError::UnknownTool { .. } => "unknown_tool",
            ActionError::InvalidArguments { .. } => "invalid_arguments",
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Envelope {
    Reply {
        text: String,
    },
    Tool {
        tool: String,
        arguments: Map<String, Value>,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SectionArgs {
    section: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectArgs {
    project: String,
}

/// Parse one raw model response.
pub fn parse_action(raw: &str) -> Result<AgentAction, ActionError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(ActionError::Malformed("empty response".to_string()));
    }
    let value: Value =
        serde_json::from_str(body).map_err(|err| ActionError::Malformed(err.to_string()))?;

    let violations: Vec<String> = ACTION_VALIDATOR
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !violations.is_empty() {
        return Err(ActionError::Schema(violations));
    }

    let envelope: Envelope =
        serde_json::from_value(value).map_err(|err| ActionError::Schema(vec![err.to_string()]))?;
    match envelope {
        Envelope::Reply { text } => Ok(AgentAction::FinalReply(text)),
        Envelope::Tool { tool, arguments } => {
            let name = tool
                .parse::<ToolName>()
                .map_err(|name| ActionError::UnknownTool { name })?;
            parse_arguments(name, arguments).map(AgentAction::ToolCall)
        }
    }
}

fn parse_arguments(tool: ToolName, arguments: Map<String, Value>) -> Result<ToolCall, ActionError> {
    let arguments = Value::Object(arguments);
    let invalid = |err: serde_json::Error| ActionError::InvalidArguments {
        tool,
        message: err.to_string(),
    };
    match tool {
        ToolName::FetchProfileSection => {
            let args: SectionArgs = serde_json::from_value(arguments).map_err(invalid)?;
            Ok(ToolCall::FetchProfileSection {
                section: args.section,
            })
        }
        ToolName::FetchProjectDetails => {
            let args: ProjectArgs = serde_json::from_value(arguments).map_err(invalid)?;
            Ok(ToolCall::FetchProjectDetails {
                project: args.project,
            })
        }
        ToolName::LogRecruiterLead => {
            let draft: LeadDraft = serde_json::from_value(arguments).map_err(invalid)?;
            Ok(ToolCall::LogRecruiterLead(draft))
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE_RE.captures(raw).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => raw.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_final_reply_verbatim() {
        let action = parse_action(r#"{"action": "reply", "text": "I enjoy Rust.  "}"#)
            .expect("reply");
        assert_eq!(action, AgentAction::FinalReply("I enjoy Rust.  ".to_string()));
    }

    #[test]
    fn parses_section_tool_call() {
        let action = parse_action(
            r#"{"action": "tool", "tool": "fetch-profile-section", "arguments": {"section": "skills"}}"#,
        )
        .expect("tool call");
        assert_eq!(
            action,
            AgentAction::ToolCall(ToolCall::FetchProfileSection {
                section: "skills".to_string()
            })
        );
    }

    #[test]
    fn parses_partial_lead_for_later_validation() {
        let action = parse_action(
            r#"{"action": "tool", "tool": "log-recruiter-lead", "arguments": {"name": "Dana", "company": "Acme"}}"#,
        )
        .expect("tool call");
        let AgentAction::ToolCall(ToolCall::LogRecruiterLead(draft)) = action else {
            panic!("expected lead call");
        };
        assert_eq!(draft.company, "Acme");
        assert!(draft.role.is_empty());
    }

    #[test]
    fn strips_one_code_fence() {
        let raw = "```json\n{\"action\": \"reply\", \"text\": \"hi\"}\n```";
        assert_eq!(
            parse_action(raw),
            Ok(AgentAction::FinalReply("hi".to_string()))
        );
    }

    #[test]
    fn rejects_prose() {
        let err = parse_action("Sure! My skills are Rust and Python.").unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn rejects_empty_output() {
        let err = parse_action("   ").unwrap_err();
        assert_eq!(err, ActionError::Malformed("empty response".to_string()));
    }

    #[test]
    fn rejects_extra_envelope_fields() {
        let err = parse_action(r#"{"action": "reply", "text": "hi", "mood": "happy"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn rejects_blank_reply_text() {
        let err = parse_action(r#"{"action": "reply", "text": "   "}"#).unwrap_err();
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn rejects_unknown_tool() {
        let err = parse_action(r#"{"action": "tool", "tool": "send-email", "arguments": {}}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ActionError::UnknownTool {
                name: "send-email".to_string()
            }
        );
    }

    #[test]
    fn rejects_missing_required_argument() {
        let err = parse_action(
            r#"{"action": "tool", "tool": "fetch-project-details", "arguments": {"name": "x"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");
        assert!(err.to_string().contains("fetch-project-details"));
    }
}
