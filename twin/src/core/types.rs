//! Shared deterministic types for the agent core.
//!
//! These types define stable contracts between the turn state machine, the
//! tool layer and the collaborators. They hold no I/O handles and serialize
//! deterministically so transcripts and HTTP payloads stay stable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::tool::{ToolCall, ToolName};

/// Author of a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Observation,
}

/// Payload carried by a history turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnPayload {
    /// Free text typed by the user or shown to the user.
    Text { text: String },
    /// A tool invocation requested by the model.
    ToolCall { call: ToolCall },
    /// Result of a tool invocation, fed back to the model.
    Observation { tool: ToolName, result: Value },
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    #[serde(flatten)]
    pub payload: TurnPayload,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            payload: TurnPayload::Text { text: text.into() },
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            payload: TurnPayload::Text { text: text.into() },
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            payload: TurnPayload::ToolCall { call },
        }
    }

    pub fn observation(tool: ToolName, result: Value) -> Self {
        Self {
            role: Role::Observation,
            payload: TurnPayload::Observation { tool, result },
        }
    }

    /// Text of a user or assistant text turn.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            TurnPayload::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Ordered, append-only record of one session's conversation.
///
/// Owned by a single session. There is no removal or rewrite API: turns only
/// ever get appended, and the whole value is dropped when the session ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_appends_in_order() {
        let mut history = ConversationHistory::new();
        history.push(Turn::user("hi"));
        history.push(Turn::tool_call(ToolCall::FetchProfileSection {
            section: "skills".to_string(),
        }));
        history.push(Turn::observation(
            ToolName::FetchProfileSection,
            json!(["rust"]),
        ));
        history.push(Turn::assistant("I know Rust."));

        let roles: Vec<Role> = history.turns().iter().map(|turn| turn.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::User,
                Role::Assistant,
                Role::Observation,
                Role::Assistant
            ]
        );
        assert_eq!(history.last().and_then(Turn::text), Some("I know Rust."));
    }

    #[test]
    fn turn_serializes_flat() {
        let value = serde_json::to_value(Turn::user("hello")).expect("serialize");
        assert_eq!(
            value,
            json!({"role": "user", "kind": "text", "text": "hello"})
        );
    }
}
