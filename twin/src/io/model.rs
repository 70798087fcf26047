//! Language-model collaborator.
//!
//! The [`ChatModel`] trait decouples the agent loop from the model backend
//! (currently Ollama's `/api/chat`). Tests use scripted models that return
//! predetermined outputs without any network traffic.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::core::types::{Role, Turn, TurnPayload};
use crate::io::config::ModelConfig;
use crate::io::error::{Collaborator, CollaboratorError};

/// Chat role on the model wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ModelMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Wire form of a history turn.
    ///
    /// Assistant replies are re-encoded as reply actions so the model keeps
    /// seeing the format it is asked to produce.
    pub fn from_turn(turn: &Turn) -> Self {
        match (&turn.role, &turn.payload) {
            (Role::User, TurnPayload::Text { text }) => Self::user(text.clone()),
            (_, TurnPayload::Text { text }) => Self::assistant(
                json!({ "action": "reply", "text": text }).to_string(),
            ),
            (_, TurnPayload::ToolCall { call }) => Self::assistant(call.to_action_json().to_string()),
            (_, TurnPayload::Observation { tool, result }) => Self {
                role: MessageRole::Tool,
                content: json!({ "tool": tool.as_str(), "result": result }).to_string(),
            },
        }
    }
}

/// One model invocation: the fixed instruction followed by the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<ModelMessage>,
}

impl ModelRequest {
    /// Full message list with the system instruction first.
    pub fn to_messages(&self) -> Vec<ModelMessage> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(ModelMessage::system(self.system.clone()));
        messages.extend(self.messages.iter().cloned());
        messages
    }
}

/// Abstraction over language-model backends.
pub trait ChatModel {
    /// Return the raw text of the model's next message.
    fn complete(&self, request: &ModelRequest) -> Result<String, CollaboratorError>;
}

impl<T: ChatModel + ?Sized> ChatModel for Box<T> {
    fn complete(&self, request: &ModelRequest) -> Result<String, CollaboratorError> {
        (**self).complete(request)
    }
}

/// Model backed by an Ollama server.
pub struct OllamaChat {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    temperature: f64,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ModelMessage>,
    stream: bool,
    format: &'a str,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChat {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build model http client")?;
        Ok(Self {
            client,
            url: chat_url(&config.endpoint),
            model: config.name.clone(),
            temperature: config.temperature,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatModel for OllamaChat {
    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len()))]
    fn complete(&self, request: &ModelRequest) -> Result<String, CollaboratorError> {
        let body = ChatBody {
            model: &self.model,
            messages: request.to_messages(),
            stream: false,
            format: "json",
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|err| CollaboratorError::from_reqwest(Collaborator::Model, err, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "model server rejected chat request");
            return Err(CollaboratorError::status(
                Collaborator::Model,
                status.as_u16(),
                &text,
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|err| CollaboratorError::from_reqwest(Collaborator::Model, err, self.timeout))?;
        let content = parsed
            .message
            .map(|message| message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(CollaboratorError::protocol(
                Collaborator::Model,
                "empty message content",
            ));
        }
        debug!(bytes = content.len(), "model responded");
        Ok(content)
    }
}

fn chat_url(endpoint: &str) -> String {
    format!("{}/api/chat", endpoint.trim_end_matches('/'))
}
