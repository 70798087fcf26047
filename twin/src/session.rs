//! Orchestration for one conversational turn.
//!
//! An [`Agent`] holds everything shared between conversations (model client,
//! tool layer, rendered system prompt, limits) and is read-only once built.
//! A [`Session`] owns one conversation's history and the leads captured in
//! it. [`Agent::run_turn`] drives the pure [`TurnMachine`] with real model
//! and tool results until the turn is done or aborted.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::action::{ActionError, parse_action};
use crate::core::lead::RecruiterLead;
use crate::core::tool::ToolCall;
use crate::core::turn::{TurnLimits, TurnMachine, TurnState};
use crate::core::types::{ConversationHistory, Turn};
use crate::io::model::{ChatModel, ModelMessage, ModelRequest};
use crate::io::prompt::PromptEngine;
use crate::io::sink::LeadSink;
use crate::tools::{Observation, ToolLayer};

/// Reply shown when a turn is aborted.
pub const FALLBACK_REPLY: &str = "I'm having trouble processing that — please rephrase.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Done,
    Aborted,
}

/// Lead event surfaced to the user alongside the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LeadNotice {
    Captured { lead: RecruiterLead },
    CaptureFailed { reason: String },
}

/// Result of [`Agent::run_turn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReply {
    pub text: String,
    pub outcome: TurnOutcome,
    /// Last lead event of the turn, if any.
    pub lead: Option<LeadNotice>,
    pub model_calls: u32,
    pub tool_calls: u32,
}

/// One conversation.
#[derive(Debug, Clone, Default)]
pub struct Session {
    history: ConversationHistory,
    leads: Vec<RecruiterLead>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Leads captured in this conversation, oldest first.
    pub fn leads(&self) -> &[RecruiterLead] {
        &self.leads
    }
}

pub struct Agent<M, S> {
    model: M,
    tools: ToolLayer<S>,
    prompts: PromptEngine,
    system_prompt: String,
    limits: TurnLimits,
}

/// Turn-local bookkeeping that never enters the history.
#[derive(Default)]
struct TurnScratch {
    /// Rejected outputs and the corrections that answered them.
    corrections: Vec<ModelMessage>,
    model_calls: u32,
    lead: Option<LeadNotice>,
    lead_capture_failed: bool,
}

impl<M: ChatModel, S: LeadSink> Agent<M, S> {
    pub fn new(model: M, tools: ToolLayer<S>, persona: &str, limits: TurnLimits) -> Result<Self> {
        let prompts = PromptEngine::new();
        let system_prompt = prompts.render_system(persona, tools.profile())?;
        Ok(Self {
            model,
            tools,
            prompts,
            system_prompt,
            limits,
        })
    }

    pub fn tools(&self) -> &ToolLayer<S> {
        &self.tools
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn limits(&self) -> TurnLimits {
        self.limits
    }

    /// Answer one user message, appending every turn to the session history.
    ///
    /// Never fails: an exhausted retry budget or tool-call cap yields
    /// [`FALLBACK_REPLY`] with [`TurnOutcome::Aborted`].
    #[instrument(skip_all, fields(history = session.history.len()))]
    pub fn run_turn(&self, session: &mut Session, message: &str) -> TurnReply {
        session.history.push(Turn::user(message));
        let mut machine = TurnMachine::new(self.limits);
        let mut scratch = TurnScratch::default();

        loop {
            match machine.state().clone() {
                TurnState::AwaitingModel => self.await_model(session, &mut machine, &mut scratch),
                TurnState::DispatchingTool(call) => {
                    self.dispatch_tool(session, &call, &mut scratch);
                    machine.on_tool_finished();
                }
                TurnState::Done(text) => {
                    session.history.push(Turn::assistant(text.clone()));
                    info!(
                        model_calls = scratch.model_calls,
                        tool_calls = machine.tool_calls(),
                        "turn done"
                    );
                    return finish(text, TurnOutcome::Done, &machine, scratch);
                }
                TurnState::Aborted => {
                    session.history.push(Turn::assistant(FALLBACK_REPLY));
                    warn!(
                        reason = ?machine.abort_reason(),
                        failures = machine.failures(),
                        model_calls = scratch.model_calls,
                        "turn aborted"
                    );
                    return finish(
                        FALLBACK_REPLY.to_string(),
                        TurnOutcome::Aborted,
                        &machine,
                        scratch,
                    );
                }
            }
        }
    }

    fn await_model(&self, session: &Session, machine: &mut TurnMachine, scratch: &mut TurnScratch) {
        let request = self.request(&session.history, &scratch.corrections);
        scratch.model_calls += 1;
        let raw = match self.model.complete(&request) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, failures = machine.failures() + 1, "model call failed");
                machine.on_model_failure();
                return;
            }
        };

        let parsed = parse_action(&raw);
        match &parsed {
            Ok(_) => scratch.corrections.clear(),
            Err(err) => {
                warn!(
                    kind = err.kind(),
                    %err,
                    failures = machine.failures() + 1,
                    "unusable model output"
                );
                scratch.corrections.push(ModelMessage::assistant(raw));
                scratch.corrections.push(ModelMessage::user(self.correction(err)));
            }
        }
        machine.on_model_output(parsed);
    }

    fn dispatch_tool(&self, session: &mut Session, call: &ToolCall, scratch: &mut TurnScratch) {
        session.history.push(Turn::tool_call(call.clone()));
        let observation = match call {
            ToolCall::LogRecruiterLead(_) if scratch.lead_capture_failed => Observation::Refused {
                reason: "lead capture already failed in this turn; tell the user it was not saved"
                    .to_string(),
            },
            _ => self.tools.dispatch(call),
        };
        debug!(tool = %call.name(), "tool finished");

        match &observation {
            Observation::LeadLogged(lead) => {
                session.leads.push(lead.clone());
                scratch.lead = Some(LeadNotice::Captured { lead: lead.clone() });
            }
            Observation::LeadCaptureFailed { reason } => {
                scratch.lead_capture_failed = true;
                scratch.lead = Some(LeadNotice::CaptureFailed {
                    reason: reason.clone(),
                });
            }
            _ => {}
        }
        session
            .history
            .push(Turn::observation(call.name(), observation.to_json()));
    }

    fn request(&self, history: &ConversationHistory, corrections: &[ModelMessage]) -> ModelRequest {
        let mut messages: Vec<ModelMessage> =
            history.turns().iter().map(ModelMessage::from_turn).collect();
        messages.extend(corrections.iter().cloned());
        ModelRequest {
            system: self.system_prompt.clone(),
            messages,
        }
    }

    fn correction(&self, err: &ActionError) -> String {
        self.prompts.render_correction(err).unwrap_or_else(|render_err| {
            warn!(%render_err, "correction template failed");
            format!("Your previous response could not be used: {err}. Respond with one JSON action.")
        })
    }
}

fn finish(text: String, outcome: TurnOutcome, machine: &TurnMachine, scratch: TurnScratch) -> TurnReply {
    TurnReply {
        text,
        outcome,
        lead: scratch.lead,
        model_calls: scratch.model_calls,
        tool_calls: machine.tool_calls(),
    }
}
