//! Per-turn agent state machine.
//!
//! ```text
//!                 model output / failure
//!  AwaitingModel ───────────────────────────┬──► Done(reply)
//!       ▲   │ unparseable or model error    │
//!       │   └── failures < max ─► AwaitingModel
//!       │       failures == max ─► Aborted
//!       │                                   │ tool call
//!       └──────── tool finished ◄── DispatchingTool(call)
//!                                 (tool_calls > max ─► Aborted)
//! ```
//!
//! The machine is pure: the session drives it with the outcomes of model and
//! tool calls, and it decides what happens next.

use crate::core::action::{ActionError, AgentAction};
use crate::core::tool::ToolCall;

/// Limits that bound one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnLimits {
    /// Failed model calls (unparseable output or collaborator error) allowed per turn.
    pub max_parse_attempts: u32,
    /// Tool dispatches allowed per turn.
    pub max_tool_calls: u32,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            max_parse_attempts: 3,
            max_tool_calls: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    AwaitingModel,
    DispatchingTool(ToolCall),
    Done(String),
    Aborted,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done(_) | TurnState::Aborted)
    }
}

/// Why a turn ended in [`TurnState::Aborted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    RetryBudgetExhausted,
    ToolCallLimit,
}

#[derive(Debug, Clone)]
pub struct TurnMachine {
    limits: TurnLimits,
    state: TurnState,
    failures: u32,
    tool_calls: u32,
    abort_reason: Option<AbortReason>,
}

impl TurnMachine {
    pub fn new(limits: TurnLimits) -> Self {
        Self {
            limits,
            state: TurnState::AwaitingModel,
            failures: 0,
            tool_calls: 0,
            abort_reason: None,
        }
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn tool_calls(&self) -> u32 {
        self.tool_calls
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason
    }

    /// Feed the parse result of a model response.
    pub fn on_model_output(&mut self, parsed: Result<AgentAction, ActionError>) -> &TurnState {
        if self.state != TurnState::AwaitingModel {
            return &self.state;
        }
        match parsed {
            Ok(AgentAction::FinalReply(text)) => self.state = TurnState::Done(text),
            Ok(AgentAction::ToolCall(call)) => {
                if self.tool_calls >= self.limits.max_tool_calls {
                    self.abort(AbortReason::ToolCallLimit);
                } else {
                    self.tool_calls += 1;
                    self.state = TurnState::DispatchingTool(call);
                }
            }
            Err(_) => self.record_failure(),
        }
        &self.state
    }

    /// Record a model collaborator failure; it spends the same budget as bad output.
    pub fn on_model_failure(&mut self) -> &TurnState {
        if self.state == TurnState::AwaitingModel {
            self.record_failure();
        }
        &self.state
    }

    /// The dispatched tool finished and its observation is in the history.
    pub fn on_tool_finished(&mut self) -> &TurnState {
        if matches!(self.state, TurnState::DispatchingTool(_)) {
            self.state = TurnState::AwaitingModel;
        }
        &self.state
    }

    fn record_failure(&mut self) {
        self.failures += 1;
        if self.failures >= self.limits.max_parse_attempts {
            self.abort(AbortReason::RetryBudgetExhausted);
        }
    }

    fn abort(&mut self, reason: AbortReason) {
        self.abort_reason = Some(reason);
        self.state = TurnState::Aborted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_parse_attempts: u32, max_tool_calls: u32) -> TurnLimits {
        TurnLimits {
            max_parse_attempts,
            max_tool_calls,
        }
    }

    fn malformed() -> Result<AgentAction, ActionError> {
        Err(ActionError::Malformed("nope".to_string()))
    }

    fn section_call() -> Result<AgentAction, ActionError> {
        Ok(AgentAction::ToolCall(ToolCall::FetchProfileSection {
            section: "skills".to_string(),
        }))
    }

    #[test]
    fn final_reply_finishes_in_one_step() {
        let mut machine = TurnMachine::new(TurnLimits::default());
        let state = machine.on_model_output(Ok(AgentAction::FinalReply("hi".to_string())));
        assert_eq!(state, &TurnState::Done("hi".to_string()));
        assert_eq!(machine.failures(), 0);
    }

    #[test]
    fn failures_abort_exactly_at_budget() {
        let mut machine = TurnMachine::new(limits(3, 6));
        assert_eq!(machine.on_model_output(malformed()), &TurnState::AwaitingModel);
        assert_eq!(machine.on_model_failure(), &TurnState::AwaitingModel);
        assert_eq!(machine.on_model_output(malformed()), &TurnState::Aborted);
        assert_eq!(machine.failures(), 3);
        assert_eq!(
            machine.abort_reason(),
            Some(AbortReason::RetryBudgetExhausted)
        );

        // Terminal: further input is ignored and the counter stays at the maximum.
        machine.on_model_output(malformed());
        machine.on_model_failure();
        assert_eq!(machine.failures(), 3);
    }

    #[test]
    fn tool_round_trip_returns_to_awaiting_model() {
        let mut machine = TurnMachine::new(TurnLimits::default());
        assert!(matches!(
            machine.on_model_output(section_call()),
            TurnState::DispatchingTool(_)
        ));
        assert_eq!(machine.on_tool_finished(), &TurnState::AwaitingModel);
        assert_eq!(machine.tool_calls(), 1);
    }

    #[test]
    fn successful_tool_calls_do_not_reset_failures() {
        let mut machine = TurnMachine::new(limits(2, 6));
        machine.on_model_output(malformed());
        machine.on_model_output(section_call());
        machine.on_tool_finished();
        assert_eq!(machine.on_model_output(malformed()), &TurnState::Aborted);
    }

    #[test]
    fn tool_call_limit_aborts_without_dispatch() {
        let mut machine = TurnMachine::new(limits(3, 1));
        machine.on_model_output(section_call());
        machine.on_tool_finished();
        assert_eq!(machine.on_model_output(section_call()), &TurnState::Aborted);
        assert_eq!(machine.tool_calls(), 1);
        assert_eq!(machine.abort_reason(), Some(AbortReason::ToolCallLimit));
    }
}
