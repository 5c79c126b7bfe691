use serde::Serialize;

use crate::service::types::{ComputerAction, Item, Response, SafetyCheck};

/// A computer call lifted out of a response and not yet completed.
#[derive(Debug, Clone, Serialize)]
pub struct HeldCall {
    pub call_id: String,
    pub action: ComputerAction,
    pub safety_checks: Vec<SafetyCheck>,
}

/// Where the task sits between `continue_task` calls. States carry the data
/// they need, so a held call without a holding state is unrepresentable.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TaskPhase {
    /// The caller must supply user text before the loop can proceed.
    AwaitingInput,
    /// A computer call is held until its safety checks are acknowledged by
    /// the next `continue_task` call.
    AwaitingConsent { call: HeldCall },
    /// An acknowledged call failed to execute; the next `continue_task`
    /// retries it before anything else.
    RetryingCall { call: HeldCall },
}

/// Conversational state for one task. Created by `Agent::start_task`,
/// mutated once per round-trip, never shared across tasks.
#[derive(Debug)]
pub struct Task {
    /// Full ordered item history sent to the service on every request.
    pub history: Vec<Item>,
    pub phase: TaskPhase,
    /// User text received while consent resolution had priority; consumed at
    /// the next transition to AwaitingInput.
    pub queued_input: Option<String>,
    /// Raw last service response, for diagnostics and usage accounting.
    pub response: Option<Response>,
    pub reasoning_summary: String,
    /// (action name, action arguments) pairs executed this turn, in order.
    pub actions: Vec<(String, serde_json::Value)>,
    /// Plain-text assistant messages received this turn.
    pub messages: Vec<String>,
}

impl Task {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            phase: TaskPhase::AwaitingInput,
            queued_input: None,
            response: None,
            reasoning_summary: String::new(),
            actions: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Clear the per-turn observables. Called once per turn, after the first
    /// successful step, so a failed call never wipes the previous turn.
    pub fn begin_turn(&mut self) {
        self.reasoning_summary.clear();
        self.actions.clear();
        self.messages.clear();
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}
