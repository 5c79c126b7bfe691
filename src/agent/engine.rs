use std::io::Cursor;

use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::agent::task::{HeldCall, Task, TaskPhase};
use crate::agent::transcript::SessionTranscript;
use crate::computer::Computer;
use crate::errors::{ScreenPilotError, ScreenPilotResult};
use crate::service::client::PlannerClient;
use crate::service::types::{
    CallOutput, ComputerAction, ContentPart, Item, Response, SafetyCheck, SummaryPart,
};

/// Drives the per-turn protocol against the planning service: request →
/// decode output items → execute actions through the (scaled) computer →
/// feed the follow-up screenshot back, holding risky calls for consent.
///
/// One agent owns one task at a time; there is no terminal state, the loop
/// runs until the caller stops invoking [`Agent::continue_task`].
pub struct Agent<P, C> {
    planner: P,
    computer: C,
    bypass_safety_checks: bool,
    transcript: Option<SessionTranscript>,
    task: Option<Task>,
}

impl<P: PlannerClient, C: Computer> Agent<P, C> {
    pub fn new(planner: P, computer: C, bypass_safety_checks: bool) -> Self {
        Self {
            planner,
            computer,
            bypass_safety_checks,
            transcript: None,
            task: None,
        }
    }

    pub fn with_transcript(mut self, transcript: SessionTranscript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    /// Begin a fresh task. Any previous task state is discarded.
    pub fn start_task(&mut self) {
        tracing::info!("task started");
        self.task = Some(Task::new());
    }

    /// Run one protocol exchange. With pending consent, an empty input
    /// acknowledges the held safety checks and executes the action; new text
    /// queues for the next AwaitingInput transition. Otherwise the input is
    /// appended as a user message and the agent keeps executing actions
    /// until the service stops asking for them.
    pub async fn continue_task(&mut self, user_input: &str) -> ScreenPilotResult<()> {
        let mut task = self.task.take().ok_or_else(|| {
            ScreenPilotError::Config("continue_task called before start_task".into())
        })?;
        let result = self.run_turn(&mut task, user_input).await;
        self.task = Some(task);
        result
    }

    // ── Observables ───────────────────────────────────────────────────────

    pub fn requires_user_input(&self) -> bool {
        matches!(
            self.task.as_ref().map(|t| &t.phase),
            Some(TaskPhase::AwaitingInput)
        )
    }

    pub fn requires_consent(&self) -> bool {
        matches!(
            self.task.as_ref().map(|t| &t.phase),
            Some(TaskPhase::AwaitingConsent { .. })
        )
    }

    pub fn pending_safety_checks(&self) -> &[SafetyCheck] {
        match self.task.as_ref().map(|t| &t.phase) {
            Some(TaskPhase::AwaitingConsent { call }) => &call.safety_checks,
            _ => &[],
        }
    }

    pub fn reasoning_summary(&self) -> &str {
        self.task
            .as_ref()
            .map(|t| t.reasoning_summary.as_str())
            .unwrap_or("")
    }

    /// (name, arguments) pairs executed during the last turn, in order.
    pub fn actions(&self) -> &[(String, serde_json::Value)] {
        self.task.as_ref().map(|t| t.actions.as_slice()).unwrap_or(&[])
    }

    /// Assistant messages received during the last turn.
    pub fn messages(&self) -> &[String] {
        self.task.as_ref().map(|t| t.messages.as_slice()).unwrap_or(&[])
    }

    /// Raw last service response, for diagnostics and usage accounting.
    pub fn response(&self) -> Option<&Response> {
        self.task.as_ref().and_then(|t| t.response.as_ref())
    }

    // ── Turn protocol ─────────────────────────────────────────────────────

    async fn run_turn(&self, task: &mut Task, user_input: &str) -> ScreenPilotResult<()> {
        let mut turn_started = false;
        let mut staged_input: Option<String> = None;

        match task.phase.clone() {
            TaskPhase::AwaitingConsent { call } => {
                // Consent resolution takes priority; fresh text rides along
                // until the next AwaitingInput transition.
                if !user_input.trim().is_empty() {
                    tracing::debug!("user text queued behind consent resolution");
                    task.queued_input = Some(user_input.to_string());
                }
                tracing::info!(
                    call_id = %call.call_id,
                    checks = call.safety_checks.len(),
                    "safety checks acknowledged; executing held action"
                );
                self.complete_call(task, &call, &mut turn_started).await?;
            }
            TaskPhase::RetryingCall { call } => {
                if !user_input.trim().is_empty() {
                    task.queued_input = Some(user_input.to_string());
                }
                tracing::info!(call_id = %call.call_id, "retrying failed action");
                self.complete_call(task, &call, &mut turn_started).await?;
            }
            TaskPhase::AwaitingInput => {
                staged_input = if user_input.trim().is_empty() {
                    task.queued_input.take()
                } else {
                    Some(user_input.to_string())
                };
            }
        }

        loop {
            let mut input = task.history.clone();
            if let Some(text) = &staged_input {
                input.push(Item::user_message(text));
            }

            // A retriable failure surfaces before anything is committed: the
            // staged user message, the turn observables and the phase all
            // keep their pre-call values.
            let response = self.planner.create_response(&input).await?;

            if let Some(text) = staged_input.take() {
                if let Some(t) = &self.transcript {
                    t.record_user(&text);
                }
                task.history.push(Item::user_message(&text));
            }
            if !turn_started {
                task.begin_turn();
                turn_started = true;
            }
            task.history.extend(response.output.iter().cloned());
            task.response = Some(response.clone());

            let mut saw_call = false;
            for item in &response.output {
                match item {
                    Item::Reasoning { summary, .. } => {
                        task.reasoning_summary =
                            summary.iter().map(SummaryPart::text).collect::<Vec<_>>().join(" ");
                    }
                    Item::Message { role, content } => {
                        if role == "assistant" {
                            for part in content {
                                if let ContentPart::OutputText { text } = part {
                                    if let Some(t) = &self.transcript {
                                        t.record_assistant(text);
                                    }
                                    task.messages.push(text.clone());
                                }
                            }
                        }
                    }
                    Item::ComputerCall { call_id, action, pending_safety_checks, .. } => {
                        saw_call = true;
                        let call = HeldCall {
                            call_id: call_id.clone(),
                            action: action.clone(),
                            safety_checks: pending_safety_checks.clone(),
                        };
                        if !call.safety_checks.is_empty() {
                            if !self.bypass_safety_checks {
                                tracing::info!(
                                    call_id = %call.call_id,
                                    checks = call.safety_checks.len(),
                                    "action held for caller consent"
                                );
                                task.phase = TaskPhase::AwaitingConsent { call };
                                return Ok(());
                            }
                            // Bypass is configured, never silent.
                            tracing::warn!(
                                call_id = %call.call_id,
                                checks = ?call.safety_checks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
                                "safety checks auto-acknowledged by configuration"
                            );
                        }
                        self.complete_call(task, &call, &mut turn_started).await?;
                    }
                    Item::ComputerCallOutput { .. } => {}
                }
            }

            if !saw_call {
                if let Some(queued) = task.queued_input.take() {
                    staged_input = Some(queued);
                    continue;
                }
                task.phase = TaskPhase::AwaitingInput;
                tracing::debug!("turn complete; awaiting user input");
                return Ok(());
            }
        }
    }

    /// Execute a held computer call and append its screenshot output to the
    /// history. On failure the call is retained so the next `continue_task`
    /// retries it without re-requesting consent.
    async fn complete_call(
        &self,
        task: &mut Task,
        call: &HeldCall,
        turn_started: &mut bool,
    ) -> ScreenPilotResult<()> {
        match self.execute_action(&call.action).await {
            Ok(screenshot) => {
                if !*turn_started {
                    task.begin_turn();
                    *turn_started = true;
                }
                let args = serde_json::to_value(&call.action).unwrap_or_default();
                tracing::info!(action = call.action.name(), call_id = %call.call_id, "action executed");
                if let Some(t) = &self.transcript {
                    t.record_action(call.action.name(), &args);
                }
                task.actions.push((call.action.name().to_string(), args));
                task.history.push(Item::ComputerCallOutput {
                    call_id: call.call_id.clone(),
                    acknowledged_safety_checks: call.safety_checks.clone(),
                    output: CallOutput::ComputerScreenshot {
                        image_url: encode_screenshot(&screenshot)?,
                    },
                });
                task.phase = TaskPhase::AwaitingInput;
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    action = call.action.name(),
                    call_id = %call.call_id,
                    error = %e,
                    "action failed; call retained for retry"
                );
                task.phase = TaskPhase::RetryingCall { call: call.clone() };
                Err(e)
            }
        }
    }

    /// Forward one planner action to the computer and capture the follow-up
    /// screenshot the service expects in the call output.
    async fn execute_action(&self, action: &ComputerAction) -> ScreenPilotResult<RgbaImage> {
        match action {
            ComputerAction::Click { x, y, button } => self.computer.click(*x, *y, *button).await?,
            ComputerAction::DoubleClick { x, y } => self.computer.double_click(*x, *y).await?,
            ComputerAction::Drag { path } => self.computer.drag(path).await?,
            ComputerAction::Keypress { keys } => self.computer.key_press(keys).await?,
            ComputerAction::Move { x, y } => self.computer.mouse_move(*x, *y).await?,
            ComputerAction::Screenshot => {}
            ComputerAction::Scroll { x, y, scroll_x, scroll_y } => {
                self.computer.scroll(*x, *y, *scroll_x, *scroll_y).await?
            }
            ComputerAction::Type { text } => self.computer.type_text(text).await?,
            ComputerAction::Wait => self.computer.wait().await?,
        }
        self.computer.screenshot().await
    }
}

fn encode_screenshot(image: &RgbaImage) -> ScreenPilotResult<String> {
    let mut png = Vec::new();
    let encoder = PngEncoder::new(Cursor::new(&mut png));
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&png)
    ))
}
