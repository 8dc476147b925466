use serde::Serialize;
use uuid::Uuid;

use super::message::Message;
use super::skill::{PlanStatus, PlanStep, SkillStatus, SkillStep};
use crate::stream::{Frame, Transition, interpret};

/// Handle identifying one request/response cycle.
///
/// Frames are applied through the handle of the turn that received them, so
/// a frame from a turn that was superseded or cleared is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    generation: u64,
    assistant_message_id: String,
}

impl Turn {
    /// Identifier of the assistant message this turn streams into.
    pub fn assistant_message_id(&self) -> &str {
        &self.assistant_message_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The canonical conversation state read by the UI.
///
/// All mutation goes through the methods below. `messages` and
/// `skill_steps` only grow, or have a matching element updated in place;
/// only [`Conversation::reset`] removes anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    conversation_id: String,
    messages: Vec<Message>,
    skill_steps: Vec<SkillStep>,
    plan_steps: Vec<PlanStep>,
    is_loading: bool,
    error: Option<String>,
    #[serde(skip)]
    generation: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Creates an empty conversation with a fresh identifier.
    pub fn new() -> Self {
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            skill_steps: Vec::new(),
            plan_steps: Vec::new(),
            is_loading: false,
            error: None,
            generation: 0,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn skill_steps(&self) -> &[SkillStep] {
        &self.skill_steps
    }

    pub fn plan_steps(&self) -> &[PlanStep] {
        &self.plan_steps
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Looks up a message by id.
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Plan steps paired with their status derived from the trace.
    pub fn plan_progress(&self) -> Vec<(PlanStep, PlanStatus)> {
        self.plan_steps
            .iter()
            .map(|plan| (plan.clone(), plan.status_in(&self.skill_steps)))
            .collect()
    }

    /// Whether `turn` is still the latest turn of this conversation.
    pub fn is_current(&self, turn: &Turn) -> bool {
        turn.generation == self.generation
    }

    /// Starts a new turn.
    ///
    /// Appends the user message and an empty assistant placeholder, clears
    /// the previous turn's trace and plan, and marks the conversation busy.
    /// Any earlier turn stops being current.
    pub fn start_turn(&mut self, user_content: &str) -> Turn {
        self.messages.push(Message::user(user_content.trim()));

        let assistant = Message::assistant_placeholder();
        let assistant_message_id = assistant.id.clone();
        self.messages.push(assistant);

        self.skill_steps.clear();
        self.plan_steps.clear();
        self.is_loading = true;
        self.error = None;
        self.generation += 1;

        Turn {
            generation: self.generation,
            assistant_message_id,
        }
    }

    /// Interprets and applies one frame received by `turn`.
    ///
    /// Returns `false` without touching state when the turn is stale.
    pub fn apply_frame(&mut self, turn: &Turn, frame: &Frame) -> bool {
        if !self.is_current(turn) {
            tracing::debug!(
                event_type = %frame.event_type,
                "Rejecting frame from stale turn {}",
                turn.generation
            );
            return false;
        }

        self.apply(interpret(frame, &turn.assistant_message_id));
        true
    }

    /// Applies a single transition.
    pub(crate) fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::StartSkill(step) => self.skill_steps.push(step),
            Transition::CompleteSkill {
                skill_name,
                output,
                end_timestamp,
            } => self.finish_skill(&skill_name, SkillStatus::Completed, output, end_timestamp),
            Transition::FailSkill {
                skill_name,
                message,
                end_timestamp,
            } => {
                let output = message.map(|message| {
                    let mut map = serde_json::Map::new();
                    map.insert("error".to_string(), message.into());
                    map
                });
                self.finish_skill(&skill_name, SkillStatus::Error, output, end_timestamp);
            }
            Transition::AppendContent { message_id, delta } => {
                match self.messages.iter_mut().find(|m| m.id == message_id) {
                    Some(message) => message.content.push_str(&delta),
                    None => tracing::debug!("No message '{}' to append content to", message_id),
                }
            }
            Transition::AppendChart { message_id, chart } => {
                match self.messages.iter_mut().find(|m| m.id == message_id) {
                    Some(message) => message.charts.push(chart),
                    None => tracing::debug!("No message '{}' to attach chart to", message_id),
                }
            }
            Transition::SetPlan(steps) => self.plan_steps = steps,
            Transition::SetError(message) => self.error = Some(message),
            Transition::Ignore => {}
        }
    }

    /// Records a failure that ended `turn`. Ignored for stale turns.
    pub fn fail_turn(&mut self, turn: &Turn, message: impl Into<String>) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        self.error = Some(message.into());
        true
    }

    /// Marks `turn` finished. Ignored for stale turns, whose state was
    /// already superseded.
    pub fn end_turn(&mut self, turn: &Turn) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        self.is_loading = false;
        true
    }

    /// Drops all messages and trace state and starts a new conversation.
    pub fn reset(&mut self) {
        self.conversation_id = Uuid::new_v4().to_string();
        self.messages.clear();
        self.skill_steps.clear();
        self.plan_steps.clear();
        self.is_loading = false;
        self.error = None;
        self.generation += 1;
    }

    fn finish_skill(
        &mut self,
        skill_name: &str,
        status: SkillStatus,
        output: Option<serde_json::Map<String, serde_json::Value>>,
        end_timestamp: String,
    ) {
        let step = self
            .skill_steps
            .iter_mut()
            .rev()
            .find(|step| step.skill_name == skill_name && step.is_running());

        match step {
            Some(step) => step.finish(status, output, end_timestamp),
            None => tracing::debug!("No running step for skill '{}', ignoring result", skill_name),
        }
    }
}
