//! Skill execution trace and plan types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lifecycle of a single skill invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStatus {
    Running,
    Completed,
    Error,
}

/// One entry of the skill execution trace.
///
/// Steps are created `Running` and updated in place when the matching
/// result arrives. They are never removed or reordered within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillStep {
    /// Client-side unique identifier.
    pub id: String,
    /// Machine name of the skill (e.g. `work_order_lookup`).
    pub skill_name: String,
    /// Human-readable skill name.
    pub display_name: String,
    pub icon: String,
    pub status: SkillStatus,
    /// Input passed to the skill, rendered as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Structured output reported by the skill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Map<String, Value>>,
    /// Server timestamp of `skill_start`.
    pub timestamp: String,
    /// Server timestamp of the result, once finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<String>,
}

impl SkillStep {
    /// Creates a running step with a fresh identifier.
    pub fn running(
        skill_name: impl Into<String>,
        display_name: impl Into<String>,
        icon: impl Into<String>,
        input: Option<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            skill_name: skill_name.into(),
            display_name: display_name.into(),
            icon: icon.into(),
            status: SkillStatus::Running,
            input,
            output: None,
            timestamp: timestamp.into(),
            end_timestamp: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == SkillStatus::Running
    }

    /// Marks the step finished with the given status.
    pub(crate) fn finish(
        &mut self,
        status: SkillStatus,
        output: Option<Map<String, Value>>,
        end_timestamp: String,
    ) {
        self.status = status;
        self.output = output;
        self.end_timestamp = Some(end_timestamp);
    }
}

/// A declared skill invocation for the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub skill: String,
    #[serde(default, deserialize_with = "crate::stream::interpreter::null_as_default")]
    pub reason: String,
}

/// Display status of a plan step, derived from the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Pending,
    Running,
    Completed,
}

impl PlanStep {
    /// Derives the display status of this plan step from the skill trace.
    ///
    /// A running step with the same skill name wins over a finished one, so a
    /// skill invoked a second time shows as running again. Steps that ended
    /// in error count as completed.
    pub fn status_in(&self, steps: &[SkillStep]) -> PlanStatus {
        let mut seen_finished = false;
        for step in steps.iter().filter(|s| s.skill_name == self.skill) {
            if step.is_running() {
                return PlanStatus::Running;
            }
            seen_finished = true;
        }

        if seen_finished {
            PlanStatus::Completed
        } else {
            PlanStatus::Pending
        }
    }
}
