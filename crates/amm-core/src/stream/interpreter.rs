//! Maps decoded frames to conversation transitions.
//!
//! [`interpret`] is a pure function: it never touches the conversation, it
//! only describes what should change. The reducer in
//! [`crate::conversation::Conversation::apply`] performs the mutation.

use serde::{Deserialize, Deserializer};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::decoder::Frame;
use crate::conversation::{ChartData, PlanStep, SkillStep};

pub const SKILL_START: &str = "skill_start";
pub const SKILL_RESULT: &str = "skill_result";
pub const SKILL_ERROR: &str = "skill_error";
pub const MESSAGE: &str = "message";
pub const CHART: &str = "chart";
pub const PLAN: &str = "plan";
pub const ERROR: &str = "error";

const DEFAULT_SKILL_ICON: &str = "🔧";
const UNKNOWN_ERROR: &str = "Unknown error";

/// A state change described by one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Append a new running step to the trace.
    StartSkill(SkillStep),
    /// Complete the latest running step with this skill name.
    CompleteSkill {
        skill_name: String,
        output: Option<Map<String, Value>>,
        end_timestamp: String,
    },
    /// Mark the latest running step with this skill name as failed.
    FailSkill {
        skill_name: String,
        message: Option<String>,
        end_timestamp: String,
    },
    /// Append a text delta to a message.
    AppendContent { message_id: String, delta: String },
    /// Attach a chart to a message.
    AppendChart { message_id: String, chart: ChartData },
    /// Replace the plan of the current turn.
    SetPlan(Vec<PlanStep>),
    /// Surface a server-reported error.
    SetError(String),
    /// Unknown or unusable frame.
    Ignore,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkillStartPayload {
    #[serde(deserialize_with = "null_as_default")]
    skill_name: String,
    #[serde(deserialize_with = "null_as_default")]
    display_name: String,
    #[serde(deserialize_with = "null_as_default")]
    icon: String,
    input: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkillResultPayload {
    #[serde(deserialize_with = "null_as_default")]
    skill_name: String,
    output: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkillErrorPayload {
    #[serde(deserialize_with = "null_as_default")]
    skill_name: String,
    message: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessagePayload {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChartPayload {
    #[serde(deserialize_with = "null_as_default")]
    image_base64: String,
    #[serde(deserialize_with = "null_as_default")]
    chart_type: String,
    #[serde(deserialize_with = "null_as_default")]
    summary: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlanPayload {
    #[serde(deserialize_with = "null_as_default")]
    steps: Vec<PlanStep>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorPayload {
    message: Option<String>,
}

/// Interprets one frame in the context of the turn's assistant message.
pub fn interpret(frame: &Frame, assistant_message_id: &str) -> Transition {
    match frame.event_type.as_str() {
        SKILL_START => parse::<SkillStartPayload>(frame).map_or(Transition::Ignore, |p| {
            let display_name = if p.display_name.is_empty() {
                p.skill_name.clone()
            } else {
                p.display_name
            };
            let icon = if p.icon.is_empty() {
                DEFAULT_SKILL_ICON.to_string()
            } else {
                p.icon
            };
            Transition::StartSkill(SkillStep::running(
                p.skill_name,
                display_name,
                icon,
                p.input.and_then(input_text),
                p.timestamp,
            ))
        }),
        SKILL_RESULT => {
            parse::<SkillResultPayload>(frame).map_or(Transition::Ignore, |p| {
                Transition::CompleteSkill {
                    skill_name: p.skill_name,
                    output: p.output.and_then(output_map),
                    end_timestamp: p.timestamp,
                }
            })
        }
        SKILL_ERROR => parse::<SkillErrorPayload>(frame).map_or(Transition::Ignore, |p| {
            Transition::FailSkill {
                skill_name: p.skill_name,
                message: p.message,
                end_timestamp: p.timestamp,
            }
        }),
        MESSAGE => match parse::<MessagePayload>(frame).and_then(|p| p.content) {
            Some(delta) => Transition::AppendContent {
                message_id: assistant_message_id.to_string(),
                delta,
            },
            None => Transition::Ignore,
        },
        CHART => parse::<ChartPayload>(frame).map_or(Transition::Ignore, |p| {
            Transition::AppendChart {
                message_id: assistant_message_id.to_string(),
                chart: ChartData {
                    image_base64: p.image_base64,
                    chart_type: p.chart_type,
                    summary: p.summary,
                },
            }
        }),
        PLAN => parse::<PlanPayload>(frame).map_or(Transition::Ignore, |p| {
            Transition::SetPlan(p.steps)
        }),
        ERROR => {
            let message = parse::<ErrorPayload>(frame)
                .and_then(|p| p.message)
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
            Transition::SetError(message)
        }
        other => {
            tracing::debug!("Ignoring stream event '{}'", other);
            Transition::Ignore
        }
    }
}

/// Treats an explicit JSON `null` like a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse<T: DeserializeOwned>(frame: &Frame) -> Option<T> {
    match serde_json::from_value(Value::Object(frame.data.clone())) {
        Ok(payload) => Some(payload),
        Err(err) => {
            tracing::debug!(
                event_type = %frame.event_type,
                "Ignoring frame with unexpected payload shape: {}",
                err
            );
            None
        }
    }
}

fn input_text(input: Value) -> Option<String> {
    match input {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

fn output_map(output: Value) -> Option<Map<String, Value>> {
    match output {
        Value::Null => None,
        Value::Object(map) => Some(map),
        other => {
            let mut wrapped = Map::new();
            wrapped.insert("result".to_string(), other);
            Some(wrapped)
        }
    }
}
