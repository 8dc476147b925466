//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `message`: chat messages and chart attachments (`Message`, `MessageRole`, `ChartData`)
//! - `skill`: skill trace and plan types (`SkillStep`, `SkillStatus`, `PlanStep`, `PlanStatus`)
//! - `model`: the conversation state store and its reducer (`Conversation`, `Turn`)

mod message;
mod model;
mod skill;

// Re-export public API
pub use message::{ChartData, Message, MessageRole};
pub use model::{Conversation, Turn};
pub use skill::{PlanStatus, PlanStep, SkillStatus, SkillStep};
