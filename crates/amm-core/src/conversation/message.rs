//! Conversation message types.
//!
//! This module contains types for representing messages in a conversation,
//! including roles, content, and chart attachments.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Message streamed back by the assistant.
    Assistant,
}

/// A chart rendered server-side and attached to an assistant message.
///
/// The payload is opaque to the client: it is appended verbatim and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartData {
    /// PNG image, base64 encoded.
    pub image_base64: String,
    /// Chart kind as reported by the server (e.g. "bar", "line").
    pub chart_type: String,
    /// Short textual summary of what the chart shows.
    pub summary: String,
}

/// A single message in the conversation.
///
/// User messages are immutable once created. Assistant messages start empty
/// and only ever grow as `message` frames arrive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier.
    pub id: String,
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Timestamp when the message was created (RFC 3339).
    pub timestamp: String,
    /// Charts attached to the message, in arrival order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<ChartData>,
}

impl Message {
    /// Creates a user message with the given content.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into())
    }

    /// Creates an empty assistant message, used as the streaming target of a turn.
    pub fn assistant_placeholder() -> Self {
        Self::new(MessageRole::Assistant, String::new())
    }

    fn new(role: MessageRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: chrono::Utc::now().to_rfc3339(),
            charts: Vec::new(),
        }
    }
}
