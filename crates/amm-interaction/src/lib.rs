//! Transport layer for the AMM Assist backend.
//!
//! [`ChatTransport`] is the seam between the chat session controller and the
//! network. [`ChatApiClient`] implements it over HTTP with `reqwest`.

pub mod chat_api_client;

use std::pin::Pin;

use amm_core::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;

pub use chat_api_client::ChatApiClient;

/// Body chunks of a streaming response, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// Opens the event stream for one chat turn.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends `request` and returns the response body as a chunk stream.
    ///
    /// # Errors
    ///
    /// Returns `AmmError::Transport` when the connection fails and
    /// `AmmError::HttpStatus` when the server answers with a non-success status.
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream>;
}
