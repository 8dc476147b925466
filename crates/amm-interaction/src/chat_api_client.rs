//! ChatApiClient - HTTP client for the assistant backend.
//!
//! Talks to `POST /api/chat` (event stream) and `GET /api/skills`.

use amm_core::config::ClientConfig;
use amm_core::skill_catalog::{SkillCatalog, SkillInfo, default_skills};
use amm_core::{AmmError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode, header};
use std::time::Duration;

use crate::{ByteStream, ChatRequest, ChatTransport};

const CHAT_PATH: &str = "/api/chat";
const SKILLS_PATH: &str = "/api/skills";
const EVENT_STREAM: &str = "text/event-stream";

/// HTTP implementation of [`ChatTransport`].
#[derive(Clone)]
pub struct ChatApiClient {
    client: Client,
    config: ClientConfig,
}

impl ChatApiClient {
    /// Creates a client for the backend described by `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|err| AmmError::config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self { client, config })
    }

    /// Loads configuration from the user config file and environment.
    pub fn try_from_env() -> Result<Self> {
        Self::new(ClientConfig::load()?)
    }

    /// Fetches the skill catalog from the backend.
    pub async fn fetch_skills(&self) -> Result<Vec<SkillInfo>> {
        let response = self
            .client
            .get(self.config.endpoint(SKILLS_PATH))
            .send()
            .await
            .map_err(|err| AmmError::transport(format!("Skill catalog request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, body));
        }

        let catalog: SkillCatalog = response.json().await?;
        Ok(catalog.skills)
    }

    /// Fetches the skill catalog, substituting the built-in list on failure.
    pub async fn skills_or_default(&self) -> Vec<SkillInfo> {
        match self.fetch_skills().await {
            Ok(skills) => skills,
            Err(err) => {
                tracing::warn!("Using default skill catalog: {}", err);
                default_skills()
            }
        }
    }
}

#[async_trait]
impl ChatTransport for ChatApiClient {
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        let response = self
            .client
            .post(self.config.endpoint(CHAT_PATH))
            .header(header::ACCEPT, EVENT_STREAM)
            .json(request)
            .send()
            .await
            .map_err(|err| AmmError::transport(format!("Chat request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, body));
        }

        tracing::debug!(
            conversation_id = %request.conversation_id,
            "Chat stream opened ({})",
            response.status()
        );

        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|err| AmmError::transport(format!("Chat stream interrupted: {err}")))
        });

        Ok(Box::pin(body))
    }
}

fn map_http_error(status: StatusCode, body: String) -> AmmError {
    // FastAPI reports errors as {"detail": ...}
    let body = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("detail").map(|detail| match detail {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }))
        .unwrap_or(body);

    AmmError::http_status(status.as_u16(), body)
}
