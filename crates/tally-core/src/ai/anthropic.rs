//! Anthropic Messages API backend
//!
//! Sends the receipt as a base64 image block followed by the extraction
//! prompt as a text block, and maps provider failures onto
//! [`ModelUnavailable`] so the user sees a specific message.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::AIBackend;
use crate::error::{ExtractionError, ModelUnavailable};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const API_VERSION: &str = "2023-06-01";

/// Replies are a single JSON object, so this is plenty
const MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API request
#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

/// Message in conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String, // "user", "assistant"
    pub content: MessageContent,
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create a user message from content blocks
    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: "user".into(),
            content: MessageContent::Blocks(blocks),
        }
    }
}

/// Message content (text or blocks)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// Content block types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "image")]
    Image { source: ImageSource },

    /// Block types we never send and ignore on receipt
    #[serde(other)]
    Other,
}

impl ContentBlock {
    /// Create a text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an inline base64 image block
    pub fn image(media_type: &str, bytes: &[u8]) -> Self {
        Self::Image {
            source: ImageSource {
                source_type: "base64".into(),
                media_type: media_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        }
    }
}

/// Inline image payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

/// Anthropic Messages API response
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub model: String,
    pub stop_reason: Option<String>, // "end_turn", "max_tokens"
    pub usage: Option<Usage>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl MessagesResponse {
    /// Extract text content from the response
    pub fn text(&self) -> Option<String> {
        let texts: Vec<_> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }
}

/// Map a non-success HTTP status (and its body) to a reason
pub fn classify_status(status: u16, body: &str) -> ModelUnavailable {
    let body = body.to_lowercase();
    match status {
        401 | 403 => ModelUnavailable::Authentication,
        402 => ModelUnavailable::QuotaExhausted,
        429 => ModelUnavailable::RateLimited,
        _ if body.contains("credit balance") || body.contains("billing") => {
            ModelUnavailable::QuotaExhausted
        }
        _ => ModelUnavailable::Upstream { status },
    }
}

fn classify_transport(err: &reqwest::Error) -> ModelUnavailable {
    if err.is_timeout() {
        ModelUnavailable::Timeout
    } else {
        ModelUnavailable::Unreachable(err.to_string())
    }
}

/// Anthropic Messages API backend
#[derive(Clone)]
pub struct AnthropicBackend {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl AnthropicBackend {
    /// Create a new backend; every request is bounded by `timeout`
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to a default HTTP client");
                Client::new()
            });
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    /// Create from environment (`ANTHROPIC_*`); None without an API key
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())?;
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Some(Self::new(
            &base_url,
            api_key.trim(),
            &model,
            Duration::from_secs(timeout_secs),
        ))
    }

    /// Send a messages request
    pub async fn messages(
        &self,
        messages: Vec<Message>,
        max_tokens: u32,
    ) -> Result<MessagesResponse, ExtractionError> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens,
            messages,
        };

        debug!(model = %self.model, "Sending Anthropic messages request");

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .timeout(self.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::from(classify_transport(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = classify_status(status.as_u16(), &body);
            warn!(status = status.as_u16(), reason = %reason, "Anthropic API error");
            return Err(reason.into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::from(classify_transport(&e)))?;

        serde_json::from_str(&body).map_err(|e| {
            ExtractionError::MalformedResponse(format!("unexpected API response: {}", e))
        })
    }
}

#[async_trait]
impl AIBackend for AnthropicBackend {
    async fn extract_receipt(
        &self,
        image: &[u8],
        mime: &str,
        prompt: &str,
    ) -> Result<String, ExtractionError> {
        let started = Instant::now();
        let message = Message::user_blocks(vec![
            ContentBlock::image(mime, image),
            ContentBlock::text(prompt),
        ]);

        let response = self.messages(vec![message], MAX_TOKENS).await?;

        info!(
            model = %self.model,
            latency_ms = started.elapsed().as_millis() as u64,
            output_tokens = response.usage.as_ref().map(|u| u.output_tokens).unwrap_or(0),
            "Receipt extraction reply received"
        );

        response
            .text()
            .ok_or_else(|| ExtractionError::MalformedResponse("no text in model response".into()))
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .timeout(self.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
