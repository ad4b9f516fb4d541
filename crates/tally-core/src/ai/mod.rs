//! Pluggable vision model backend
//!
//! # Architecture
//!
//! - `AIBackend` trait: the single operation the extraction pipeline needs
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `AnthropicBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (anthropic, mock). Default: anthropic
//! - `ANTHROPIC_API_KEY`: API key (required for the anthropic backend)
//! - `ANTHROPIC_MODEL`: Model name (default: claude-sonnet-4-20250514)
//! - `ANTHROPIC_BASE_URL`: API base URL (default: https://api.anthropic.com)
//! - `ANTHROPIC_TIMEOUT_SECS`: Request timeout (default: 60)

pub mod anthropic;
mod mock;

pub use anthropic::AnthropicBackend;
pub use mock::{MockBackend, MockCall};

use async_trait::async_trait;

use crate::error::ExtractionError;

/// A vision model that can read a receipt image
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Send one receipt image with the extraction prompt and return the
    /// model's raw text reply
    async fn extract_receipt(
        &self,
        image: &[u8],
        mime: &str,
        prompt: &str,
    ) -> Result<String, ExtractionError>;

    /// Whether the backend answers and accepts our credentials
    async fn health_check(&self) -> bool;

    /// Model identifier, for logs
    fn model(&self) -> &str;

    /// Base URL, for logs
    fn host(&self) -> &str;
}

/// Backend chosen at startup; cloned into every component that scans
#[derive(Clone)]
pub enum AIClient {
    /// Anthropic Messages API
    Anthropic(AnthropicBackend),
    /// Mock backend for testing and offline demos
    Mock(MockBackend),
}

impl AIClient {
    /// Backend selected by `AI_BACKEND`
    ///
    /// None if the selected backend is missing required settings;
    /// scanning is then reported as not configured.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "anthropic".to_string());

        match backend.to_lowercase().as_str() {
            "anthropic" | "claude" => AnthropicBackend::from_env().map(AIClient::Anthropic),
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to anthropic");
                AnthropicBackend::from_env().map(AIClient::Anthropic)
            }
        }
    }

    /// Canned backend answering with a fixed grocery receipt
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn extract_receipt(
        &self,
        image: &[u8],
        mime: &str,
        prompt: &str,
    ) -> Result<String, ExtractionError> {
        match self {
            AIClient::Anthropic(b) => b.extract_receipt(image, mime, prompt).await,
            AIClient::Mock(b) => b.extract_receipt(image, mime, prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Anthropic(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Anthropic(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Anthropic(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert!(matches!(client, AIClient::Mock(_)));
        assert_eq!(client.model(), "mock");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        assert!(AIClient::mock().health_check().await);
    }

    #[tokio::test]
    async fn test_dispatch_to_mock() {
        let client = AIClient::Mock(MockBackend::with_reply("{\"vendor\": \"X\"}"));
        let reply = client
            .extract_receipt(b"\xFF\xD8", "image/jpeg", "prompt")
            .await
            .unwrap();
        assert_eq!(reply, "{\"vendor\": \"X\"}");
    }
}
