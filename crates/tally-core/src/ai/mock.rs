//! Mock backend for testing
//!
//! Returns a configurable canned reply and records every call. Useful for
//! unit tests and for running the app without an API key.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::AIBackend;
use crate::error::ExtractionError;

/// Reply used when none is configured
pub const DEFAULT_REPLY: &str = r#"{
    "vendor": "Mock Market",
    "date": "2024-01-15",
    "amount": 42.50,
    "currency": "USD",
    "category": "Groceries",
    "payment_method": "Visa",
    "receipt_number": "MOCK-0001",
    "line_items": [
        {"description": "Coffee beans", "quantity": 1, "unit_price": 18.00, "total": 18.00},
        {"description": "Oat milk", "quantity": 2, "unit_price": 4.25, "total": 8.50},
        {"description": "Bagels", "quantity": 4, "unit_price": 4.00, "total": 16.00}
    ],
    "confidence_score": 0.92
}"#;

/// What the mock saw on one call
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub mime: String,
    pub image_len: usize,
    pub prompt: String,
}

#[derive(Clone)]
enum MockReply {
    Text(String),
    Fail(ExtractionError),
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    reply: MockReply,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend returning [`DEFAULT_REPLY`]
    pub fn new() -> Self {
        Self::with_reply(DEFAULT_REPLY)
    }

    /// Create a mock that always answers with `reply`
    pub fn with_reply(reply: &str) -> Self {
        Self {
            healthy: true,
            reply: MockReply::Text(reply.to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock whose every call fails with `error`
    pub fn failing(error: ExtractionError) -> Self {
        Self {
            healthy: false,
            reply: MockReply::Fail(error),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Calls received so far (shared between clones)
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn extract_receipt(
        &self,
        image: &[u8],
        mime: &str,
        prompt: &str,
    ) -> Result<String, ExtractionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                mime: mime.to_string(),
                image_len: image.len(),
                prompt: prompt.to_string(),
            });
        }

        match &self.reply {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Fail(err) => Err(err.clone()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
