//! Receipt extraction pipeline
//!
//! upload bytes -> [`normalizer::normalize`] -> [`prompt::build_prompt`] ->
//! vision model -> [`parse::parse_reply`] -> [`ExtractionDraft`]
//!
//! The draft is never persisted here; the user reviews it first.

pub mod currency;
pub mod normalizer;
pub mod parse;
pub mod prompt;

use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::ai::{AIBackend, AIClient};
use crate::error::{ExtractionError, ModelUnavailable, Result};
use crate::models::{Category, ExtractionDraft};

pub use self::currency::CurrencyRules;
pub use self::normalizer::{FileKind, NormalizedImage, PdfRasterizer};
pub use self::parse::Normalized;

/// Runs the full extraction pipeline against a configured backend
#[derive(Clone)]
pub struct Scanner {
    ai: Option<AIClient>,
    rasterizer: PdfRasterizer,
    rules: CurrencyRules,
}

impl Scanner {
    /// Build a scanner; `ai` may be None, in which case every scan fails
    /// with [`ModelUnavailable::NotConfigured`] after image validation
    pub fn new(ai: Option<AIClient>) -> Result<Self> {
        Ok(Self {
            ai,
            rasterizer: PdfRasterizer::from_env(),
            rules: CurrencyRules::new()?,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.ai.is_some()
    }

    /// Turn an uploaded file into a reviewable draft
    ///
    /// `today` anchors the prompt's year rule and the date fallback.
    pub async fn scan(
        &self,
        upload: &[u8],
        today: NaiveDate,
    ) -> std::result::Result<ExtractionDraft, ExtractionError> {
        let image = normalizer::normalize(upload, &self.rasterizer).await?;

        let Some(ai) = &self.ai else {
            warn!("Receipt scan requested but no AI backend is configured");
            return Err(ModelUnavailable::NotConfigured.into());
        };

        let prompt = prompt::build_prompt(today, &Category::names());
        let started = Instant::now();
        let reply = ai.extract_receipt(&image.bytes, image.mime, &prompt).await?;

        let draft = parse::parse_reply(&reply, today, &self.rules)?;

        info!(
            model = ai.model(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            vendor = %draft.vendor,
            confidence = draft.confidence_score,
            review = draft.review.as_str(),
            defaulted = draft.defaulted_fields.len(),
            "Receipt extracted"
        );

        Ok(draft)
    }
}
