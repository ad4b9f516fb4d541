//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Report error: {0}")]
    Report(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the receipt extraction pipeline.
///
/// Each variant carries a distinct message meant for the person who uploaded
/// the receipt; see [`ExtractionError::user_message`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// The upload is a format the pipeline cannot turn into an image.
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Decoding, resizing or re-encoding the image failed.
    #[error("Image processing failed: {0}")]
    ProcessingFailed(String),

    /// The model replied, but not with a usable structured object.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] ModelUnavailable),
}

/// Why the vision model could not be reached or refused the request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelUnavailable {
    #[error("no vision model configured")]
    NotConfigured,

    #[error("authentication rejected by the model provider")]
    Authentication,

    #[error("model provider credit or quota exhausted")]
    QuotaExhausted,

    #[error("rate limited by the model provider")]
    RateLimited,

    #[error("model request timed out")]
    Timeout,

    #[error("model provider unreachable: {0}")]
    Unreachable(String),

    #[error("model provider error (HTTP {status})")]
    Upstream { status: u16 },
}

impl ExtractionError {
    /// Message shown to the user. Never generic: every kind says what went
    /// wrong and what to do next.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedFormat { format } => format!(
                "This {} file could not be read as a receipt. Please upload an image (JPG, PNG or WEBP) instead.",
                format
            ),
            Self::ProcessingFailed(_) => {
                "The image could not be processed. It may be corrupted; try another photo or scan."
                    .to_string()
            }
            Self::MalformedResponse(_) => {
                "The receipt was read but the result could not be understood. Please try scanning again or enter the expense manually."
                    .to_string()
            }
            Self::ModelUnavailable(reason) => reason.user_message().to_string(),
        }
    }
}

impl ModelUnavailable {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotConfigured => {
                "Receipt scanning is not configured on this server. Enter the expense manually."
            }
            Self::Authentication => {
                "Receipt scanning is misconfigured (the AI provider rejected our credentials). Please contact the administrator."
            }
            Self::QuotaExhausted => {
                "Receipt scanning is temporarily unavailable because the AI credit balance is exhausted. Please try again later or enter the expense manually."
            }
            Self::RateLimited => {
                "Too many receipts are being scanned right now. Please wait a moment and try again."
            }
            Self::Timeout => "The AI service took too long to respond. Please try again.",
            Self::Unreachable(_) => {
                "The AI service could not be reached. Check the connection and try again."
            }
            Self::Upstream { .. } => {
                "The AI service returned an error. Please try again in a few minutes."
            }
        }
    }
}
