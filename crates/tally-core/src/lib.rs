//! Tally Core Library
//!
//! Shared functionality for the Tally receipt expense tracker:
//! - Database access, migrations, users and sessions
//! - Receipt extraction pipeline (image normalizer, prompt, reply parser)
//! - Currency detection rule table
//! - Pluggable vision model backends (Anthropic, mock)
//! - Spending analytics
//! - PDF and spreadsheet reports

pub mod ai;
pub mod analytics;
pub mod db;
pub mod error;
pub mod models;
pub mod receipt;
pub mod report;

pub use ai::{AIBackend, AIClient, AnthropicBackend, MockBackend};
pub use analytics::summarize;
pub use db::{AuditEntry, Database, ExpenseFilter};
pub use error::{Error, ExtractionError, ModelUnavailable, Result};
pub use models::*;
pub use receipt::{CurrencyRules, FileKind, NormalizedImage, PdfRasterizer, Scanner};
pub use report::{ReportFile, ReportFormat};
