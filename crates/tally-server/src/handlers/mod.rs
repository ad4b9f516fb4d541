//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod expenses;
pub mod meta;
pub mod receipts;
pub mod reports;

// Re-export all handlers for use in router
pub use admin::*;
pub use analytics::*;
pub use auth::*;
pub use expenses::*;
pub use meta::*;
pub use receipts::*;
pub use reports::*;

use axum::{extract::rejection::JsonRejection, Json};
use chrono::NaiveDate;

use crate::AppError;

/// Unwrap a JSON body, reporting malformed input as 400 instead of axum's 422
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| AppError::bad_request(&e.body_text()))
}

/// Parse an optional `YYYY-MM-DD` query value
pub(crate) fn parse_date_param(
    value: Option<&str>,
    name: &str,
) -> Result<Option<NaiveDate>, AppError> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .map_err(|_| AppError::bad_request(&format!("Invalid {} (use YYYY-MM-DD)", name)))
}

/// Parse an optional amount query value
pub(crate) fn parse_amount_param(value: Option<&str>, name: &str) -> Result<Option<f64>, AppError> {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(Some(amount)),
        _ => Err(AppError::bad_request(&format!(
            "Invalid {} (expected a number)",
            name
        ))),
    }
}
