//! Report download handler

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::Response,
    Extension, Json,
};
use serde::Deserialize;
use tracing::error;

use super::{json_body, parse_date_param};
use crate::{AppError, AppState, CurrentUser};
use tally_core::report::{self, ReportFormat};

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    ReportFormat::Pdf.as_str().to_string()
}

/// POST /api/reports/generate - Render the user's expenses in a date range
pub async fn generate_report(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let body = json_body(payload)?;

    let format: ReportFormat = body.format.parse().map_err(AppError::from_core)?;
    let start = parse_date_param(Some(&body.start_date), "start_date")?
        .ok_or_else(|| AppError::bad_request("start_date is required"))?;
    let end = parse_date_param(Some(&body.end_date), "end_date")?
        .ok_or_else(|| AppError::bad_request("end_date is required"))?;
    if start > end {
        return Err(AppError::bad_request("start_date must not be after end_date"));
    }

    let categories = body.categories.filter(|c| !c.is_empty());
    let expenses = state
        .db
        .expenses_in_range(&user.user_id, Some(start), Some(end), categories)?;

    let file = report::generate(&expenses, start, end, &user.name, format).map_err(|e| {
        error!(user = %user.email, error = %e, "Report generation failed");
        AppError::internal("Failed to generate report")
    })?;

    state.db.log_audit(
        &user.email,
        "report",
        Some("report"),
        None,
        Some(&format!(
            "format={}, period={}..{}, expenses={}",
            format,
            start,
            end,
            expenses.len()
        )),
    )?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.filename),
        )
        .body(Body::from(file.bytes))
        .map_err(|_| AppError::internal("Failed to build report response"))
}
