//! Analytics handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::parse_date_param;
use crate::{AppError, AppState, CurrentUser};
use tally_core::analytics;
use tally_core::models::Summary;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// GET /api/analytics/summary - Category, vendor and monthly aggregates
///
/// Without a date range the summary covers every expense the user owns.
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<SummaryQuery>,
) -> Result<Json<Summary>, AppError> {
    let start = parse_date_param(params.start_date.as_deref(), "start_date")?;
    let end = parse_date_param(params.end_date.as_deref(), "end_date")?;

    let expenses = state
        .db
        .expenses_in_range(&user.user_id, start, end, None)?;

    Ok(Json(analytics::summarize(&expenses)))
}
