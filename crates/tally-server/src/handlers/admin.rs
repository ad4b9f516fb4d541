//! Admin handlers
//!
//! Admins are the emails listed in `TALLY_ADMIN_EMAILS`; everyone else
//! gets 403.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{AppError, AppState, CurrentUser};
use tally_core::db::AuditEntry;
use tally_core::models::{AdminStats, User, UserWithStats};

const DEFAULT_AUDIT_LIMIT: i64 = 100;
const MAX_AUDIT_LIMIT: i64 = 1000;

fn require_admin(state: &AppState, user: &User) -> Result<(), AppError> {
    if state.config.is_admin(&user.email) {
        Ok(())
    } else {
        Err(AppError::forbidden("Admin access required"))
    }
}

/// GET /api/admin/users - Every user with expense count and total
pub async fn admin_list_users(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<UserWithStats>>, AppError> {
    require_admin(&state, &user)?;
    Ok(Json(state.db.list_users_with_stats()?))
}

/// GET /api/admin/stats - Platform-wide counts
pub async fn admin_stats(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<AdminStats>, AppError> {
    require_admin(&state, &user)?;
    Ok(Json(state.db.admin_stats(Utc::now())?))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// GET /api/admin/audit - Most recent audit log entries
pub async fn admin_audit_log(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    require_admin(&state, &user)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    Ok(Json(state.db.list_audit_log(limit)?))
}
