//! Expense handlers
//!
//! Every query is scoped to the session's user; another user's expense id
//! behaves exactly like a missing one.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::meta::MessageResponse;
use super::{json_body, parse_amount_param, parse_date_param};
use crate::{AppError, AppState, CurrentUser};
use tally_core::db::{ExpenseFilter, LIST_LIMIT};
use tally_core::models::{Expense, ExpenseUpdate, NewExpense};

#[derive(Serialize)]
pub struct CreateExpenseResponse {
    pub expense_id: String,
    pub message: String,
}

/// POST /api/expenses - Save a reviewed draft or a manual entry
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<NewExpense>, JsonRejection>,
) -> Result<Json<CreateExpenseResponse>, AppError> {
    let new = json_body(payload)?
        .validate()
        .map_err(AppError::from_core)?;
    let expense = state.db.create_expense(&user.user_id, &new)?;

    state.db.log_audit(
        &user.email,
        "create",
        Some("expense"),
        Some(&expense.expense_id),
        Some(&format!("vendor={}, amount={:.2}", expense.vendor, expense.amount)),
    )?;

    Ok(Json(CreateExpenseResponse {
        expense_id: expense.expense_id,
        message: "Expense created successfully".to_string(),
    }))
}

/// Query parameters for listing expenses
///
/// Kept as strings so malformed values produce a descriptive 400.
#[derive(Debug, Default, Deserialize)]
pub struct ExpenseQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub category: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub vendor: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl ExpenseQuery {
    fn to_filter(&self) -> Result<ExpenseFilter, AppError> {
        let start = parse_date_param(self.start_date.as_deref(), "start_date")?;
        let end = parse_date_param(self.end_date.as_deref(), "end_date")?;
        let min = parse_amount_param(self.min_amount.as_deref(), "min_amount")?;
        let max = parse_amount_param(self.max_amount.as_deref(), "max_amount")?;

        Ok(ExpenseFilter::new()
            .date_range(start, end)
            .category(self.category.as_deref())
            .amount_range(min, max)
            .vendor(self.vendor.as_deref())
            .tag(self.tag.as_deref())
            .search(self.search.as_deref()))
    }
}

/// GET /api/expenses - List the user's expenses, newest first
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<ExpenseQuery>,
) -> Result<Json<Vec<Expense>>, AppError> {
    let filter = params.to_filter()?;
    let expenses = state.db.list_expenses(&user.user_id, &filter, LIST_LIMIT)?;
    Ok(Json(expenses))
}

/// GET /api/expenses/:id - Fetch one expense
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Expense>, AppError> {
    let expense = state
        .db
        .get_expense(&user.user_id, &id)?
        .ok_or_else(|| AppError::not_found("Expense not found"))?;
    Ok(Json(expense))
}

/// PUT /api/expenses/:id - Partial update; absent fields are left alone
pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    payload: Result<Json<ExpenseUpdate>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let update = json_body(payload)?
        .validate()
        .map_err(AppError::from_core)?;

    if !state.db.update_expense(&user.user_id, &id, &update)? {
        return Err(AppError::not_found("Expense not found"));
    }

    state
        .db
        .log_audit(&user.email, "update", Some("expense"), Some(&id), None)?;

    Ok(MessageResponse::new("Expense updated successfully"))
}

/// DELETE /api/expenses/:id - Delete one expense
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.db.delete_expense(&user.user_id, &id)? {
        return Err(AppError::not_found("Expense not found"));
    }

    state
        .db
        .log_audit(&user.email, "delete", Some("expense"), Some(&id), None)?;
    info!(user = %user.email, expense_id = %id, "Expense deleted");

    Ok(MessageResponse::new("Expense deleted successfully"))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub expense_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct BulkDeleteResponse {
    pub deleted_count: usize,
}

/// POST /api/expenses/bulk-delete - Delete the listed expenses the user owns
///
/// Ids that are missing or belong to someone else are skipped silently.
pub async fn bulk_delete_expenses(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> Result<Json<BulkDeleteResponse>, AppError> {
    let body = json_body(payload)?;
    let deleted = state
        .db
        .bulk_delete_expenses(&user.user_id, &body.expense_ids)?;

    state.db.log_audit(
        &user.email,
        "bulk_delete",
        Some("expense"),
        None,
        Some(&format!(
            "requested={}, deleted={}",
            body.expense_ids.len(),
            deleted
        )),
    )?;
    info!(user = %user.email, requested = body.expense_ids.len(), deleted, "Bulk delete");

    Ok(Json(BulkDeleteResponse {
        deleted_count: deleted,
    }))
}

#[derive(Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

/// GET /api/tags - Distinct tags on the user's expenses, sorted
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<TagsResponse>, AppError> {
    let tags = state.db.list_tags(&user.user_id)?;
    Ok(Json(TagsResponse { tags }))
}
