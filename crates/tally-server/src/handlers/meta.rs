//! Unauthenticated informational endpoints

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use tally_core::models::Category;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// GET /api/ - API banner
pub async fn root() -> Json<MessageResponse> {
    MessageResponse::new("Tally Expense Tracker API")
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai_configured: bool,
}

/// GET /api/health - Liveness plus whether receipt scanning is available
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        ai_configured: state.scanner.is_configured(),
    })
}

#[derive(Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<&'static str>,
}

/// GET /api/categories - The fixed category vocabulary
pub async fn list_categories() -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: Category::names(),
    })
}
