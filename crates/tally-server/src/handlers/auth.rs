//! Authentication-related handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::meta::MessageResponse;
use crate::{session_token, AppError, AppState, CurrentUser, SESSION_COOKIE};
use tally_core::db::SESSION_TTL_DAYS;
use tally_core::models::User;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: User,
    /// Same value as the cookie, for clients that send a bearer token
    pub session_token: String,
}

/// Build the Set-Cookie value for a session
///
/// SameSite=None requires Secure, so insecure (local http) cookies fall back
/// to Lax.
pub(crate) fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let attrs = if secure {
        "SameSite=None; Secure"
    } else {
        "SameSite=Lax"
    };
    format!(
        "{}={}; HttpOnly; {}; Max-Age={}; Path=/",
        SESSION_COOKIE, token, attrs, max_age_secs
    )
}

fn with_cookie(mut response: Response, cookie: &str) -> Result<Response, AppError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|_| AppError::internal("Failed to build session cookie"))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

/// POST /api/auth/login - Exchange credentials for a session cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, AppError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }

    let Some(user) = state.db.authenticate(&body.email, &body.password)? else {
        warn!(email = %body.email, "Failed login");
        return Err(AppError::unauthorized("Invalid email or password"));
    };

    let session = state.db.create_session(&user.user_id)?;
    state
        .db
        .log_audit(&user.email, "login", Some("session"), None, None)?;
    info!(user = %user.email, "User logged in");

    let cookie = session_cookie(
        &session.session_token,
        SESSION_TTL_DAYS * 24 * 60 * 60,
        state.config.secure_cookies,
    );
    let response = Json(LoginResponse {
        user,
        session_token: session.session_token,
    })
    .into_response();

    with_cookie(response, &cookie)
}

/// GET /api/auth/me - The user behind the current session
pub async fn get_me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<User> {
    Json(user)
}

/// POST /api/auth/logout - Drop the session (if any) and clear the cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = session_token(&headers) {
        if state.db.delete_session(&token)? {
            info!("Session ended");
        }
    }

    let response = MessageResponse::new("Logged out successfully").into_response();
    with_cookie(
        response,
        &session_cookie("", 0, state.config.secure_cookies),
    )
}
