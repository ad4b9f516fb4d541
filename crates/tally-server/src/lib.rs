//! Tally Web Server
//!
//! Axum-based REST API for the Tally receipt expense tracker.
//!
//! Security features:
//! - Session authentication (cookie or bearer token) on every data route
//! - Restrictive CORS policy
//! - Input validation (filter parameters, upload size limit)
//! - Audit logging for every mutation
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use tally_core::ai::{AIBackend, AIClient};
use tally_core::db::Database;
use tally_core::models::User;
use tally_core::{Error as CoreError, ExtractionError, ModelUnavailable, Scanner};

mod handlers;

/// Maximum file upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Session cookie name
pub const SESSION_COOKIE: &str = "session_token";

/// Environment variable listing admin emails (comma-separated)
pub const ADMIN_EMAILS_ENV: &str = "TALLY_ADMIN_EMAILS";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Mark the session cookie Secure (disable only for local http)
    pub secure_cookies: bool,
    /// Users allowed to call the admin endpoints
    pub admin_emails: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            secure_cookies: true,
            admin_emails: vec![],
        }
    }
}

impl ServerConfig {
    /// Read admin principals from `TALLY_ADMIN_EMAILS`
    pub fn with_admin_emails_from_env(mut self) -> Self {
        if let Ok(value) = std::env::var(ADMIN_EMAILS_ENV) {
            self.admin_emails = parse_email_list(&value);
        }
        self
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

/// Parse a comma-separated list of emails, lowercased, blanks dropped
pub fn parse_email_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub scanner: Scanner,
}

/// The authenticated user, inserted by [`auth_middleware`]
#[derive(Clone)]
pub struct CurrentUser(pub User);

/// Pull the session token from the cookie, else from `Authorization: Bearer`
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Authentication middleware - resolves the session to a user
///
/// Expired sessions are deleted as they are seen and treated like missing
/// ones.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers()) else {
        debug!(path = %request.uri().path(), "Request without session");
        return AppError::unauthorized("Not authenticated").into_response();
    };

    match state.db.get_session_user(&token, Utc::now()) {
        Ok(Some(user)) => {
            debug!(user = %user.email, path = %request.uri().path(), "Authenticated via session");
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Ok(None) => {
            warn!(path = %request.uri().path(), "Invalid or expired session");
            AppError::unauthorized("Not authenticated").into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Create the application router
///
/// The vision backend is taken from the environment; see
/// [`AIClient::from_env`].
pub fn create_router(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> tally_core::Result<Router> {
    let ai = AIClient::from_env();
    match &ai {
        Some(client) => info!(
            "AI backend configured: {} (model: {})",
            client.host(),
            client.model()
        ),
        None => info!("AI backend not configured (set ANTHROPIC_API_KEY to enable receipt scanning)"),
    }

    let scanner = Scanner::new(ai)?;
    Ok(create_router_with_scanner(db, static_dir, config, scanner))
}

/// Create the application router with an explicit scanner (for testing)
pub fn create_router_with_scanner(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    scanner: Scanner,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        scanner,
    });

    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/categories", get(handlers::list_categories))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout));

    let protected_routes = Router::new()
        // Auth
        .route("/auth/me", get(handlers::get_me))
        // Receipts
        .route("/scan-receipt", post(handlers::scan_receipt))
        .route("/upload-receipt-image", post(handlers::upload_receipt_image))
        // Expenses
        .route(
            "/expenses",
            get(handlers::list_expenses).post(handlers::create_expense),
        )
        .route("/expenses/bulk-delete", post(handlers::bulk_delete_expenses))
        .route(
            "/expenses/:id",
            get(handlers::get_expense)
                .put(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
        .route("/tags", get(handlers::list_tags))
        // Analytics and reports
        .route("/analytics/summary", get(handlers::get_summary))
        .route("/reports/generate", post(handlers::generate_report))
        // Admin
        .route("/admin/users", get(handlers::admin_list_users))
        .route("/admin/stats", get(handlers::admin_stats))
        .route("/admin/audit", get(handlers::admin_audit_log))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = public_routes
        .merge(protected_routes)
        // Multipart bodies count against this; leave room for form framing
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 64 * 1024));

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    // No configured origins means same-origin only
    let cors = match allowed_origin_headers(&config.allowed_origins) {
        Some(origins) => cors.allow_origin(origins).allow_credentials(true),
        None => cors,
    };

    // CSP: same-origin scripts, data: URIs for embedded receipt images
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

fn allowed_origin_headers(origins: &[String]) -> Option<Vec<HeaderValue>> {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    (!parsed.is_empty()).then_some(parsed)
}

/// Start the server
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.secure_cookies {
        warn!("Session cookies are not marked Secure - do not expose to network!");
    }

    match db.purge_expired_sessions(Utc::now()) {
        Ok(count) if count > 0 => info!("Removed {} expired session(s)", count),
        Ok(_) => {}
        Err(e) => warn!("Failed to purge expired sessions: {}", e),
    }

    check_ai_connection().await;

    let app = create_router(db, static_dir, config)?;

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Probe the vision backend once at startup so misconfiguration shows in the log
async fn check_ai_connection() {
    match AIClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!("AI backend connected: {} ({})", client.host(), client.model());
            } else {
                warn!(
                    "AI backend configured but not responding: {} ({})",
                    client.host(),
                    client.model()
                );
            }
        }
        None => {
            info!("AI backend not configured (set ANTHROPIC_API_KEY to enable receipt scanning)");
        }
    }
}

/// Error returned by handlers: a status plus a client-safe message
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn unsupported_media_type(msg: &str) -> Self {
        Self::with_status(StatusCode::UNSUPPORTED_MEDIA_TYPE, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Map an extraction failure to its own status and user-facing message
    pub fn extraction(err: ExtractionError) -> Self {
        let status = match &err {
            ExtractionError::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ExtractionError::ProcessingFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ExtractionError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            ExtractionError::ModelUnavailable(ModelUnavailable::RateLimited) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ExtractionError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        warn!(error = %err, status = status.as_u16(), "Receipt extraction failed");
        Self::with_status(status, &err.user_message())
    }

    /// Map a core error, keeping validation and lookup failures visible
    pub fn from_core(err: CoreError) -> Self {
        match err {
            CoreError::InvalidData(msg) => Self::bad_request(&msg),
            CoreError::NotFound(msg) => Self::not_found(&msg),
            CoreError::Auth(msg) => Self::unauthorized(&msg),
            CoreError::Extraction(e) => Self::extraction(e),
            other => Self::from(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        // Details stay in the log; the client only sees a generic message
        Self {
            internal: Some(err.into()),
            ..Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred")
        }
    }
}
