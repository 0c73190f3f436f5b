//! HTTP route handlers for the gateway.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - API banner
//! GET  /health                        - Liveness
//! GET  /health/ready                  - Readiness (store reachable)
//! GET  /api/health                    - Storage mode introspection
//!
//! # Auth
//! POST /api/auth/register             - Create account, returns token
//! POST /api/auth/login                - Sign in, returns token
//! GET  /api/auth/me                   - Current user (requires token)
//! POST /api/auth/delete-account       - Delete account + owned data (requires token)
//!
//! # Contacts (requires token)
//! GET    /api/contacts                - List
//! POST   /api/contacts                - Create
//! PUT    /api/contacts/{id}           - Update
//! DELETE /api/contacts/{id}           - Delete
//!
//! # Orders (requires token)
//! GET    /api/orders                  - List, newest first
//! POST   /api/orders                  - Create
//! GET    /api/orders/{id}             - Read
//! PUT    /api/orders/{id}             - Patch (lifecycle-checked)
//! DELETE /api/orders/{id}             - Cancel
//!
//! # Support
//! POST /api/chat/message              - Chat reply
//! POST /api/contact/send-email        - Support email
//! GET  /api/contact/check-email-config - Email credential presence
//! ```

pub mod auth;
pub mod chat;
pub mod contact;
pub mod contacts;
pub mod orders;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;

use crate::state::AppState;

/// Endpoint map advertised on `/`.
#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub health: &'static str,
    pub auth: &'static str,
    pub contacts: &'static str,
    pub orders: &'static str,
    pub email: &'static str,
    pub chat: &'static str,
}

/// Body of `GET /`.
#[derive(Debug, Serialize)]
pub struct Banner {
    pub success: bool,
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
}

/// Body of `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct ApiHealth {
    pub success: bool,
    pub message: &'static str,
    pub storage: &'static str,
}

/// GET /
pub async fn index() -> Json<Banner> {
    Json(Banner {
        success: true,
        message: "Pizza Time Backend API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            health: "/api/health",
            auth: "/api/auth/*",
            contacts: "/api/contacts",
            orders: "/api/orders",
            email: "/api/contact/send-email",
            chat: "/api/chat/message",
        },
    })
}

/// GET /api/health
pub async fn api_health(State(state): State<AppState>) -> Json<ApiHealth> {
    Json(ApiHealth {
        success: true,
        message: "API is running",
        storage: state.config().storage.describe(),
    })
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the document store is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.db().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/delete-account", post(auth::delete_account))
}

/// Create the contact routes router.
pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(contacts::list).post(contacts::create))
        .route("/{id}", put(contacts::update).delete(contacts::delete))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list).post(orders::create))
        .route(
            "/{id}",
            get(orders::show).put(orders::update).delete(orders::cancel),
        )
}

/// Create the support routes router.
pub fn support_routes() -> Router<AppState> {
    Router::new()
        .route("/send-email", post(contact::send_email))
        .route("/check-email-config", get(contact::check_email_config))
}

/// Create all routes for the gateway.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/api/health", get(api_health))
        .nest("/api/auth", auth_routes())
        .nest("/api/contacts", contact_routes())
        .nest("/api/orders", order_routes())
        .route("/api/chat/message", post(chat::message))
        .nest("/api/contact", support_routes())
}
