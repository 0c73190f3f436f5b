//! Account route handlers.
//!
//! Register and login are public and answer with a signed bearer token.
//! The current-user lookup and account deletion require that token.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use pizza_time_core::{ApiResponse, AuthResponse, Credentials, PasswordConfirmation, PublicUser};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Token-bearing response with a human readable message.
#[derive(Debug, Serialize)]
pub struct SignedIn {
    #[serde(flatten)]
    pub auth: AuthResponse,
    pub message: &'static str,
}

/// Current user response.
#[derive(Debug, Serialize)]
pub struct Me {
    pub success: bool,
    pub user: PublicUser,
}

/// Register a new account.
///
/// POST /api/auth/register
#[instrument(skip(state, credentials), fields(username = %credentials.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SignedIn>> {
    let auth = AuthService::new(state.db(), state.tokens())
        .register(credentials)
        .await?;
    Ok(Json(SignedIn {
        auth,
        message: "Registration successful",
    }))
}

/// Log in with username and password.
///
/// POST /api/auth/login
#[instrument(skip(state, credentials), fields(username = %credentials.username))]
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SignedIn>> {
    let auth = AuthService::new(state.db(), state.tokens())
        .login(credentials)
        .await?;
    Ok(Json(SignedIn {
        auth,
        message: "Login successful",
    }))
}

/// The caller's account, without the password hash.
///
/// GET /api/auth/me
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn me(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Result<Json<Me>> {
    let user = AuthService::new(state.db(), state.tokens())
        .current_user(&user.id)
        .await?;
    Ok(Json(Me {
        success: true,
        user,
    }))
}

/// Delete the caller's account and everything it owns.
///
/// POST /api/auth/delete-account
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn delete_account(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<PasswordConfirmation>,
) -> Result<Json<ApiResponse<()>>> {
    AuthService::new(state.db(), state.tokens())
        .delete_account(&user.id, &body.password)
        .await?;
    Ok(Json(ApiResponse::message("Account deleted successfully")))
}
