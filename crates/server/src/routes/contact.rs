//! Contact form route handlers.
//!
//! Handles support email submissions and the outbound email config check.

use axum::{Json, extract::State};
use tracing::instrument;

use pizza_time_core::ApiResponse;

use crate::error::Result;
use crate::services::email::{EmailConfigStatus, SupportMessage};
use crate::state::AppState;

/// Submit a support message.
///
/// POST /api/contact/send-email
#[instrument(skip(state, form), fields(email = %form.email))]
pub async fn send_email(
    State(state): State<AppState>,
    Json(form): Json<SupportMessage>,
) -> Result<Json<ApiResponse<()>>> {
    state.mailer().send(&form).await?;
    Ok(Json(ApiResponse::message("Email sent successfully!")))
}

/// Report whether outbound email credentials are configured.
///
/// GET /api/contact/check-email-config
pub async fn check_email_config(State(state): State<AppState>) -> Json<EmailConfigStatus> {
    Json(state.mailer().config_status())
}
