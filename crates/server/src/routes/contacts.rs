//! Emergency contact route handlers.
//!
//! All handlers are scoped to the authenticated caller. A contact owned by
//! someone else is reported as not found.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use pizza_time_core::{ApiResponse, Contact, ContactId, ContactPatch, NewContact};

use crate::db::{ContactRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

fn not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("Contact not found".to_string()),
        other => other.into(),
    }
}

/// GET /api/contacts
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Json<ApiResponse<Vec<Contact>>> {
    let contacts = ContactRepository::new(state.db())
        .list_for_owner(&user.id)
        .await;
    Json(ApiResponse::ok(contacts))
}

/// POST /api/contacts
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<NewContact>,
) -> Result<Json<ApiResponse<Contact>>> {
    if !body.is_complete() {
        return Err(AppError::BadRequest(
            "Name and phone are required".to_string(),
        ));
    }

    let contact = ContactRepository::new(state.db())
        .create(&user.id, body)
        .await?;
    tracing::info!(contact_id = %contact.id, "contact created");
    Ok(Json(ApiResponse::ok_with_message(contact, "Contact created")))
}

/// PUT /api/contacts/{id}
#[instrument(skip(state, user, patch), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ContactId>,
    Json(patch): Json<ContactPatch>,
) -> Result<Json<ApiResponse<Contact>>> {
    let contact = ContactRepository::new(state.db())
        .update_for_owner(&user.id, &id, patch)
        .await
        .map_err(not_found)?;
    Ok(Json(ApiResponse::ok_with_message(contact, "Contact updated")))
}

/// DELETE /api/contacts/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ContactId>,
) -> Result<Json<ApiResponse<()>>> {
    ContactRepository::new(state.db())
        .delete_for_owner(&user.id, &id)
        .await
        .map_err(not_found)?;
    Ok(Json(ApiResponse::message("Contact deleted")))
}
