//! Order route handlers.
//!
//! Orders are scoped to the authenticated caller and always read back
//! ETA-settled. Status changes follow the order lifecycle; `DELETE` cancels
//! rather than removing the record.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use pizza_time_core::{
    ApiResponse, EpochMillis, NewOrder, Order, OrderId, OrderPatch, OrderStatus, StatusError,
    UserId,
};

use crate::db::{OrderRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

fn not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("Order not found".to_string()),
        other => other.into(),
    }
}

async fn load(state: &AppState, owner: &UserId, id: &OrderId, now: EpochMillis) -> Result<Order> {
    OrderRepository::new(state.db())
        .get_for_owner(owner, id, now)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// GET /api/orders
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Json<ApiResponse<Vec<Order>>> {
    let orders = OrderRepository::new(state.db())
        .list_for_owner(&user.id, EpochMillis::now())
        .await;
    Json(ApiResponse::ok(orders))
}

/// POST /api/orders
#[instrument(skip(state, user, body), fields(user_id = %user.id, pizza_id = %body.pizza.pizza_id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<NewOrder>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = OrderRepository::new(state.db())
        .create(&user.id, body, EpochMillis::now())
        .await?;
    tracing::info!(order_id = %order.id, "order created");
    Ok(Json(ApiResponse::ok_with_message(order, "Order created")))
}

/// GET /api/orders/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = load(&state, &user.id, &id, EpochMillis::now()).await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// PUT /api/orders/{id}
#[instrument(skip(state, user, patch), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    Json(patch): Json<OrderPatch>,
) -> Result<Json<ApiResponse<Order>>> {
    let now = EpochMillis::now();
    let saved = change(&state, &user.id, &id, now, |order| patch.apply(order, now)).await?;
    tracing::info!(order_id = %saved.id, status = %saved.status, "order updated");
    Ok(Json(ApiResponse::ok_with_message(saved, "Order updated")))
}

/// DELETE /api/orders/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<Order>>> {
    let now = EpochMillis::now();
    let saved = change(&state, &user.id, &id, now, |order| {
        order.transition(OrderStatus::Cancelled, now)
    })
    .await?;
    tracing::info!(order_id = %saved.id, "order cancelled");
    Ok(Json(ApiResponse::ok_with_message(saved, "Order cancelled")))
}

/// Apply `edit` to the stored order and save it only if nobody changed its
/// status in between. Returns the settled result.
async fn change(
    state: &AppState,
    owner: &UserId,
    id: &OrderId,
    now: EpochMillis,
    edit: impl FnOnce(&mut Order) -> std::result::Result<(), StatusError>,
) -> Result<Order> {
    let orders = OrderRepository::new(state.db());
    let mut order = orders
        .get_stored_for_owner(owner, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let expected = order.status;
    edit(&mut order)?;

    let saved = orders
        .save_for_owner(owner, &order, expected)
        .await
        .map_err(not_found)?;
    Ok(saved.settled(now))
}
