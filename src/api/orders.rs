//! Order API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateOrderResponse, IncomingOrder, Order};
use crate::AppState;

/// GET /api/orders - List all orders.
pub async fn list_orders(State(state): State<AppState>) -> ApiResult<Vec<Order>> {
    let orders = state.store.list().await;
    success(orders, state.store.last_sync().await)
}

/// GET /api/orders/:id - Get a single order.
pub async fn get_order(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Order> {
    let last_sync = state.store.last_sync().await;

    match state.store.get(&id).await {
        Some(order) => success(order, last_sync),
        None => error(AppError::NotFound(format!("Order {} not found", id)), last_sync),
    }
}

/// POST /api/orders - Create an order, replacing any stored order with the same id.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<IncomingOrder>,
) -> ApiResult<CreateOrderResponse> {
    match state.store.create(request).await {
        Ok(order) => {
            tracing::info!("Order {} received from storefront", order.id);
            let last_sync = state.store.last_sync().await;
            let response = CreateOrderResponse {
                order_id: order.id.clone(),
                order,
            };
            success(response, last_sync).map(|r| r.created())
        }
        Err(e) => error(e, state.store.last_sync().await),
    }
}

/// PATCH /api/orders/:id - Merge a partial object into an order.
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> ApiResult<Order> {
    if !patch.is_object() {
        return error(
            AppError::BadRequest("Update body must be a JSON object".to_string()),
            state.store.last_sync().await,
        );
    }

    match state.store.update(&id, &patch).await {
        Ok(order) => success(order, state.store.last_sync().await),
        Err(e) => error(e, state.store.last_sync().await),
    }
}

/// DELETE /api/orders/:id - Delete an order.
pub async fn delete_order(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    match state.store.delete(&id).await {
        Ok(()) => success((), state.store.last_sync().await),
        Err(e) => error(e, state.store.last_sync().await),
    }
}
