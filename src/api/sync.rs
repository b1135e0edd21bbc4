//! Sync API endpoints used by the storefront reconciler.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use super::{error, success, ApiResult};
use crate::auth::AdminGuard;
use crate::models::{
    needs_refresh, CheckOrdersQuery, CheckOrdersResponse, SyncInfo, SyncOrdersRequest,
    SyncOrdersResponse,
};
use crate::AppState;

/// POST /api/sync-orders - Upsert a batch of pending orders.
///
/// Admin callers get the full list back; storefront callers only get the
/// stored versions of what they sent.
pub async fn sync_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SyncOrdersRequest>,
) -> ApiResult<SyncOrdersResponse> {
    let batch_size = request.orders.len();
    let stored = match state.store.upsert_batch(request.orders).await {
        Ok(stored) => stored,
        Err(e) => return error(e, state.store.last_sync().await),
    };
    tracing::info!("Synced {} order(s) from storefront", batch_size);

    let guard = AdminGuard {
        api_psk: state.config.api_psk.clone(),
        sessions: state.sessions.clone(),
    };
    let response = if guard.is_authenticated(&headers).await {
        SyncOrdersResponse {
            orders: state.store.list().await,
            complete: true,
        }
    } else {
        SyncOrdersResponse {
            orders: stored,
            complete: false,
        }
    };

    success(response, state.store.last_sync().await)
}

/// GET /api/sync - Current change marker of the store.
pub async fn get_sync_info(State(state): State<AppState>) -> ApiResult<SyncInfo> {
    let info = state.store.sync_info().await;
    let last_sync = info.last_sync;
    success(info, last_sync)
}

/// GET /api/check-orders - Tell a client whether its copy is stale.
pub async fn check_orders(
    State(state): State<AppState>,
    Query(query): Query<CheckOrdersQuery>,
) -> ApiResult<CheckOrdersResponse> {
    let info = state.store.sync_info().await;
    let should_sync = needs_refresh(query.count, query.last_sync, info.order_count, info.last_sync);

    success(
        CheckOrdersResponse {
            should_sync,
            last_sync: info.last_sync,
            order_count: info.order_count,
        },
        info.last_sync,
    )
}
