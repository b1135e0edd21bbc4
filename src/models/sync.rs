//! Payloads of the sync endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IncomingOrder, Order};

/// Store-wide change marker returned by `GET /api/sync`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncInfo {
    pub last_sync: DateTime<Utc>,
    pub order_count: usize,
}

/// Query parameters of `GET /api/check-orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOrdersQuery {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

/// Response of `GET /api/check-orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOrdersResponse {
    pub should_sync: bool,
    pub last_sync: DateTime<Utc>,
    pub order_count: usize,
}

/// Request body of `POST /api/sync-orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncOrdersRequest {
    #[serde(default)]
    pub orders: Vec<IncomingOrder>,
}

/// Response of `POST /api/sync-orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOrdersResponse {
    pub orders: Vec<Order>,
    /// True when `orders` is the store's full list
    pub complete: bool,
}

/// Response of `POST /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub order: Order,
}

/// Whether a client should pull a fresh order list.
///
/// Refresh when the counts disagree, when the server changed after the
/// client's last sync, or when the client has never synced.
pub fn needs_refresh(
    local_count: usize,
    local_last_sync: Option<DateTime<Utc>>,
    server_count: usize,
    server_last_sync: DateTime<Utc>,
) -> bool {
    match local_last_sync {
        None => true,
        Some(local) => local_count != server_count || server_last_sync > local,
    }
}
