//! Client-side staging area for orders.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use super::ClientError;
use crate::db::{LocalStorage, LAST_ORDER_SYNC_KEY, ORDERS_KEY};
use crate::models::Order;

/// Observable delivery state of the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Orders still waiting to reach the server
    pub pending: usize,
    /// Orders confirmed by the server
    pub synced: usize,
    /// Failed delivery attempts summed over pending orders
    pub attempts: u32,
}

/// Orders known to this client, keyed by id.
///
/// Every read-modify-write runs under one lock so overlapping submissions
/// and syncs never lose or duplicate an entry.
#[derive(Debug)]
pub struct LocalOrderCache {
    storage: LocalStorage,
    lock: Mutex<()>,
}

impl LocalOrderCache {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    pub async fn get_all(&self) -> Result<Vec<Order>, ClientError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Order>, ClientError> {
        Ok(self.get_all().await?.into_iter().find(|o| o.id == id))
    }

    /// Orders that have not reached the server yet.
    pub async fn pending(&self) -> Result<Vec<Order>, ClientError> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|o| o.sync.pending_sync)
            .collect())
    }

    /// Run `f` over the cached list and persist the result.
    pub async fn modify<R>(&self, f: impl FnOnce(&mut Vec<Order>) -> R) -> Result<R, ClientError> {
        let _guard = self.lock.lock().await;
        let mut orders = self.load().await?;
        let result = f(&mut orders);
        self.storage.put(ORDERS_KEY, &orders).await?;
        Ok(result)
    }

    /// Store `order` as pending, replacing any entry with the same id.
    ///
    /// The attempt history of a replaced entry is kept.
    pub async fn put_pending(&self, order: &Order) -> Result<(), ClientError> {
        let mut order = order.clone();
        order.sync.mark_pending();
        self.modify(move |orders| {
            if let Some(existing) = orders.iter().find(|o| o.id == order.id) {
                order.sync.sync_attempts = existing.sync.sync_attempts;
                order.sync.last_sync_attempt = existing.sync.last_sync_attempt;
            }
            upsert(orders, order)
        })
        .await
    }

    /// Store `order` as given, replacing any entry with the same id.
    pub async fn put(&self, order: &Order) -> Result<(), ClientError> {
        let order = order.clone();
        self.modify(|orders| upsert(orders, order)).await
    }

    /// Mark the listed orders as confirmed by the server.
    pub async fn mark_synced(&self, ids: &[String], at: DateTime<Utc>) -> Result<(), ClientError> {
        self.modify(|orders| {
            for order in orders.iter_mut().filter(|o| ids.contains(&o.id)) {
                order.sync.mark_synced(at);
            }
        })
        .await
    }

    /// Count a failed delivery against each listed order.
    pub async fn record_failed_attempt(
        &self,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), ClientError> {
        self.modify(|orders| {
            for order in orders.iter_mut().filter(|o| ids.contains(&o.id)) {
                order.sync.record_failed_attempt(at);
            }
        })
        .await
    }

    pub async fn replace(&self, orders: Vec<Order>) -> Result<(), ClientError> {
        self.modify(move |cached| *cached = orders).await
    }

    /// Drop an order. Returns whether it was cached.
    pub async fn remove(&self, id: &str) -> Result<bool, ClientError> {
        self.modify(|orders| {
            let before = orders.len();
            orders.retain(|o| o.id != id);
            orders.len() != before
        })
        .await
    }

    /// Server `lastSync` remembered from the last refresh.
    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>, ClientError> {
        Ok(self.storage.get(LAST_ORDER_SYNC_KEY).await?)
    }

    pub async fn set_last_sync(&self, at: DateTime<Utc>) -> Result<(), ClientError> {
        self.storage.put(LAST_ORDER_SYNC_KEY, &at).await?;
        Ok(())
    }

    pub async fn status(&self) -> Result<SyncStatus, ClientError> {
        let orders = self.get_all().await?;
        Ok(orders.iter().fold(SyncStatus::default(), |mut status, order| {
            if order.sync.pending_sync {
                status.pending += 1;
                status.attempts += order.sync.sync_attempts;
            } else if order.sync.synced {
                status.synced += 1;
            }
            status
        }))
    }

    async fn load(&self) -> Result<Vec<Order>, ClientError> {
        Ok(self
            .storage
            .get::<Vec<Order>>(ORDERS_KEY)
            .await?
            .unwrap_or_default())
    }
}

fn upsert(orders: &mut Vec<Order>, order: Order) {
    match orders.iter_mut().find(|o| o.id == order.id) {
        Some(existing) => *existing = order,
        None => orders.push(order),
    }
}
