//! Reconciling the local order cache with the order server.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::{ClientError, LocalOrderCache, OrderApiClient};
use crate::models::{needs_refresh, Order};

/// Merge the server's orders with the cached ones, one entry per id.
///
/// An id known to both sides takes the local copy only while it is still
/// pending; otherwise the server copy wins. Orders known to one side only are
/// kept as they are. Merging the result again changes nothing.
pub fn merge_orders(server: &[Order], local: &[Order]) -> Vec<Order> {
    let mut merged: Vec<Order> = Vec::with_capacity(server.len() + local.len());
    for order in server {
        match merged.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => *existing = order.clone(),
            None => merged.push(order.clone()),
        }
    }

    for order in local {
        match merged.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => {
                if order.sync.pending_sync {
                    *existing = order.clone();
                }
            }
            None => merged.push(order.clone()),
        }
    }
    merged
}

/// Sort orders for display, newest first.
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Result of one exchange with the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Orders sent in the batch
    pub sent: usize,
    /// Whether the server accepted the batch
    pub delivered: bool,
    /// Whether the cache was rebuilt from the server's full list
    pub refreshed: bool,
}

/// Health summary of the local cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDiagnosis {
    pub total: usize,
    pub pending: usize,
    /// Ids of cached orders missing a required field
    pub invalid: Vec<String>,
}

/// Pushes pending orders and pulls server changes into the cache.
#[derive(Debug, Clone)]
pub struct SyncReconciler {
    api: OrderApiClient,
    cache: Arc<LocalOrderCache>,
}

impl SyncReconciler {
    pub fn new(api: OrderApiClient, cache: Arc<LocalOrderCache>) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &Arc<LocalOrderCache> {
        &self.cache
    }

    /// Send every pending order to the server in one batch.
    pub async fn sync_pending(&self) -> Result<SyncReport, ClientError> {
        let pending = self.cache.pending().await?;
        if pending.is_empty() {
            tracing::debug!("No pending orders to sync");
            return Ok(SyncReport {
                delivered: true,
                ..Default::default()
            });
        }
        self.exchange(pending).await
    }

    /// Refresh the cache when the server reports changes since the last refresh.
    ///
    /// Returns whether a refresh happened.
    pub async fn check_for_updates(&self) -> Result<bool, ClientError> {
        let info = match self.api.sync_info().await {
            Ok(info) => info,
            Err(e) if e.is_remote() => {
                tracing::warn!("Could not check for order updates: {}", e);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let local_count = self.cache.get_all().await?.len();
        let local_last_sync = self.cache.last_sync().await?;
        if !needs_refresh(local_count, local_last_sync, info.order_count, info.last_sync) {
            tracing::debug!("Order cache is up to date ({} orders)", local_count);
            return Ok(false);
        }

        tracing::info!(
            "Order cache is stale ({} local, {} on server), refreshing",
            local_count,
            info.order_count
        );
        let pending = self.cache.pending().await?;
        let report = self.exchange(pending).await?;
        if report.delivered {
            self.cache.set_last_sync(info.last_sync).await?;
        }
        Ok(report.delivered)
    }

    /// Mark every cached order pending and send them all.
    pub async fn force_sync(&self) -> Result<SyncReport, ClientError> {
        let all = self
            .cache
            .modify(|orders| {
                for order in orders.iter_mut() {
                    order.sync.mark_pending();
                }
                orders.clone()
            })
            .await?;
        tracing::info!("Forcing sync of {} cached order(s)", all.len());
        self.exchange(all).await
    }

    /// Delete an order on the server, then drop it from the cache.
    pub async fn delete_order(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete_order(id).await?;
        self.cache.remove(id).await?;
        tracing::info!("Order {} deleted", id);
        Ok(())
    }

    /// Server orders merged with the cache, newest first.
    ///
    /// Falls back to the cache alone when the server cannot be reached.
    pub async fn all_orders(&self) -> Result<Vec<Order>, ClientError> {
        let cached = self.cache.get_all().await?;
        let mut orders = match self.api.list_orders().await {
            Ok(server) => merge_orders(&server, &cached),
            Err(e) if e.is_remote() => {
                tracing::warn!("Showing cached orders only: {}", e);
                cached
            }
            Err(e) => return Err(e),
        };
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    pub async fn diagnose(&self) -> Result<CacheDiagnosis, ClientError> {
        let orders = self.cache.get_all().await?;
        Ok(CacheDiagnosis {
            total: orders.len(),
            pending: orders.iter().filter(|o| o.sync.pending_sync).count(),
            invalid: orders
                .iter()
                .filter(|o| !o.missing_required_fields().is_empty())
                .map(|o| o.id.clone())
                .collect(),
        })
    }

    /// Push `batch` and fold the server's answer into the cache.
    async fn exchange(&self, batch: Vec<Order>) -> Result<SyncReport, ClientError> {
        let sent: Vec<String> = batch.iter().map(|o| o.id.clone()).collect();

        let response = match self.api.sync_orders(&batch).await {
            Ok(response) => response,
            Err(e) if e.is_remote() => {
                tracing::warn!("Sync of {} order(s) failed, will retry: {}", sent.len(), e);
                self.cache.record_failed_attempt(&sent, Utc::now()).await?;
                return Ok(SyncReport {
                    sent: sent.len(),
                    delivered: false,
                    refreshed: false,
                });
            }
            Err(e) => return Err(e),
        };

        let sent_ids: HashSet<&str> = sent.iter().map(String::as_str).collect();
        let refreshed = response.complete;
        self.cache
            .modify(|cached| {
                if response.complete {
                    // Keep orders placed while the batch was in flight
                    let in_flight: Vec<Order> = cached
                        .iter()
                        .filter(|o| o.sync.pending_sync && !sent_ids.contains(o.id.as_str()))
                        .cloned()
                        .collect();
                    *cached = merge_orders(&response.orders, &in_flight);
                } else {
                    let now = Utc::now();
                    for order in cached.iter_mut() {
                        if sent_ids.contains(order.id.as_str()) {
                            order.sync.mark_synced(now);
                        }
                    }
                    *cached = merge_orders(&response.orders, cached);
                }
            })
            .await?;

        tracing::info!(
            "Synced {} order(s), server returned {}",
            sent.len(),
            response.orders.len()
        );
        Ok(SyncReport {
            sent: sent.len(),
            delivered: true,
            refreshed,
        })
    }
}
