//! The authoritative order store.
//!
//! Owns the order list. Every mutation runs under one async mutex, writes the
//! resulting list durably, and only then replaces the in-memory copy, so a
//! failed write leaves both memory and disk unchanged.

mod events;
mod persistence;

pub use events::*;
pub use persistence::*;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};

use crate::errors::AppError;
use crate::models::{IncomingOrder, Order, SyncInfo};

struct StoreState {
    orders: Vec<Order>,
    last_sync: DateTime<Utc>,
}

/// Server-side order list with durable persistence and change events.
pub struct OrderStore {
    state: Mutex<StoreState>,
    persistence: OrderPersistence,
    events: EventBus,
}

impl std::fmt::Debug for OrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStore")
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}

impl OrderStore {
    /// Load the stored orders and open the store.
    pub async fn open(persistence: OrderPersistence) -> Result<Self, AppError> {
        let orders = persistence.load().await?;
        tracing::info!(
            "Order store opened with {} orders ({})",
            orders.len(),
            persistence.describe()
        );

        Ok(Self {
            state: Mutex::new(StoreState {
                orders,
                last_sync: Utc::now(),
            }),
            persistence,
            events: EventBus::default(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events.subscribe()
    }

    /// Time of the last successful mutation (or of startup).
    pub async fn last_sync(&self) -> DateTime<Utc> {
        self.state.lock().await.last_sync
    }

    pub async fn sync_info(&self) -> SyncInfo {
        let state = self.state.lock().await;
        SyncInfo {
            last_sync: state.last_sync,
            order_count: state.orders.len(),
        }
    }

    pub async fn list(&self) -> Vec<Order> {
        self.state.lock().await.orders.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Order> {
        let state = self.state.lock().await;
        state.orders.iter().find(|o| o.id == id).cloned()
    }

    /// Validate, normalize and upsert one order.
    pub async fn create(&self, incoming: IncomingOrder) -> Result<Order, AppError> {
        let mut stored = self.upsert_batch(vec![incoming]).await?;
        stored
            .pop()
            .ok_or_else(|| AppError::Internal("Upsert returned no order".to_string()))
    }

    /// Validate every order, then upsert them all with a single durable write.
    ///
    /// An order whose id is already stored replaces it in place. Nothing is
    /// written when any order fails validation.
    pub async fn upsert_batch(&self, incoming: Vec<IncomingOrder>) -> Result<Vec<Order>, AppError> {
        let now = Utc::now();
        let mut accepted = Vec::with_capacity(incoming.len());
        for (index, raw) in incoming.into_iter().enumerate() {
            let label = raw.id.clone().unwrap_or_else(|| format!("#{}", index));
            let mut order = raw.into_order(now).map_err(|e| {
                tracing::info!("Rejected order {}: {}", label, e);
                AppError::Validation(e.to_string())
            })?;
            order.sync.mark_synced(now);
            accepted.push(order);
        }
        if accepted.is_empty() {
            return Ok(accepted);
        }

        let mut state = self.state.lock().await;
        let mut next = state.orders.clone();
        let mut events = Vec::with_capacity(accepted.len());
        for order in &accepted {
            match next.iter_mut().find(|o| o.id == order.id) {
                Some(existing) => {
                    tracing::debug!("Order {} already exists, replacing it", order.id);
                    *existing = order.clone();
                    events.push(OrderEvent::OrderUpdated(order.clone()));
                }
                None => {
                    tracing::debug!("Order {} is new, adding it", order.id);
                    next.push(order.clone());
                    events.push(OrderEvent::NewOrder(order.clone()));
                }
            }
        }

        self.commit(&mut state, next, now).await?;
        drop(state);

        tracing::info!("Stored {} order(s)", accepted.len());
        for event in events {
            self.events.emit(event);
        }
        Ok(accepted)
    }

    /// Remove an order by id.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let next: Vec<Order> = state.orders.iter().filter(|o| o.id != id).cloned().collect();
        if next.len() == state.orders.len() {
            return Err(AppError::NotFound(format!("Order {} not found", id)));
        }

        self.commit(&mut state, next, now).await?;
        drop(state);

        tracing::info!("Order {} deleted", id);
        self.events.emit(OrderEvent::OrderDeleted { id: id.to_string() });
        Ok(())
    }

    /// Shallow-merge `patch` into an existing order.
    pub async fn update(&self, id: &str, patch: &serde_json::Value) -> Result<Order, AppError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let index = state
            .orders
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))?;
        let updated = state.orders[index]
            .with_patch(patch, now)
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let mut next = state.orders.clone();
        next[index] = updated.clone();
        self.commit(&mut state, next, now).await?;
        drop(state);

        tracing::info!("Order {} updated", id);
        self.events.emit(OrderEvent::OrderUpdated(updated.clone()));
        Ok(updated)
    }

    /// Persist `next`, then make it the live list.
    async fn commit(
        &self,
        state: &mut StoreState,
        next: Vec<Order>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Err(e) = self.persistence.save(&next).await {
            tracing::error!("Failed to persist orders, change discarded: {}", e);
            return Err(match e {
                AppError::Persistence(_) => e,
                other => AppError::Persistence(other.message()),
            });
        }
        state.orders = next;
        state.last_sync = now;
        Ok(())
    }
}
