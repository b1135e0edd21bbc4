//! Order change notifications for admin observers.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::Order;

/// A change to the order store.
#[derive(Debug, Clone)]
pub enum OrderEvent {
    NewOrder(Order),
    OrderUpdated(Order),
    OrderDeleted { id: String },
}

#[derive(Serialize)]
struct DeletedPayload<'a> {
    id: &'a str,
}

impl OrderEvent {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            OrderEvent::NewOrder(_) => "new-order",
            OrderEvent::OrderUpdated(_) => "order-updated",
            OrderEvent::OrderDeleted { .. } => "order-deleted",
        }
    }

    /// JSON payload: the order, or `{id}` for deletions.
    pub fn payload(&self) -> Result<String, serde_json::Error> {
        match self {
            OrderEvent::NewOrder(order) | OrderEvent::OrderUpdated(order) => {
                serde_json::to_string(order)
            }
            OrderEvent::OrderDeleted { id } => serde_json::to_string(&DeletedPayload { id }),
        }
    }
}

/// Broadcast channel fanning order events out to subscribers.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event. Having no subscribers is not an error.
    pub fn emit(&self, event: OrderEvent) {
        tracing::debug!("Emitting {} event", event.name());
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
