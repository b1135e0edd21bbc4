//! Server-sent event stream of order changes.

use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

/// GET /api/events - Stream `new-order`, `order-updated` and `order-deleted` events.
pub async fn order_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.store.subscribe();
    tracing::info!("Admin observer connected to order events");

    let events = stream! {
        loop {
            match rx.recv().await {
                Ok(event) => match event.payload() {
                    Ok(data) => yield Ok(Event::default().event(event.name()).data(data)),
                    Err(e) => tracing::warn!("Failed to encode {} event: {}", event.name(), e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Order event observer lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
