//! Building orders at checkout and delivering them to the server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BasketStore, ClientError, LocalOrderCache, OrderApiClient};
use crate::models::{BasketLineItem, DeliveryOption, IncomingLineItem, IncomingOrder, Order};

/// Customer details captured by the checkout form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    pub name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub delivery_date: Option<String>,
}

/// What is being bought.
#[derive(Debug, Clone)]
pub enum OrderSelection {
    /// Everything in the basket
    Basket(Vec<BasketLineItem>),
    /// A single item bought straight from the product page
    BuyNow(BasketLineItem),
}

/// Build a complete order from the form and the selection.
///
/// Nothing is stored; an invalid form or an empty basket is a
/// [`ClientError::Validation`].
pub fn build_order(
    form: &CheckoutForm,
    selection: &OrderSelection,
    delivery_option: DeliveryOption,
    now: DateTime<Utc>,
) -> Result<Order, ClientError> {
    if matches!(selection, OrderSelection::Basket(items) if items.is_empty()) {
        return Err(ClientError::Validation("Your basket is empty".to_string()));
    }

    let products: Vec<IncomingLineItem> = match selection {
        OrderSelection::Basket(items) => items.iter().map(IncomingLineItem::from).collect(),
        OrderSelection::BuyNow(item) => vec![IncomingLineItem::from(item)],
    };

    let incoming = IncomingOrder {
        name: Some(form.name.clone()),
        contact: Some(form.contact.clone()),
        email: Some(form.email.clone()),
        phone: Some(form.phone.clone()),
        address: Some(form.address.clone()),
        postcode: Some(form.postcode.clone()),
        delivery_date: form.delivery_date.clone(),
        products: Some(products),
        delivery_option: Some(delivery_option),
        ..Default::default()
    };

    Ok(incoming.into_order(now)?)
}

/// An order placed at checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: Order,
    /// Whether the server confirmed the order during checkout
    pub delivered: bool,
}

/// Stores orders locally, then tries to deliver them.
#[derive(Debug, Clone)]
pub struct OrderSubmitter {
    api: OrderApiClient,
    cache: Arc<LocalOrderCache>,
}

impl OrderSubmitter {
    pub fn new(api: OrderApiClient, cache: Arc<LocalOrderCache>) -> Self {
        Self { api, cache }
    }

    /// Cache `order` as pending and attempt delivery.
    ///
    /// Returns whether the server confirmed it. A failed delivery leaves the
    /// order pending with one more recorded attempt; only a local storage
    /// failure is an error.
    pub async fn submit(&self, order: &Order) -> Result<bool, ClientError> {
        self.cache.put_pending(order).await?;
        tracing::info!("Order {} saved locally", order.id);

        match self.api.submit_order(order).await {
            Ok(stored) => {
                let synced_at = stored.sync.synced_at.unwrap_or_else(Utc::now);
                self.cache
                    .mark_synced(std::slice::from_ref(&order.id), synced_at)
                    .await?;
                tracing::info!("Order {} delivered to {}", order.id, self.api.base_url());
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Order {} not delivered, will retry: {}", order.id, e);
                self.cache
                    .record_failed_attempt(std::slice::from_ref(&order.id), Utc::now())
                    .await?;
                Ok(false)
            }
        }
    }

    /// Place an order for the basket contents and empty the basket.
    pub async fn checkout_basket(
        &self,
        form: &CheckoutForm,
        basket: &BasketStore,
    ) -> Result<CheckoutReceipt, ClientError> {
        let items = basket.items().await?;
        let delivery_option = basket.delivery_option().await?;
        let order = build_order(
            form,
            &OrderSelection::Basket(items),
            delivery_option,
            Utc::now(),
        )?;

        let delivered = self.submit(&order).await?;
        basket.clear().await?;

        Ok(CheckoutReceipt { order, delivered })
    }
}
