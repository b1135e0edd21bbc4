//! Persistent basket of the storefront.

use tokio::sync::{watch, Mutex};

use super::ClientError;
use crate::catalog::resolve_product_image;
use crate::db::{LocalStorage, BASKET_KEY, DELIVERY_OPTION_KEY};
use crate::models::{AddOutcome, BasketLineItem, DeliveryOption};

/// Basket line items, one per product configuration, persisted after every change.
///
/// The total item count (sum of quantities) is published on a watch channel
/// whenever the basket changes.
#[derive(Debug)]
pub struct BasketStore {
    storage: LocalStorage,
    lock: Mutex<()>,
    count: watch::Sender<u32>,
}

impl BasketStore {
    /// Open the basket, upgrading any items saved by older storefront revisions.
    pub async fn open(storage: LocalStorage) -> Result<Self, ClientError> {
        let (count, _) = watch::channel(0);
        let basket = Self {
            storage,
            lock: Mutex::new(()),
            count,
        };
        basket.migrate_legacy_items().await?;
        Ok(basket)
    }

    /// Watch the basket item count.
    pub fn subscribe_count(&self) -> watch::Receiver<u32> {
        self.count.subscribe()
    }

    pub fn count(&self) -> u32 {
        *self.count.borrow()
    }

    pub async fn items(&self) -> Result<Vec<BasketLineItem>, ClientError> {
        self.load().await
    }

    pub async fn subtotal(&self) -> Result<f64, ClientError> {
        Ok(self.load().await?.iter().map(BasketLineItem::line_total).sum())
    }

    /// Add one unit of a configuration.
    pub async fn add_item(&self, item: BasketLineItem) -> Result<AddOutcome, ClientError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        let config_id = item.derive_config_id();

        let outcome = match items.iter_mut().find(|i| i.config_id == config_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(1);
                AddOutcome::QuantityUpdated
            }
            None => {
                let mut item = item;
                item.config_id = config_id;
                item.quantity = 1;
                if item.image.is_empty() {
                    item.image = resolve_product_image(&item.name, &item.color);
                }
                items.push(item);
                AddOutcome::Added
            }
        };

        self.save(&items).await?;
        tracing::debug!("Basket add: {:?}", outcome);
        Ok(outcome)
    }

    /// Adjust a line's quantity by `delta`, removing it when the result is not positive.
    ///
    /// Returns the new quantity, or `None` when the line is gone.
    pub async fn change_quantity(
        &self,
        config_id: &str,
        delta: i64,
    ) -> Result<Option<u32>, ClientError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;

        let Some(index) = items.iter().position(|i| i.config_id == config_id) else {
            return Ok(None);
        };
        let quantity = i64::from(items[index].quantity).saturating_add(delta);
        let result = if quantity > 0 {
            let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
            items[index].quantity = quantity;
            Some(quantity)
        } else {
            items.remove(index);
            None
        };

        self.save(&items).await?;
        Ok(result)
    }

    /// Remove a line. Returns whether it existed.
    pub async fn remove_item(&self, config_id: &str) -> Result<bool, ClientError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        let before = items.len();
        items.retain(|i| i.config_id != config_id);
        let removed = items.len() != before;

        self.save(&items).await?;
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<(), ClientError> {
        let _guard = self.lock.lock().await;
        self.storage.remove(BASKET_KEY).await?;
        self.count.send_replace(0);
        Ok(())
    }

    /// Give every stored item a `configId` and fold lines that share one.
    ///
    /// Running it again on a migrated basket changes nothing.
    pub async fn migrate_legacy_items(&self) -> Result<usize, ClientError> {
        let _guard = self.lock.lock().await;
        let stored = self.load().await?;

        let mut migrated = 0;
        let mut items: Vec<BasketLineItem> = Vec::with_capacity(stored.len());
        for mut item in stored {
            if item.config_id.is_empty() {
                item.config_id = item.derive_config_id();
                migrated += 1;
            }
            match items.iter_mut().find(|i| i.config_id == item.config_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                    migrated += 1;
                }
                None => items.push(item),
            }
        }

        if migrated > 0 {
            tracing::info!("Migrated {} legacy basket item(s)", migrated);
        }
        self.save(&items).await?;
        Ok(migrated)
    }

    /// Delivery option remembered between visits.
    pub async fn delivery_option(&self) -> Result<DeliveryOption, ClientError> {
        Ok(self
            .storage
            .get::<DeliveryOption>(DELIVERY_OPTION_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_delivery_option(&self, option: DeliveryOption) -> Result<(), ClientError> {
        self.storage.put(DELIVERY_OPTION_KEY, &option).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Vec<BasketLineItem>, ClientError> {
        Ok(self
            .storage
            .get::<Vec<BasketLineItem>>(BASKET_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, items: &[BasketLineItem]) -> Result<(), ClientError> {
        self.storage.put(BASKET_KEY, items).await?;
        let count = items
            .iter()
            .fold(0u32, |total, i| total.saturating_add(i.quantity));
        self.count.send_replace(count);
        Ok(())
    }
}
