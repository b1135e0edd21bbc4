//! Basket line items held by the storefront client.

use serde::{Deserialize, Serialize};

use super::IncomingLineItem;

/// One purchasable configuration in the basket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BasketLineItem {
    pub id: String,
    /// Empty for items persisted before configurations were tracked
    #[serde(default)]
    pub config_id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub image: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub side_facing: String,
    #[serde(default)]
    pub extra_seats: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Composite identity of a product configuration.
///
/// The side-facing segment is left out when empty, so a sofa with no side
/// choice reads `sofa1-grey-1`.
pub fn config_id(product_id: &str, color: &str, side_facing: &str, extra_seats: u32) -> String {
    if side_facing.is_empty() {
        format!("{}-{}-{}", product_id, color, extra_seats)
    } else {
        format!("{}-{}-{}-{}", product_id, color, side_facing, extra_seats)
    }
}

impl BasketLineItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        let mut item = Self {
            id: id.into(),
            config_id: String::new(),
            name: name.into(),
            price,
            image: String::new(),
            quantity: 1,
            color: String::new(),
            side_facing: String::new(),
            extra_seats: 0,
        };
        item.config_id = item.derive_config_id();
        item
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self.config_id = self.derive_config_id();
        self
    }

    pub fn with_side_facing(mut self, side_facing: impl Into<String>) -> Self {
        self.side_facing = side_facing.into();
        self.config_id = self.derive_config_id();
        self
    }

    pub fn with_extra_seats(mut self, extra_seats: u32) -> Self {
        self.extra_seats = extra_seats;
        self.config_id = self.derive_config_id();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn derive_config_id(&self) -> String {
        config_id(&self.id, &self.color, &self.side_facing, self.extra_seats)
    }

    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

impl From<&BasketLineItem> for IncomingLineItem {
    fn from(item: &BasketLineItem) -> Self {
        IncomingLineItem {
            id: Some(item.id.clone()),
            config_id: Some(item.config_id.clone()),
            name: Some(item.name.clone()),
            price: Some(item.price),
            quantity: Some(item.quantity),
            color: Some(item.color.clone()),
            side_facing: Some(item.side_facing.clone()),
            extra_seats: Some(item.extra_seats),
            image: Some(item.image.clone()),
            ..Default::default()
        }
    }
}

/// Outcome of adding an item to the basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was appended
    Added,
    /// An existing configuration's quantity was incremented
    QuantityUpdated,
}
