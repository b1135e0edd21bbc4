//! Order model shared by the storefront client and the order server.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::resolve_product_image;

/// Delivery tier chosen at checkout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOption {
    #[default]
    Standard,
    Premium,
}

impl DeliveryOption {
    /// Fixed delivery charge for this tier.
    pub fn cost(&self) -> f64 {
        match self {
            DeliveryOption::Standard => 30.0,
            DeliveryOption::Premium => 50.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOption::Standard => "standard",
            DeliveryOption::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(DeliveryOption::Standard),
            "premium" => Some(DeliveryOption::Premium),
            _ => None,
        }
    }
}

/// A resolved product line inside an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub side_facing: String,
    #[serde(default)]
    pub extra_seats: u32,
    pub image: String,
}

impl OrderLineItem {
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Client-side delivery bookkeeping carried with every order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    #[serde(default)]
    pub pending_sync: bool,
    #[serde(default)]
    pub synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sync_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_attempt: Option<DateTime<Utc>>,
}

impl SyncMetadata {
    /// Mark as waiting to reach the order server.
    pub fn mark_pending(&mut self) {
        self.pending_sync = true;
        self.synced = false;
    }

    /// Mark as confirmed by the order server.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.pending_sync = false;
        self.synced = true;
        self.synced_at = Some(at);
    }

    /// Record a delivery attempt that did not reach the server.
    pub fn record_failed_attempt(&mut self, at: DateTime<Utc>) {
        self.mark_pending();
        self.sync_attempts += 1;
        self.last_sync_attempt = Some(at);
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub name: String,
    pub contact: String,
    pub address: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    pub products: Vec<OrderLineItem>,
    #[serde(default)]
    pub delivery_option: DeliveryOption,
    pub delivery_cost: f64,
    pub subtotal: f64,
    pub total: f64,
    pub timestamp: DateTime<Utc>,
    /// Admin-managed fulfilment status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub sync: SyncMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fields that may never be changed by a partial update.
const IMMUTABLE_FIELDS: [&str; 2] = ["id", "timestamp"];

impl Order {
    /// Names of required contact fields that are blank.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        required_field_gaps(&self.name, &self.contact, &self.address)
    }

    /// Recompute subtotal, delivery cost and total from the line items.
    pub fn recompute_totals(&mut self) {
        self.subtotal = self.products.iter().map(OrderLineItem::line_total).sum();
        self.delivery_cost = self.delivery_option.cost();
        self.total = self.subtotal + self.delivery_cost;
    }

    /// Shallow-merge a JSON object of fields into a copy of this order.
    ///
    /// `id` and `timestamp` are kept, totals are recomputed and `lastUpdated`
    /// is stamped with `now`.
    pub fn with_patch(
        &self,
        patch: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Order, ValidationError> {
        let fields = patch
            .as_object()
            .ok_or_else(|| ValidationError("Update body must be a JSON object".to_string()))?;

        let mut merged = serde_json::to_value(self)
            .map_err(|e| ValidationError(format!("Failed to encode order: {}", e)))?;
        if let Some(target) = merged.as_object_mut() {
            for (key, value) in fields {
                if !IMMUTABLE_FIELDS.contains(&key.as_str()) {
                    target.insert(key.clone(), value.clone());
                }
            }
        }

        let mut updated: Order = serde_json::from_value(merged)
            .map_err(|e| ValidationError(format!("Invalid order update: {}", e)))?;
        let missing = updated.missing_required_fields();
        if !missing.is_empty() {
            return Err(ValidationError::missing(&missing));
        }
        if updated.products.is_empty() {
            return Err(ValidationError(
                "Order must contain at least one product".to_string(),
            ));
        }
        updated.recompute_totals();
        updated.last_updated = Some(now);
        Ok(updated)
    }
}

/// An order failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl ValidationError {
    fn missing(fields: &[&str]) -> Self {
        ValidationError(format!("Missing required fields: {}", fields.join(", ")))
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ValidationError {}

fn required_field_gaps(name: &str, contact: &str, address: &str) -> Vec<&'static str> {
    [("name", name), ("contact", contact), ("address", address)]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
}

/// Generate a unique order id: `order-{millis}-{8 base36 chars}`.
pub fn generate_order_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect();
    format!("order-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// A product line as submitted by any storefront revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingLineItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub config_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub side_facing: Option<String>,
    #[serde(default)]
    pub extra_seats: Option<u32>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Older single-product orders sent `product` either as an object or as a name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyProduct {
    Details(IncomingLineItem),
    Name(String),
}

/// An order as received over the wire, before normalization.
///
/// Accepts the basket shape (`products`), the "buy now" shape
/// (`productDetails`), and the oldest `product` shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingOrder {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub delivery_date: Option<String>,
    #[serde(default)]
    pub products: Option<Vec<IncomingLineItem>>,
    #[serde(default)]
    pub product_details: Option<IncomingLineItem>,
    #[serde(default)]
    pub product: Option<LegacyProduct>,
    #[serde(default)]
    pub product_title: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub delivery_option: Option<DeliveryOption>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub sync: SyncMetadata,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl IncomingOrder {
    /// Normalize into an [`Order`], validating required fields.
    ///
    /// Assigns an id and timestamp when absent, resolves every line item's
    /// image and recomputes totals.
    pub fn into_order(self, now: DateTime<Utc>) -> Result<Order, ValidationError> {
        let order = self.normalize(now);

        let missing = order.missing_required_fields();
        if !missing.is_empty() {
            return Err(ValidationError::missing(&missing));
        }
        if order.products.is_empty() {
            return Err(ValidationError(
                "Order must contain at least one product".to_string(),
            ));
        }
        Ok(order)
    }

    /// Normalize a record the order server already holds.
    ///
    /// Nothing is rejected: stored orders with blank fields are kept as they
    /// are. Every stored order counts as delivered.
    pub fn into_stored_order(self, now: DateTime<Utc>) -> Order {
        let mut order = self.normalize(now);
        let synced_at = order.sync.synced_at.unwrap_or(now);
        order.sync.mark_synced(synced_at);
        order
    }

    fn normalize(self, now: DateTime<Utc>) -> Order {
        let name = self.name.clone().unwrap_or_default();
        let address = self.address.clone().unwrap_or_default();
        let contact = non_blank(self.contact.clone()).unwrap_or_else(|| {
            [self.email.clone(), self.phone.clone()]
                .into_iter()
                .filter_map(non_blank)
                .collect::<Vec<_>>()
                .join(" / ")
        });

        let delivery_option = self.delivery_option.unwrap_or_default();
        let products = self.normalized_products(delivery_option);

        let mut order = Order {
            id: non_blank(self.id).unwrap_or_else(generate_order_id),
            name: name.trim().to_string(),
            contact: contact.trim().to_string(),
            address: address.trim().to_string(),
            postcode: self.postcode.unwrap_or_default().trim().to_string(),
            delivery_date: non_blank(self.delivery_date),
            products,
            delivery_option,
            delivery_cost: 0.0,
            subtotal: 0.0,
            total: 0.0,
            timestamp: self.timestamp.unwrap_or(now),
            status: self.status,
            sync: self.sync,
            last_updated: self.last_updated,
        };
        order.recompute_totals();
        order
    }

    fn normalized_products(&self, delivery_option: DeliveryOption) -> Vec<OrderLineItem> {
        if let Some(products) = self.products.as_ref().filter(|p| !p.is_empty()) {
            return products.iter().map(|p| self.resolve_line(p)).collect();
        }
        if let Some(details) = &self.product_details {
            return vec![self.resolve_line(details)];
        }
        match &self.product {
            Some(LegacyProduct::Details(details)) => vec![self.resolve_line(details)],
            Some(LegacyProduct::Name(product_name)) => {
                // Oldest shape: the price is only recoverable from the order total
                let price = self
                    .price
                    .or_else(|| self.total.map(|t| t - delivery_option.cost()))
                    .unwrap_or(0.0);
                let item = IncomingLineItem {
                    name: Some(product_name.clone()),
                    price: Some(price),
                    ..Default::default()
                };
                vec![self.resolve_line(&item)]
            }
            None => Vec::new(),
        }
    }

    fn resolve_line(&self, item: &IncomingLineItem) -> OrderLineItem {
        let name = [
            &item.name,
            &item.title,
            &item.product,
            &self.product_title,
        ]
        .into_iter()
        .find_map(|candidate| non_blank(candidate.clone()))
        .unwrap_or_else(|| "Unknown Product".to_string());

        let color = non_blank(item.color.clone())
            .or_else(|| non_blank(self.color.clone()).map(|c| c.to_lowercase()))
            .unwrap_or_default();

        let image = non_blank(item.image.clone())
            .unwrap_or_else(|| resolve_product_image(&name, &color));

        OrderLineItem {
            id: item.id.clone().unwrap_or_default(),
            config_id: non_blank(item.config_id.clone()),
            price: item.price.unwrap_or(0.0),
            quantity: item.quantity.unwrap_or(1).max(1),
            side_facing: item.side_facing.clone().unwrap_or_default(),
            extra_seats: item.extra_seats.unwrap_or(0),
            name,
            color,
            image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2024-03-01T10:00:00Z".parse().unwrap()
    }

    fn basket_order() -> serde_json::Value {
        json!({
            "name": "Jane Smith",
            "contact": "07700 900123",
            "address": "1 High Street, Leeds",
            "postcode": "LS1 1AA",
            "products": [
                { "id": "verona-sofa", "name": "Verona Sofa", "price": 499.0, "quantity": 2, "color": "grey" },
                { "id": "ottoman", "name": "Ottoman", "price": 99.5, "quantity": 1, "image": "/images/custom.jpg" }
            ],
            "deliveryOption": "premium"
        })
    }

    #[test]
    fn test_basket_order_normalization() {
        let incoming: IncomingOrder = serde_json::from_value(basket_order()).unwrap();
        let order = incoming.into_order(now()).unwrap();

        assert!(order.id.starts_with("order-"));
        assert_eq!(order.timestamp, now());
        assert_eq!(order.products.len(), 2);
        assert_eq!(order.subtotal, 499.0 * 2.0 + 99.5);
        assert_eq!(order.delivery_cost, 50.0);
        assert_eq!(order.total, order.subtotal + 50.0);
        assert_eq!(order.products[0].image, "/images/Verona Sofa/v3+2/vgrey3.jpg");
        assert_eq!(order.products[1].image, "/images/custom.jpg");
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        let mut body = basket_order();
        body["contact"] = json!("");
        body["name"] = json!("   ");
        let incoming: IncomingOrder = serde_json::from_value(body).unwrap();
        let err = incoming.into_order(now()).unwrap_err();
        assert_eq!(err.0, "Missing required fields: name, contact");
    }

    #[test]
    fn test_contact_derived_from_email_and_phone() {
        let mut body = basket_order();
        body.as_object_mut().unwrap().remove("contact");
        body["email"] = json!("jane@example.com");
        body["phone"] = json!("07700 900123");
        let incoming: IncomingOrder = serde_json::from_value(body).unwrap();
        let order = incoming.into_order(now()).unwrap();
        assert_eq!(order.contact, "jane@example.com / 07700 900123");
    }

    #[test]
    fn test_buy_now_shape() {
        let incoming: IncomingOrder = serde_json::from_value(json!({
            "id": "order-1700000000000",
            "name": "Sam",
            "contact": "sam@example.com",
            "address": "2 Low Road",
            "product": "Arm Chair",
            "productTitle": "Arm Chair",
            "productDetails": {
                "name": "Arm Chair",
                "title": "Arm Chair",
                "color": "Blue",
                "price": 249.0,
                "image": "",
                "quantity": 1,
                "sideFacing": "N/A",
                "extraSeats": 0
            },
            "deliveryOption": "standard",
            "deliveryCost": 30,
            "total": 279,
            "timestamp": "2024-02-01T09:00:00Z"
        }))
        .unwrap();
        let order = incoming.into_order(now()).unwrap();

        assert_eq!(order.id, "order-1700000000000");
        assert_eq!(order.products.len(), 1);
        assert_eq!(order.products[0].image, "/images/Arm Chair/v/vblue.jpg");
        assert_eq!(order.total, 279.0);
        assert_eq!(order.timestamp.to_rfc3339(), "2024-02-01T09:00:00+00:00");
    }

    #[test]
    fn test_legacy_product_name_shape() {
        let incoming: IncomingOrder = serde_json::from_value(json!({
            "name": "Old Client",
            "contact": "01234",
            "address": "Somewhere",
            "product": "Divan Bed",
            "color": "Brown",
            "total": 330
        }))
        .unwrap();
        let order = incoming.into_order(now()).unwrap();
        assert_eq!(order.products[0].name, "Divan Bed");
        assert_eq!(order.products[0].price, 300.0);
        assert_eq!(order.products[0].image, "/images/bed-brown.jpg");
    }

    #[test]
    fn test_order_without_products_rejected() {
        let mut body = basket_order();
        body["products"] = json!([]);
        let incoming: IncomingOrder = serde_json::from_value(body).unwrap();
        assert!(incoming.into_order(now()).is_err());
    }

    #[test]
    fn test_stored_order_kept_despite_gaps_and_marked_synced() {
        let incoming: IncomingOrder = serde_json::from_value(json!({
            "id": "old-order",
            "name": "",
            "contact": "01632 960000",
            "products": [],
            "pendingSync": true,
            "syncAttempts": 3
        }))
        .unwrap();

        let order = incoming.into_stored_order(now());
        assert_eq!(order.id, "old-order");
        assert_eq!(order.missing_required_fields(), vec!["name", "address"]);
        assert!(order.products.is_empty());
        assert!(order.sync.synced && !order.sync.pending_sync);
        assert_eq!(order.sync.synced_at, Some(now()));
        assert_eq!(order.sync.sync_attempts, 3);
    }

    #[test]
    fn test_patch_keeps_identity_and_stamps_update() {
        let incoming: IncomingOrder = serde_json::from_value(basket_order()).unwrap();
        let order = incoming.into_order(now()).unwrap();
        let later: DateTime<Utc> = "2024-03-02T08:00:00Z".parse().unwrap();

        let patched = order
            .with_patch(
                &json!({ "status": "dispatched", "id": "hijack", "timestamp": "2000-01-01T00:00:00Z" }),
                later,
            )
            .unwrap();
        assert_eq!(patched.id, order.id);
        assert_eq!(patched.timestamp, order.timestamp);
        assert_eq!(patched.status.as_deref(), Some("dispatched"));
        assert_eq!(patched.last_updated, Some(later));

        assert!(order.with_patch(&json!({ "address": "" }), later).is_err());
        assert!(order.with_patch(&json!(["not", "an", "object"]), later).is_err());
    }

    #[test]
    fn test_sync_metadata_transitions() {
        let mut meta = SyncMetadata::default();
        meta.mark_pending();
        meta.record_failed_attempt(now());
        meta.record_failed_attempt(now());
        assert!(meta.pending_sync && !meta.synced);
        assert_eq!(meta.sync_attempts, 2);

        meta.mark_synced(now());
        assert!(meta.synced && !meta.pending_sync);
        assert_eq!(meta.synced_at, Some(now()));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_order_id();
        let b = generate_order_id();
        assert_ne!(a, b);
        assert_eq!(a.rsplit('-').next().unwrap().len(), 8);
    }
}
