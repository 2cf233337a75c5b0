//! Order aggregate domain models.
//!
//! An order owns its items, contact info and shipping address; they are
//! created together in one transaction and cascade-deleted with it. Item
//! fields are snapshots taken at order time: later edits or deletion of the
//! referenced product never change what the customer bought.

use chrono::{DateTime, Utc};
use mercadito_core::{Email, OrderId, OrderItemId, OrderStatus, ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A committed order aggregate.
///
/// Invariants: `total == subtotal + tax + shipping` and
/// `subtotal == Σ(item.unit_price × item.quantity)`, both computed once at
/// creation and never recomputed from live catalog prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Human-facing display code (e.g., `MR-7K2P9XQA`), distinct from the ID.
    pub order_number: String,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Sum of item price × quantity at creation time.
    pub subtotal: Decimal,
    /// Tax charged on the subtotal.
    pub tax: Decimal,
    /// Flat shipping fee.
    pub shipping: Decimal,
    /// Grand total: subtotal + tax + shipping.
    pub total: Decimal,
    /// Customer email the confirmation was addressed to.
    pub customer_email: Email,
    /// Owning user, when the checkout was authenticated.
    pub user_id: Option<UserId>,
    /// Snapshot line items.
    pub items: Vec<OrderItem>,
    /// Contact info captured at checkout.
    pub contact: ContactInfo,
    /// Shipping address captured at checkout.
    pub shipping_address: ShippingAddress,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A line item belonging to exactly one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Unique item ID.
    pub id: OrderItemId,
    /// Referenced product, if it still exists.
    pub product_id: Option<ProductId>,
    /// Product name snapshot taken at order time.
    pub product_name: String,
    /// SKU snapshot taken at order time.
    pub sku: String,
    /// Unit price snapshot; authoritative for this order forever.
    pub unit_price: Decimal,
    /// Units ordered.
    pub quantity: i32,
}

/// Customer contact info, one-to-one with an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Customer name.
    pub name: String,
    /// Customer email.
    pub email: Email,
    /// Customer phone number.
    pub phone: String,
}

/// Shipping address, one-to-one with an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

/// A checkout line confirmed against the catalog by the validator.
///
/// Carries the snapshot fields that become the order item, priced from the
/// catalog rather than the client payload.
#[derive(Debug, Clone)]
pub struct ValidatedLine {
    /// Product to reserve stock from.
    pub product_id: ProductId,
    /// Product name at validation time.
    pub product_name: String,
    /// SKU at validation time.
    pub sku: String,
    /// Catalog unit price at validation time.
    pub unit_price: Decimal,
    /// Units requested.
    pub quantity: i32,
}

impl ValidatedLine {
    /// Line subtotal: unit price × quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Everything needed to persist an order aggregate with its reservations.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Pre-generated display code.
    pub order_number: String,
    /// Catalog-confirmed lines (stock is re-checked conditionally on write).
    pub lines: Vec<ValidatedLine>,
    /// Contact info to attach.
    pub contact: ContactInfo,
    /// Shipping address to attach.
    pub shipping_address: ShippingAddress,
    /// Owning user, if authenticated.
    pub user_id: Option<UserId>,
    /// Subtotal frozen at validation time.
    pub subtotal: Decimal,
    /// Tax frozen at validation time.
    pub tax: Decimal,
    /// Shipping fee frozen at validation time.
    pub shipping: Decimal,
    /// Grand total frozen at validation time.
    pub total: Decimal,
}
