//! Read-only view of catalog products.
//!
//! The catalog itself (CRUD, pricing, imagery) is owned elsewhere; this core
//! only reads the fields checkout validation needs, and only ever mutates
//! the stock counter through the conditional decrement in the order store.

use mercadito_core::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a product, as read during checkout validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Product ID.
    pub id: ProductId,
    /// Display name, copied onto order items at checkout.
    pub name: String,
    /// Stock-keeping unit, copied onto order items at checkout.
    pub sku: String,
    /// Canonical catalog price. Client-supplied prices must match exactly.
    pub price: Decimal,
    /// Units currently in stock.
    pub stock: i32,
    /// Whether the product is purchasable.
    pub active: bool,
}
