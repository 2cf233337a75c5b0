//! In-memory fakes for the checkout, ledger, and mail seams.
//!
//! `MemoryStore` keeps the all-or-nothing reservation contract of the real
//! store: every decrement for an order happens under one lock, and a failed
//! line undoes nothing because the writes are staged first.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use mercadito_core::{
    Email, NotificationAttemptId, NotificationStatus, OrderId, OrderItemId, OrderStatus, ProductId,
};
use mercadito_store::db::RepositoryError;
use mercadito_store::models::{
    ContactInfo, NewNotificationAttempt, NewOrder, NotificationAttempt, Order, OrderItem,
    ProductSnapshot, SendOutcome, ShippingAddress,
};
use mercadito_store::services::checkout::{CatalogReader, OrderStore, ReservationError};
use mercadito_store::services::email::{EmailError, MailTransport, OutgoingEmail};
use mercadito_store::services::notifications::NotificationLedger;
use rust_decimal::Decimal;

// =============================================================================
// Store
// =============================================================================

#[derive(Default)]
struct StoreInner {
    products: HashMap<ProductId, ProductSnapshot>,
    orders: HashMap<OrderId, Order>,
    next_order_id: i32,
    next_item_id: i32,
}

/// In-memory catalog + order store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&self, snapshot: ProductSnapshot) {
        let mut inner = self.inner.lock().expect("store lock");
        inner.products.insert(snapshot.id, snapshot);
    }

    /// Current stock of a product.
    pub fn stock_of(&self, id: ProductId) -> i32 {
        let inner = self.inner.lock().expect("store lock");
        inner.products.get(&id).map_or(0, |p| p.stock)
    }

    /// Overwrite a product's price, simulating a later catalog edit.
    pub fn set_price(&self, id: ProductId, price: Decimal) {
        let mut inner = self.inner.lock().expect("store lock");
        if let Some(product) = inner.products.get_mut(&id) {
            product.price = price;
        }
    }

    /// Remove an order, simulating administrative deletion.
    pub fn delete_order(&self, id: OrderId) {
        let mut inner = self.inner.lock().expect("store lock");
        inner.orders.remove(&id);
    }

    pub fn order_count(&self) -> usize {
        let inner = self.inner.lock().expect("store lock");
        inner.orders.len()
    }
}

#[async_trait]
impl CatalogReader for MemoryStore {
    async fn product_snapshot(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductSnapshot>, RepositoryError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.products.get(&id).cloned())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_with_reservation(&self, new: NewOrder) -> Result<Order, ReservationError> {
        let mut inner = self.inner.lock().expect("store lock");

        // Stage all decrements before committing any of them.
        let mut staged: HashMap<ProductId, i32> = HashMap::new();
        for line in &new.lines {
            let available = match inner.products.get(&line.product_id) {
                Some(p) if p.active => staged.get(&line.product_id).copied().unwrap_or(p.stock),
                _ => {
                    return Err(ReservationError::OutOfStock {
                        product_id: line.product_id,
                    });
                }
            };
            if available < line.quantity {
                return Err(ReservationError::OutOfStock {
                    product_id: line.product_id,
                });
            }
            staged.insert(line.product_id, available - line.quantity);
        }
        for (product_id, stock) in staged {
            if let Some(p) = inner.products.get_mut(&product_id) {
                p.stock = stock;
            }
        }

        inner.next_order_id += 1;
        let order_id = OrderId::new(inner.next_order_id);
        let now = Utc::now();

        let items = new
            .lines
            .iter()
            .map(|line| {
                inner.next_item_id += 1;
                OrderItem {
                    id: OrderItemId::new(inner.next_item_id),
                    product_id: Some(line.product_id),
                    product_name: line.product_name.clone(),
                    sku: line.sku.clone(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                }
            })
            .collect();

        let order = Order {
            id: order_id,
            order_number: new.order_number,
            status: OrderStatus::Pending,
            subtotal: new.subtotal,
            tax: new.tax,
            shipping: new.shipping,
            total: new.total,
            customer_email: new.contact.email.clone(),
            user_id: new.user_id,
            items,
            contact: new.contact,
            shipping_address: new.shipping_address,
            created_at: now,
            updated_at: now,
        };

        inner.orders.insert(order_id, order.clone());
        Ok(order)
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.orders.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut inner = self.inner.lock().expect("store lock");
        let Some(order) = inner.orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.status != from {
            return Ok(None);
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Default)]
struct LedgerInner {
    attempts: HashMap<NotificationAttemptId, NotificationAttempt>,
    next_id: i32,
}

/// In-memory notification ledger.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<LedgerInner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows, ordered by id.
    pub fn rows(&self) -> Vec<NotificationAttempt> {
        let inner = self.inner.lock().expect("ledger lock");
        let mut rows: Vec<_> = inner.attempts.values().cloned().collect();
        rows.sort_by_key(|a| a.id.as_i32());
        rows
    }
}

fn apply_outcome(attempt: &mut NotificationAttempt, outcome: &SendOutcome) {
    attempt.status = outcome.status();
    attempt.error = outcome.error().map(String::from);
    attempt.updated_at = Utc::now();
}

#[async_trait]
impl NotificationLedger for MemoryLedger {
    async fn record(
        &self,
        new: NewNotificationAttempt,
    ) -> Result<NotificationAttempt, RepositoryError> {
        let mut inner = self.inner.lock().expect("ledger lock");
        inner.next_id += 1;
        let now = Utc::now();
        let mut attempt = NotificationAttempt {
            id: NotificationAttemptId::new(inner.next_id),
            kind: new.kind,
            recipient: new.recipient,
            order_id: new.order_id,
            order_number: new.order_number,
            status: NotificationStatus::Sent,
            attempts: 1,
            error: None,
            created_at: now,
            updated_at: now,
        };
        apply_outcome(&mut attempt, &new.outcome);
        inner.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn find(
        &self,
        id: NotificationAttemptId,
    ) -> Result<Option<NotificationAttempt>, RepositoryError> {
        let inner = self.inner.lock().expect("ledger lock");
        Ok(inner.attempts.get(&id).cloned())
    }

    async fn list_failed(&self) -> Result<Vec<NotificationAttempt>, RepositoryError> {
        let inner = self.inner.lock().expect("ledger lock");
        let mut rows: Vec<_> = inner
            .attempts
            .values()
            .filter(|a| a.status.is_retryable())
            .cloned()
            .collect();
        rows.sort_by_key(|a| std::cmp::Reverse(a.id.as_i32()));
        Ok(rows)
    }

    async fn mark_retry_pending(&self, id: NotificationAttemptId) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().expect("ledger lock");
        let attempt = inner.attempts.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if !attempt.status.is_retryable() {
            return Err(RepositoryError::NotFound);
        }
        attempt.status = NotificationStatus::RetryPending;
        attempt.updated_at = Utc::now();
        Ok(())
    }

    async fn record_retry(
        &self,
        id: NotificationAttemptId,
        outcome: SendOutcome,
    ) -> Result<NotificationAttempt, RepositoryError> {
        let mut inner = self.inner.lock().expect("ledger lock");
        let attempt = inner.attempts.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        attempt.attempts += 1;
        apply_outcome(attempt, &outcome);
        Ok(attempt.clone())
    }
}

// =============================================================================
// Mailer
// =============================================================================

/// Fake mail transport with a switchable failure mode.
#[derive(Default)]
pub struct FakeMailer {
    failing: AtomicBool,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.failing.store(true, Ordering::SeqCst);
        mailer
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Copies of every message the transport accepted.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl MailTransport for FakeMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmailError::InvalidAddress(
                "smtp transport unavailable".to_string(),
            ));
        }
        self.sent.lock().expect("mailer lock").push(email);
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn product(id: i32, price: Decimal, stock: i32) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        sku: format!("SKU-{id}"),
        price,
        stock,
        active: true,
    }
}

pub fn contact() -> ContactInfo {
    ContactInfo {
        name: "Ana Diaz".to_string(),
        email: Email::parse("ana@example.com").expect("valid email"),
        phone: "58134753".to_string(),
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        street: "Calle 23 #456".to_string(),
        city: "La Habana".to_string(),
        state: "La Habana".to_string(),
        zip: "10400".to_string(),
        country: "Cuba".to_string(),
    }
}
