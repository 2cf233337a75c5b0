//! Checkout validation and order placement.
//!
//! The flow is: cross-check the client payload against a catalog snapshot
//! (read-only), then hand the catalog-confirmed lines to the order store,
//! which reserves stock and persists the aggregate as one atomic unit.
//! Validation failures and lost stock races are both client-class errors;
//! neither leaves any state behind.

use std::sync::Arc;

use async_trait::async_trait;
use mercadito_core::{OrderId, OrderStatus, ProductId, UserId};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::{ContactInfo, NewOrder, Order, ProductSnapshot, ShippingAddress, ValidatedLine};

/// Read-only access to current product price/stock/status.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Load the current snapshot of a product, or `None` if it does not exist.
    async fn product_snapshot(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductSnapshot>, RepositoryError>;
}

/// Persistence seam for the order aggregate.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Reserve stock for every line and persist the order aggregate in one
    /// atomic unit. Either everything commits or nothing does.
    async fn create_with_reservation(&self, new: NewOrder) -> Result<Order, ReservationError>;

    /// Load a committed order aggregate.
    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Durably move the order from `from` to `to` and return the updated
    /// aggregate. The write is conditional on the status still being `from`;
    /// `None` means no row matched, because the order is gone or another
    /// update changed its status since it was read.
    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError>;
}

#[async_trait]
impl<T: CatalogReader + ?Sized> CatalogReader for Arc<T> {
    async fn product_snapshot(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductSnapshot>, RepositoryError> {
        (**self).product_snapshot(id).await
    }
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn create_with_reservation(&self, new: NewOrder) -> Result<Order, ReservationError> {
        (**self).create_with_reservation(new).await
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        (**self).find(id).await
    }

    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        (**self).update_status(id, from, to).await
    }
}

/// Why a checkout line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// The product does not exist or is inactive.
    NotAvailable,
    /// Requested quantity exceeds current stock (or the stock race was lost).
    InsufficientStock,
    /// Client-supplied price disagrees with the canonical catalog price.
    PriceMismatch {
        catalog_price: Decimal,
        supplied_price: Decimal,
    },
    /// Quantity must be at least 1.
    InvalidQuantity,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAvailable => write!(f, "product is not available"),
            Self::InsufficientStock => write!(f, "insufficient stock"),
            Self::PriceMismatch {
                catalog_price,
                supplied_price,
            } => write!(
                f,
                "price mismatch: catalog price is {catalog_price}, got {supplied_price}"
            ),
            Self::InvalidQuantity => write!(f, "quantity must be at least 1"),
        }
    }
}

/// The offending line and reason for a rejected checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineRejection {
    /// Zero-based index of the offending line in the request.
    pub line: usize,
    /// Product the line referenced.
    pub product_id: ProductId,
    /// Why the line was rejected.
    pub reason: RejectReason,
}

impl std::fmt::Display for LineRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {} (product {}): {}",
            self.line, self.product_id, self.reason
        )
    }
}

/// Errors from the stock reservation + persistence unit.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// The conditional decrement affected no rows: stock ran out between
    /// validation and commit. The whole transaction was rolled back.
    #[error("insufficient stock for product {product_id}")]
    OutOfStock { product_id: ProductId },

    /// Unexpected storage failure; the transaction guarantees no partial
    /// order graph survives it.
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl From<sqlx::Error> for ReservationError {
    fn from(e: sqlx::Error) -> Self {
        Self::Storage(RepositoryError::Database(e))
    }
}

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Client-class rejection: validation failure or lost stock race.
    #[error("checkout rejected: {0}")]
    Rejected(LineRejection),

    /// The request contained no lines.
    #[error("checkout requires at least one line item")]
    EmptyOrder,

    /// Server-class storage failure.
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// One line of a checkout payload as supplied by the client.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    /// Referenced product.
    pub product_id: ProductId,
    /// Units requested.
    pub quantity: i32,
    /// Client-supplied unit price, checked exactly against the catalog.
    pub price: Decimal,
}

/// A full checkout request after DTO-level parsing.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Requested lines.
    pub lines: Vec<CheckoutLine>,
    /// Customer contact info.
    pub contact: ContactInfo,
    /// Shipping address.
    pub shipping_address: ShippingAddress,
    /// Owning user, if authenticated upstream.
    pub user_id: Option<UserId>,
}

/// Checkout pricing knobs frozen from configuration.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Tax rate applied to the subtotal.
    pub tax_rate: Decimal,
    /// Flat shipping fee per order.
    pub shipping_fee: Decimal,
}

/// Validate one checkout line against its catalog snapshot.
///
/// Read-only; reports the specific offending line and reason. The returned
/// line carries the catalog snapshot fields, not the client payload's.
pub fn validate_line(
    index: usize,
    line: &CheckoutLine,
    snapshot: Option<&ProductSnapshot>,
) -> Result<ValidatedLine, LineRejection> {
    let reject = |reason| LineRejection {
        line: index,
        product_id: line.product_id,
        reason,
    };

    if line.quantity < 1 {
        return Err(reject(RejectReason::InvalidQuantity));
    }

    let Some(snapshot) = snapshot else {
        return Err(reject(RejectReason::NotAvailable));
    };

    if !snapshot.active {
        return Err(reject(RejectReason::NotAvailable));
    }

    if line.quantity > snapshot.stock {
        return Err(reject(RejectReason::InsufficientStock));
    }

    // Zero tolerance: stale or tampered client carts are rejected outright.
    if line.price != snapshot.price {
        return Err(reject(RejectReason::PriceMismatch {
            catalog_price: snapshot.price,
            supplied_price: line.price,
        }));
    }

    Ok(ValidatedLine {
        product_id: snapshot.id,
        product_name: snapshot.name.clone(),
        sku: snapshot.sku.clone(),
        unit_price: snapshot.price,
        quantity: line.quantity,
    })
}

/// Place an order: validate, reserve stock, and persist atomically.
///
/// Totals are computed once here from the catalog-confirmed lines and frozen
/// on the order row. A stock race lost inside the store surfaces with the
/// same classification as a validation-time stock failure.
///
/// # Errors
///
/// [`CheckoutError::Rejected`] identifies the failing line; no side effects
/// remain in any error case.
pub async fn place_order<C: CatalogReader, S: OrderStore>(
    catalog: &C,
    store: &S,
    settings: &CheckoutSettings,
    request: CheckoutRequest,
) -> Result<Order, CheckoutError> {
    if request.lines.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }

    let mut lines = Vec::with_capacity(request.lines.len());
    for (index, line) in request.lines.iter().enumerate() {
        let snapshot = catalog.product_snapshot(line.product_id).await?;
        let validated =
            validate_line(index, line, snapshot.as_ref()).map_err(CheckoutError::Rejected)?;
        lines.push(validated);
    }

    let subtotal: Decimal = lines.iter().map(ValidatedLine::line_total).sum();
    let tax = (subtotal * settings.tax_rate).round_dp(2);
    let shipping = settings.shipping_fee;
    let total = subtotal + tax + shipping;

    let new = NewOrder {
        order_number: generate_order_number(),
        contact: request.contact,
        shipping_address: request.shipping_address,
        user_id: request.user_id,
        subtotal,
        tax,
        shipping,
        total,
        lines,
    };

    match store.create_with_reservation(new).await {
        Ok(order) => Ok(order),
        Err(ReservationError::OutOfStock { product_id }) => {
            let line = request
                .lines
                .iter()
                .position(|l| l.product_id == product_id)
                .unwrap_or(0);
            Err(CheckoutError::Rejected(LineRejection {
                line,
                product_id,
                reason: RejectReason::InsufficientStock,
            }))
        }
        Err(ReservationError::Storage(e)) => Err(CheckoutError::Storage(e)),
    }
}

/// Errors from an order status update.
#[derive(Debug, Error)]
pub enum StatusUpdateError {
    /// No such order.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The state machine does not admit this transition.
    #[error("cannot transition order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Another update changed the order between the read and the write.
    #[error("order {0} was updated concurrently")]
    Conflict(OrderId),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// Result of a status update request.
#[derive(Debug)]
pub struct StatusUpdate {
    /// The (possibly unchanged) order.
    pub order: Order,
    /// False when the requested status equalled the current one; the caller
    /// must not send any notification in that case.
    pub changed: bool,
}

/// Apply an administrative status change to an order.
///
/// Requesting the current status is an idempotent no-op: the order is
/// returned unchanged and no notification side effect may follow. An actual
/// transition is validated against the state machine and persisted before
/// any notification is attempted. The write itself re-checks the status it
/// validated against, so two racing updates cannot compose an illegal net
/// transition; the loser sees a conflict.
pub async fn update_order_status<S: OrderStore>(
    store: &S,
    id: OrderId,
    target: OrderStatus,
) -> Result<StatusUpdate, StatusUpdateError> {
    let order = store
        .find(id)
        .await?
        .ok_or(StatusUpdateError::NotFound(id))?;

    if order.status == target {
        return Ok(StatusUpdate {
            order,
            changed: false,
        });
    }

    if !order.status.can_transition_to(target) {
        return Err(StatusUpdateError::InvalidTransition {
            from: order.status,
            to: target,
        });
    }

    let order = store
        .update_status(id, order.status, target)
        .await?
        .ok_or(StatusUpdateError::Conflict(id))?;
    Ok(StatusUpdate {
        order,
        changed: true,
    })
}

/// Characters used in order display codes. Ambiguous glyphs are excluded.
const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generate a human-facing order number like `MR-7K2P9XQA`.
#[must_use]
pub fn generate_order_number() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let code: String = (0..8)
        .map(|_| {
            let idx = rng.random_range(0..ORDER_NUMBER_CHARSET.len());
            ORDER_NUMBER_CHARSET[idx] as char
        })
        .collect();
    format!("MR-{code}")
}
