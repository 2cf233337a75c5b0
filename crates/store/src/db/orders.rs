//! Order aggregate persistence and stock reservation.
//!
//! Stock is reserved with a conditional decrement inside the same
//! transaction that inserts the order graph. There is deliberately no
//! read-then-write path here: the `WHERE stock >= quantity` predicate on the
//! UPDATE is the whole concurrency story, and the `rows_affected` check is
//! how a lost race is detected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercadito_core::{Email, OrderId, OrderItemId, OrderStatus, ProductId, UserId};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use super::RepositoryError;
use crate::models::{ContactInfo, NewOrder, Order, OrderItem, ShippingAddress};
use crate::services::checkout::{OrderStore, ReservationError};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for order header queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    status: OrderStatus,
    subtotal: Decimal,
    tax: Decimal,
    shipping: Decimal,
    total: Decimal,
    customer_email: Email,
    user_id: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Internal row type for order item queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    product_id: Option<ProductId>,
    product_name: String,
    sku: String,
    unit_price: Decimal,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            sku: row.sku,
            unit_price: row.unit_price,
            quantity: row.quantity,
        }
    }
}

/// Internal row type for contact info queries.
#[derive(Debug, sqlx::FromRow)]
struct ContactInfoRow {
    name: String,
    email: Email,
    phone: String,
}

impl From<ContactInfoRow> for ContactInfo {
    fn from(row: ContactInfoRow) -> Self {
        Self {
            name: row.name,
            email: row.email,
            phone: row.phone,
        }
    }
}

/// Internal row type for shipping address queries.
#[derive(Debug, sqlx::FromRow)]
struct ShippingAddressRow {
    street: String,
    city: String,
    state: String,
    zip: String,
    country: String,
}

impl From<ShippingAddressRow> for ShippingAddress {
    fn from(row: ShippingAddressRow) -> Self {
        Self {
            street: row.street,
            city: row.city,
            state: row.state,
            zip: row.zip,
            country: row.country,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Order store backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Conditionally decrement stock for one line inside the transaction.
    ///
    /// Returns `false` when the update matched no row, i.e. the product is
    /// gone, inactive, or no longer has enough stock.
    async fn reserve_line(
        tx: &mut Transaction<'_, Postgres>,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET stock = stock - $2, updated_at = now()
            WHERE id = $1 AND active AND stock >= $2
            ",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Load the full aggregate for a committed order header row.
    async fn load_aggregate(&self, header: OrderRow) -> Result<Order, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, product_id, product_name, sku, unit_price, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(header.id)
        .fetch_all(&self.pool)
        .await?;

        let contact = sqlx::query_as::<_, ContactInfoRow>(
            r"
            SELECT name, email, phone
            FROM contact_info
            WHERE order_id = $1
            ",
        )
        .bind(header.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!("order {} has no contact info", header.id))
        })?;

        let address = sqlx::query_as::<_, ShippingAddressRow>(
            r"
            SELECT street, city, state, zip, country
            FROM shipping_addresses
            WHERE order_id = $1
            ",
        )
        .bind(header.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!("order {} has no shipping address", header.id))
        })?;

        Ok(Order {
            id: header.id,
            order_number: header.order_number,
            status: header.status,
            subtotal: header.subtotal,
            tax: header.tax,
            shipping: header.shipping,
            total: header.total,
            customer_email: header.customer_email,
            user_id: header.user_id,
            items: items.into_iter().map(OrderItem::from).collect(),
            contact: contact.into(),
            shipping_address: address.into(),
            created_at: header.created_at,
            updated_at: header.updated_at,
        })
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_with_reservation(&self, new: NewOrder) -> Result<Order, ReservationError> {
        let mut tx = self.pool.begin().await?;

        // Reserve every line first. A single failed conditional update
        // aborts the whole transaction, undoing earlier decrements.
        for line in &new.lines {
            if !Self::reserve_line(&mut tx, line.product_id, line.quantity).await? {
                tx.rollback().await?;
                return Err(ReservationError::OutOfStock {
                    product_id: line.product_id,
                });
            }
        }

        let header = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO orders (
                order_number, status, subtotal, tax, shipping, total,
                customer_email, user_id
            )
            VALUES ($1, 'pending', $2, $3, $4, $5, $6, $7)
            RETURNING
                id, order_number, status, subtotal, tax, shipping, total,
                customer_email, user_id, created_at, updated_at
            ",
        )
        .bind(&new.order_number)
        .bind(new.subtotal)
        .bind(new.tax)
        .bind(new.shipping)
        .bind(new.total)
        .bind(&new.contact.email)
        .bind(new.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(new.lines.len());
        for line in &new.lines {
            let item = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO order_items (
                    order_id, product_id, product_name, sku, unit_price, quantity
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, product_id, product_name, sku, unit_price, quantity
                ",
            )
            .bind(header.id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(&line.sku)
            .bind(line.unit_price)
            .bind(line.quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(OrderItem::from(item));
        }

        sqlx::query(
            r"
            INSERT INTO contact_info (order_id, name, email, phone)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(header.id)
        .bind(&new.contact.name)
        .bind(&new.contact.email)
        .bind(&new.contact.phone)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO shipping_addresses (order_id, street, city, state, zip, country)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(header.id)
        .bind(&new.shipping_address.street)
        .bind(&new.shipping_address.city)
        .bind(&new.shipping_address.state)
        .bind(&new.shipping_address.zip)
        .bind(&new.shipping_address.country)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %header.id,
            order_number = %header.order_number,
            total = %header.total,
            "Order committed with stock reservations"
        );

        Ok(Order {
            id: header.id,
            order_number: header.order_number,
            status: header.status,
            subtotal: header.subtotal,
            tax: header.tax,
            shipping: header.shipping,
            total: header.total,
            customer_email: header.customer_email,
            user_id: header.user_id,
            items,
            contact: new.contact,
            shipping_address: new.shipping_address,
            created_at: header.created_at,
            updated_at: header.updated_at,
        })
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let header = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT
                id, order_number, status, subtotal, tax, shipping, total,
                customer_email, user_id, created_at, updated_at
            FROM orders
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match header {
            Some(header) => Ok(Some(self.load_aggregate(header).await?)),
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        // The status predicate makes the write a compare-and-set: a
        // concurrent update that already moved the order away from `from`
        // leaves zero rows matched instead of clobbering its result.
        let header = sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE orders
            SET status = $2, updated_at = now()
            WHERE id = $1 AND status = $3
            RETURNING
                id, order_number, status, subtotal, tax, shipping, total,
                customer_email, user_id, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(to)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;

        match header {
            Some(header) => Ok(Some(self.load_aggregate(header).await?)),
            None => Ok(None),
        }
    }
}
