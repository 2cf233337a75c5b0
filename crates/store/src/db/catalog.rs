//! Read-only catalog snapshot queries.

use async_trait::async_trait;
use mercadito_core::ProductId;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::ProductSnapshot;
use crate::services::checkout::CatalogReader;

/// Internal row type for product snapshot queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    sku: String,
    price: Decimal,
    stock: i32,
    active: bool,
}

impl From<ProductRow> for ProductSnapshot {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            sku: row.sku,
            price: row.price,
            stock: row.stock,
            active: row.active,
        }
    }
}

/// Catalog reader backed by the `products` table.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogReader for PgCatalog {
    async fn product_snapshot(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductSnapshot>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, sku, price, stock, active
            FROM products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ProductSnapshot::from))
    }
}
