//! Database operations for the store `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `products` - Catalog rows; this core reads them and mutates only the
//!   stock counter, through the conditional decrement in [`orders`]
//! - `orders`, `order_items`, `contact_info`, `shipping_addresses` - The
//!   order aggregate, committed as one transaction
//! - `notification_attempts` - Durable send-attempt ledger (no foreign key
//!   to orders; it must survive order deletion)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/store/migrations/` and run via:
//! ```bash
//! cargo run -p mercadito-cli -- migrate
//! ```

pub mod catalog;
pub mod notifications;
pub mod orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use catalog::PgCatalog;
pub use notifications::PgNotificationLedger;
pub use orders::PgOrderStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
