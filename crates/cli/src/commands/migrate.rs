//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! mercadito-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STORE_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migration files live in `crates/store/migrations/`.

use super::CommandError;

/// Run store database migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    tracing::info!("Running store migrations...");
    sqlx::migrate!("../store/migrations").run(&pool).await?;

    tracing::info!("Store migrations complete!");
    Ok(())
}
