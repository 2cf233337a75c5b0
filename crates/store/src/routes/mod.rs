//! HTTP route handlers for the store API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness check
//! GET  /ready                               - Readiness check (database)
//!
//! # Orders
//! POST /api/orders                          - Checkout: validate, reserve, persist
//! GET  /api/orders/{id}                     - Fetch an order aggregate
//! POST /api/orders/{id}/status             - Administrative status transition
//! GET  /api/orders/{id}/whatsapp-links     - Admin WhatsApp deep links
//!
//! # Notification administration
//! GET  /api/admin/notifications/failed        - Failed-attempt ledger rows
//! GET  /api/admin/notifications/failed/export - Same rows as CSV
//! POST /api/admin/notifications/{id}/retry    - Re-send one failed attempt
//! ```

pub mod notifications;
pub mod orders;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", post(orders::update_status))
        .route("/{id}/whatsapp-links", get(orders::whatsapp_links))
}

/// Create the notification administration routes router.
pub fn notification_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/failed", get(notifications::list_failed))
        .route("/failed/export", get(notifications::export_failed))
        .route("/{id}/retry", post(notifications::retry))
}

/// Create all routes for the store API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/orders", order_routes())
        .nest("/api/admin/notifications", notification_admin_routes())
}
