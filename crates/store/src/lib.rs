//! Mercadito storefront server library.
//!
//! The storefront's one engineering-dense slice lives here: checkout
//! validation, concurrency-safe stock reservation committed atomically with
//! the order aggregate, best-effort notification dispatch with a durable
//! attempt ledger, the order status state machine, and WhatsApp deep-link
//! construction for administrator alerts.
//!
//! # Modules
//!
//! - [`config`] - Environment-driven configuration
//! - [`db`] - `PostgreSQL` persistence (pool, orders, catalog, ledger)
//! - [`services`] - Checkout orchestration and notification services
//! - [`routes`] - Axum HTTP handlers
//! - [`error`] - Request-level error type and response mapping
//! - [`state`] - Shared application state
//! - [`whatsapp`] - Pure WhatsApp deep-link builder
//! - [`models`] - Domain models (order aggregate, notification attempts)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod whatsapp;
