//! Order route handlers: checkout, lookup, status transitions, and the
//! WhatsApp deep links for a committed order.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use mercadito_core::{Email, OrderId, OrderStatus, ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::{PgCatalog, PgNotificationLedger, PgOrderStore};
use crate::error::AppError;
use crate::models::{ContactInfo, Order, ShippingAddress};
use crate::services::checkout::{
    self, CheckoutLine, CheckoutRequest, CheckoutSettings, OrderStore as _,
};
use crate::services::notifications::{
    NotificationDispatcher, NotificationOutcome, StatusChangeNotifier,
};
use crate::state::AppState;
use crate::whatsapp::{self, AdminLink};

/// One checkout line as submitted by the client.
#[derive(Debug, Deserialize)]
pub struct CheckoutItemPayload {
    pub product_id: ProductId,
    pub quantity: i32,
    /// Price the client saw; checked exactly against the catalog.
    pub price: Decimal,
}

/// Contact info as submitted by the client.
#[derive(Debug, Deserialize)]
pub struct ContactPayload {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Shipping address as submitted by the client.
#[derive(Debug, Deserialize)]
pub struct AddressPayload {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct CheckoutPayload {
    pub items: Vec<CheckoutItemPayload>,
    pub contact: ContactPayload,
    pub shipping_address: AddressPayload,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl CheckoutPayload {
    /// Parse the raw payload into a validated checkout request.
    fn into_request(self) -> Result<CheckoutRequest, AppError> {
        let email = Email::parse(&self.contact.email)
            .map_err(|e| AppError::BadRequest(format!("invalid contact email: {e}")))?;

        Ok(CheckoutRequest {
            lines: self
                .items
                .into_iter()
                .map(|item| CheckoutLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            contact: ContactInfo {
                name: self.contact.name,
                email,
                phone: self.contact.phone,
            },
            shipping_address: ShippingAddress {
                street: self.shipping_address.street,
                city: self.shipping_address.city,
                state: self.shipping_address.state,
                zip: self.shipping_address.zip,
                country: self.shipping_address.country,
            },
            user_id: self.user_id,
        })
    }
}

/// Checkout response: the committed order plus per-channel notification
/// outcomes. A failed confirmation email still yields 201; `sent: false`
/// in `notifications` is how the caller learns about it.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub notifications: Vec<NotificationOutcome>,
    pub whatsapp_links: Vec<AdminLink>,
}

/// Place an order (checkout).
#[instrument(skip(state, payload), fields(lines = payload.items.len()))]
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutPayload>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let request = payload.into_request()?;

    let catalog = PgCatalog::new(state.pool().clone());
    let store = PgOrderStore::new(state.pool().clone());
    let settings = CheckoutSettings {
        tax_rate: state.config().tax_rate,
        shipping_fee: state.config().shipping_fee,
    };

    let order = checkout::place_order(&catalog, &store, &settings, request).await?;

    // The order is committed at this point; nothing below can undo it.
    let dispatcher = NotificationDispatcher::new(
        PgNotificationLedger::new(state.pool().clone()),
        state.mailer(),
        state.config().store_name.clone(),
    );
    let outcome = dispatcher.send_order_confirmation(&order).await;
    let whatsapp_links = whatsapp::admin_links(&order, &state.config().whatsapp);

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order,
            notifications: vec![outcome],
            whatsapp_links,
        }),
    ))
}

/// Fetch a single order aggregate.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    let store = PgOrderStore::new(state.pool().clone());
    let order = store
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    Ok(Json(order))
}

/// Status update request body.
#[derive(Debug, Deserialize)]
pub struct StatusUpdatePayload {
    pub status: OrderStatus,
}

/// Status update response.
///
/// `changed: false` means the request was an idempotent no-op and no
/// notification was attempted.
#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub order: Order,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationOutcome>,
}

/// Apply an administrative status transition to an order.
#[instrument(skip(state), fields(order_id = %id, target = %payload.status))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(payload): Json<StatusUpdatePayload>,
) -> Result<Json<StatusUpdateResponse>, AppError> {
    let store = PgOrderStore::new(state.pool().clone());
    let update = checkout::update_order_status(&store, id, payload.status).await?;

    let notification = if update.changed {
        let notifier = StatusChangeNotifier::new(
            PgNotificationLedger::new(state.pool().clone()),
            state.mailer(),
            state.config().store_name.clone(),
        );
        notifier.notify_status_change(&update.order).await
    } else {
        None
    };

    Ok(Json(StatusUpdateResponse {
        order: update.order,
        changed: update.changed,
        notification,
    }))
}

/// WhatsApp links response.
#[derive(Debug, Serialize)]
pub struct WhatsAppLinksResponse {
    pub order_number: String,
    pub links: Vec<AdminLink>,
}

/// Build the administrator WhatsApp deep links for an order.
pub async fn whatsapp_links(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<WhatsAppLinksResponse>, AppError> {
    let store = PgOrderStore::new(state.pool().clone());
    let order = store
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    let links = whatsapp::admin_links(&order, &state.config().whatsapp);

    Ok(Json(WhatsAppLinksResponse {
        order_number: order.order_number,
        links,
    }))
}
