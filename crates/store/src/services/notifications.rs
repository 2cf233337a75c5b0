//! Notification dispatch and the attempt ledger.
//!
//! Everything here runs strictly after the business transaction it follows
//! has committed, and is best-effort: a send failure is captured as durable
//! ledger state and surfaced to operators, never raised to the caller of the
//! checkout or status-update operation.

use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;
use mercadito_core::{NotificationAttemptId, NotificationKind, NotificationStatus, OrderStatus};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::{NewNotificationAttempt, NotificationAttempt, Order, SendOutcome};
use crate::services::checkout::OrderStore;
use crate::services::email::{EmailError, MailTransport, OutgoingEmail};

/// Durable ledger of notification send attempts.
///
/// Rows are created at first attempt, updated in place by retries, and never
/// deleted; they outlive the orders they reference.
#[async_trait]
pub trait NotificationLedger: Send + Sync {
    /// Record the first attempt of a logical notification.
    async fn record(&self, new: NewNotificationAttempt)
    -> Result<NotificationAttempt, RepositoryError>;

    /// Load an attempt row.
    async fn find(
        &self,
        id: NotificationAttemptId,
    ) -> Result<Option<NotificationAttempt>, RepositoryError>;

    /// List attempts needing operator attention, newest first. This covers
    /// failed rows and rows stuck in retry-pending by an interrupted retry;
    /// nothing sweeps the ledger automatically, so both must stay visible.
    async fn list_failed(&self) -> Result<Vec<NotificationAttempt>, RepositoryError>;

    /// Mark a retryable attempt as retry-pending while the retry is in
    /// flight. Re-marking an already retry-pending row is allowed so an
    /// interrupted retry can be picked up again.
    async fn mark_retry_pending(&self, id: NotificationAttemptId) -> Result<(), RepositoryError>;

    /// Record the outcome of a retry: bumps the attempt counter and sets the
    /// final status and error text.
    async fn record_retry(
        &self,
        id: NotificationAttemptId,
        outcome: SendOutcome,
    ) -> Result<NotificationAttempt, RepositoryError>;
}

#[async_trait]
impl<T: NotificationLedger + ?Sized> NotificationLedger for Arc<T> {
    async fn record(
        &self,
        new: NewNotificationAttempt,
    ) -> Result<NotificationAttempt, RepositoryError> {
        (**self).record(new).await
    }

    async fn find(
        &self,
        id: NotificationAttemptId,
    ) -> Result<Option<NotificationAttempt>, RepositoryError> {
        (**self).find(id).await
    }

    async fn list_failed(&self) -> Result<Vec<NotificationAttempt>, RepositoryError> {
        (**self).list_failed().await
    }

    async fn mark_retry_pending(&self, id: NotificationAttemptId) -> Result<(), RepositoryError> {
        (**self).mark_retry_pending(id).await
    }

    async fn record_retry(
        &self,
        id: NotificationAttemptId,
        outcome: SendOutcome,
    ) -> Result<NotificationAttempt, RepositoryError> {
        (**self).record_retry(id, outcome).await
    }
}

/// Per-channel outcome reported alongside the business result.
///
/// The checkout response carries these so a caller can distinguish "order
/// failed" from "order succeeded but confirmation could not be sent".
#[derive(Debug, Clone, Serialize)]
pub struct NotificationOutcome {
    /// Delivery channel (currently always "email").
    pub channel: &'static str,
    /// Whether the transport accepted the message.
    pub sent: bool,
    /// Captured error text when `sent` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationOutcome {
    fn email(result: &Result<(), EmailError>) -> Self {
        match result {
            Ok(()) => Self {
                channel: "email",
                sent: true,
                error: None,
            },
            Err(e) => Self {
                channel: "email",
                sent: false,
                error: Some(e.to_string()),
            },
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// HTML template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    store_name: &'a str,
    order: &'a Order,
}

/// Plain text template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    store_name: &'a str,
    order: &'a Order,
}

/// HTML template for status update emails.
#[derive(Template)]
#[template(path = "email/status_update.html")]
struct StatusUpdateHtml<'a> {
    store_name: &'a str,
    contact_name: &'a str,
    order_number: &'a str,
    heading: &'a str,
    body: &'a str,
}

/// Plain text template for status update emails.
#[derive(Template)]
#[template(path = "email/status_update.txt")]
struct StatusUpdateText<'a> {
    store_name: &'a str,
    contact_name: &'a str,
    order_number: &'a str,
    heading: &'a str,
    body: &'a str,
}

/// Canned message for a templated status.
struct StatusMessage {
    subject: String,
    heading: String,
    body: String,
}

/// Map a target status to its canned message.
///
/// Statuses without a template (pending, failed, refunded) produce no
/// notification at all.
fn message_for_status(status: OrderStatus, order_number: &str) -> Option<StatusMessage> {
    let (subject, heading, body) = match status {
        OrderStatus::Confirmed => (
            format!("Your order {order_number} is confirmed"),
            "Order confirmed".to_string(),
            "We have received your order and it is now confirmed. We will let you know as soon as it is being prepared.",
        ),
        OrderStatus::Processing => (
            format!("Your order {order_number} is being prepared"),
            "Order in preparation".to_string(),
            "Our team is preparing your order for shipment.",
        ),
        OrderStatus::Shipped => (
            format!("Your order {order_number} has shipped"),
            "Order shipped".to_string(),
            "Your order is on its way.",
        ),
        OrderStatus::Delivered => (
            format!("Your order {order_number} has been delivered"),
            "Order delivered".to_string(),
            "Your order has been delivered. Thank you for shopping with us!",
        ),
        OrderStatus::Cancelled => (
            format!("Your order {order_number} has been cancelled"),
            "Order cancelled".to_string(),
            "Your order has been cancelled. If this was unexpected, please contact us.",
        ),
        OrderStatus::Pending | OrderStatus::Refunded | OrderStatus::Failed => return None,
    };

    Some(StatusMessage {
        subject,
        heading,
        body: body.to_string(),
    })
}

/// Generic fallback used when retrying a status update whose order has since
/// moved to a status without a canned message.
fn fallback_status_message(status: OrderStatus, order_number: &str) -> StatusMessage {
    StatusMessage {
        subject: format!("Update on your order {order_number}"),
        heading: "Order update".to_string(),
        body: format!("Your order is now {status}."),
    }
}

/// Render the order confirmation email for a committed order.
fn render_order_confirmation(
    store_name: &str,
    to: &str,
    order: &Order,
) -> Result<OutgoingEmail, EmailError> {
    let html = OrderConfirmationHtml { store_name, order }.render()?;
    let text = OrderConfirmationText { store_name, order }.render()?;

    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: format!("Thanks for your order {}", order.order_number),
        text,
        html,
    })
}

/// Render a status update email from a canned message.
fn render_status_update(
    store_name: &str,
    to: &str,
    order: &Order,
    message: &StatusMessage,
) -> Result<OutgoingEmail, EmailError> {
    let html = StatusUpdateHtml {
        store_name,
        contact_name: &order.contact.name,
        order_number: &order.order_number,
        heading: &message.heading,
        body: &message.body,
    }
    .render()?;
    let text = StatusUpdateText {
        store_name,
        contact_name: &order.contact.name,
        order_number: &order.order_number,
        heading: &message.heading,
        body: &message.body,
    }
    .render()?;

    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: message.subject.clone(),
        text,
        html,
    })
}

/// Write one attempt row for a send result, swallowing ledger failures.
///
/// The ledger write is itself best-effort relative to the request: a failure
/// to record is logged, not propagated, because the send already happened.
async fn record_attempt<L: NotificationLedger>(
    ledger: &L,
    kind: NotificationKind,
    order: &Order,
    result: &Result<(), EmailError>,
) {
    let outcome = match result {
        Ok(()) => SendOutcome::Sent,
        Err(e) => SendOutcome::Failed(e.to_string()),
    };

    let new = NewNotificationAttempt {
        kind,
        recipient: order.customer_email.to_string(),
        order_id: order.id,
        order_number: order.order_number.clone(),
        outcome,
    };

    if let Err(e) = ledger.record(new).await {
        tracing::error!(
            order_id = %order.id,
            kind = ?kind,
            error = %e,
            "Failed to record notification attempt"
        );
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Sends the post-checkout confirmation email and records the outcome.
///
/// Runs after the order transaction commits, on the same request, and never
/// fails the checkout call: the outcome is reported alongside the order.
pub struct NotificationDispatcher<L> {
    ledger: L,
    mailer: Arc<dyn MailTransport>,
    store_name: String,
}

impl<L: NotificationLedger> NotificationDispatcher<L> {
    pub fn new(ledger: L, mailer: Arc<dyn MailTransport>, store_name: impl Into<String>) -> Self {
        Self {
            ledger,
            mailer,
            store_name: store_name.into(),
        }
    }

    /// Send the confirmation email for a freshly committed order.
    ///
    /// Writes exactly one ledger row (sent, or failed with the captured
    /// error and attempts = 1) and returns the outcome for the response.
    pub async fn send_order_confirmation(&self, order: &Order) -> NotificationOutcome {
        let result = self.deliver(order).await;

        if let Err(e) = &result {
            tracing::warn!(
                order_id = %order.id,
                error = %e,
                "Order confirmation email failed; recorded for manual retry"
            );
        }

        record_attempt(
            &self.ledger,
            NotificationKind::OrderConfirmation,
            order,
            &result,
        )
        .await;
        NotificationOutcome::email(&result)
    }

    async fn deliver(&self, order: &Order) -> Result<(), EmailError> {
        let email =
            render_order_confirmation(&self.store_name, order.customer_email.as_str(), order)?;
        self.mailer.send(email).await
    }
}

// =============================================================================
// Status change notifier
// =============================================================================

/// Reacts to order status transitions with templated status emails.
///
/// Same ledger-recording and failure-isolation contract as the dispatcher.
/// Callers must only invoke this after an actual transition; the idempotent
/// no-op rule lives in the status update service.
pub struct StatusChangeNotifier<L> {
    ledger: L,
    mailer: Arc<dyn MailTransport>,
    store_name: String,
}

impl<L: NotificationLedger> StatusChangeNotifier<L> {
    pub fn new(ledger: L, mailer: Arc<dyn MailTransport>, store_name: impl Into<String>) -> Self {
        Self {
            ledger,
            mailer,
            store_name: store_name.into(),
        }
    }

    /// Send the status email for the order's (already persisted) new status.
    ///
    /// Returns `None` without touching the ledger when the status has no
    /// template.
    pub async fn notify_status_change(&self, order: &Order) -> Option<NotificationOutcome> {
        let message = message_for_status(order.status, &order.order_number)?;

        let result = self.deliver(order, &message).await;

        if let Err(e) = &result {
            tracing::warn!(
                order_id = %order.id,
                status = %order.status,
                error = %e,
                "Status update email failed; recorded for manual retry"
            );
        }

        record_attempt(&self.ledger, NotificationKind::StatusUpdate, order, &result).await;
        Some(NotificationOutcome::email(&result))
    }

    async fn deliver(&self, order: &Order, message: &StatusMessage) -> Result<(), EmailError> {
        let email = render_status_update(
            &self.store_name,
            order.customer_email.as_str(),
            order,
            message,
        )?;
        self.mailer.send(email).await
    }
}

// =============================================================================
// Retry service
// =============================================================================

/// Errors from an operator-triggered retry.
#[derive(Debug, Error)]
pub enum RetryError {
    /// No such attempt row.
    #[error("notification attempt {0} not found")]
    AttemptNotFound(NotificationAttemptId),

    /// Sent attempts are not retryable.
    #[error("notification attempt {id} is not retryable (status: {status:?})")]
    NotRetryable {
        id: NotificationAttemptId,
        status: NotificationStatus,
    },

    /// The referenced order no longer exists, so the message cannot be
    /// re-rendered. The attempt row is left untouched.
    #[error("order for notification attempt {0} no longer exists")]
    OrderMissing(NotificationAttemptId),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// Operator-facing re-send of previously failed notification attempts.
///
/// Strictly on-demand; there is no background scheduler sweeping failed
/// rows. Each retry increments the attempt counter and moves the row to
/// sent or failed based on the new outcome.
pub struct EmailRetryService<S, L> {
    store: S,
    ledger: L,
    mailer: Arc<dyn MailTransport>,
    store_name: String,
}

impl<S: OrderStore, L: NotificationLedger> EmailRetryService<S, L> {
    pub fn new(
        store: S,
        ledger: L,
        mailer: Arc<dyn MailTransport>,
        store_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ledger,
            mailer,
            store_name: store_name.into(),
        }
    }

    /// Re-send a failed notification and return the updated attempt row.
    ///
    /// # Errors
    ///
    /// Fails without touching the row if the attempt is missing, already
    /// sent, or its order has been deleted. A failed re-send is not an
    /// error: the row comes back with status failed and a bumped counter.
    pub async fn retry(
        &self,
        id: NotificationAttemptId,
    ) -> Result<NotificationAttempt, RetryError> {
        let attempt = self
            .ledger
            .find(id)
            .await?
            .ok_or(RetryError::AttemptNotFound(id))?;

        if !attempt.status.is_retryable() {
            return Err(RetryError::NotRetryable {
                id,
                status: attempt.status,
            });
        }

        let order = self
            .store
            .find(attempt.order_id)
            .await?
            .ok_or(RetryError::OrderMissing(id))?;

        self.ledger.mark_retry_pending(id).await?;

        let result = self.deliver(&attempt, &order).await;
        let outcome = match result {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                tracing::warn!(attempt_id = %id, error = %e, "Notification retry failed");
                SendOutcome::Failed(e.to_string())
            }
        };

        Ok(self.ledger.record_retry(id, outcome).await?)
    }

    async fn deliver(&self, attempt: &NotificationAttempt, order: &Order) -> Result<(), EmailError> {
        // Same template type, original recipient, same order reference.
        let email = match attempt.kind {
            NotificationKind::OrderConfirmation => {
                render_order_confirmation(&self.store_name, &attempt.recipient, order)?
            }
            NotificationKind::StatusUpdate => {
                let message = message_for_status(order.status, &order.order_number)
                    .unwrap_or_else(|| fallback_status_message(order.status, &order.order_number));
                render_status_update(&self.store_name, &attempt.recipient, order, &message)?
            }
        };

        self.mailer.send(email).await
    }
}
