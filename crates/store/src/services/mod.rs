//! Application services: checkout orchestration, notification dispatch,
//! operator retry, and the SMTP mail transport.

pub mod checkout;
pub mod email;
pub mod notifications;

pub use checkout::{CatalogReader, CheckoutError, CheckoutRequest, CheckoutSettings, OrderStore};
pub use email::{EmailError, MailTransport, OutgoingEmail, SmtpMailer};
pub use notifications::{
    EmailRetryService, NotificationDispatcher, NotificationLedger, NotificationOutcome,
    StatusChangeNotifier,
};
