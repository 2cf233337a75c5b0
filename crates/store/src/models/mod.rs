//! Domain models for the fulfillment core.

pub mod catalog;
pub mod notification;
pub mod order;

pub use catalog::ProductSnapshot;
pub use notification::{NewNotificationAttempt, NotificationAttempt, SendOutcome};
pub use order::{ContactInfo, NewOrder, Order, OrderItem, ShippingAddress, ValidatedLine};
