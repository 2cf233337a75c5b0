//! Notification attempt ledger models.
//!
//! One row per send attempt, updated in place by retries and never deleted.
//! The ledger references orders by identifier only so it survives order
//! deletion as a durable audit log.

use chrono::{DateTime, Utc};
use mercadito_core::{NotificationAttemptId, NotificationKind, NotificationStatus, OrderId};
use serde::{Deserialize, Serialize};

/// A durable record of one logical notification and its send attempts.
///
/// The attempt counter is monotonically non-decreasing; status may move
/// `failed -> sent` on a successful retry but never `sent -> failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAttempt {
    /// Unique attempt ID.
    pub id: NotificationAttemptId,
    /// What was sent.
    pub kind: NotificationKind,
    /// Recipient email address.
    pub recipient: String,
    /// Order the notification is about (plain reference, not a foreign key).
    pub order_id: OrderId,
    /// Display code copied at attempt time, kept for audit after deletion.
    pub order_number: String,
    /// Latest delivery outcome.
    pub status: NotificationStatus,
    /// How many sends have been attempted.
    pub attempts: i32,
    /// Error text from the latest failed send.
    pub error: Option<String>,
    /// When the first attempt was made.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The transport accepted the message.
    Sent,
    /// The send failed with the captured error text.
    Failed(String),
}

impl SendOutcome {
    /// Ledger status for this outcome.
    #[must_use]
    pub const fn status(&self) -> NotificationStatus {
        match self {
            Self::Sent => NotificationStatus::Sent,
            Self::Failed(_) => NotificationStatus::Failed,
        }
    }

    /// Error text for this outcome, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Sent => None,
            Self::Failed(e) => Some(e.as_str()),
        }
    }
}

/// Parameters for recording the first attempt of a notification.
#[derive(Debug, Clone)]
pub struct NewNotificationAttempt {
    /// What was sent.
    pub kind: NotificationKind,
    /// Recipient email address.
    pub recipient: String,
    /// Order the notification is about.
    pub order_id: OrderId,
    /// Display code copied at attempt time.
    pub order_number: String,
    /// Outcome of the first send.
    pub outcome: SendOutcome,
}
