//! Notification attempt ledger persistence.
//!
//! `notification_attempts` has no foreign key to `orders`: rows must remain
//! queryable after the originating order is deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercadito_core::{
    NotificationAttemptId, NotificationKind, NotificationStatus, OrderId,
};
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::{NewNotificationAttempt, NotificationAttempt, SendOutcome};
use crate::services::notifications::NotificationLedger;

/// Internal row type for notification attempt queries.
#[derive(Debug, sqlx::FromRow)]
struct NotificationAttemptRow {
    id: NotificationAttemptId,
    kind: NotificationKind,
    recipient: String,
    order_id: OrderId,
    order_number: String,
    status: NotificationStatus,
    attempts: i32,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NotificationAttemptRow> for NotificationAttempt {
    fn from(row: NotificationAttemptRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            recipient: row.recipient,
            order_id: row.order_id,
            order_number: row.order_number,
            status: row.status,
            attempts: row.attempts,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ATTEMPT_COLUMNS: &str = r"
    id, kind, recipient, order_id, order_number, status,
    attempts, error, created_at, updated_at
";

/// Notification ledger backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgNotificationLedger {
    pool: PgPool,
}

impl PgNotificationLedger {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationLedger for PgNotificationLedger {
    async fn record(
        &self,
        new: NewNotificationAttempt,
    ) -> Result<NotificationAttempt, RepositoryError> {
        let query = format!(
            r"
            INSERT INTO notification_attempts (
                kind, recipient, order_id, order_number, status, attempts, error
            )
            VALUES ($1, $2, $3, $4, $5, 1, $6)
            RETURNING {ATTEMPT_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, NotificationAttemptRow>(&query)
            .bind(new.kind)
            .bind(&new.recipient)
            .bind(new.order_id)
            .bind(&new.order_number)
            .bind(new.outcome.status())
            .bind(new.outcome.error())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn find(
        &self,
        id: NotificationAttemptId,
    ) -> Result<Option<NotificationAttempt>, RepositoryError> {
        let query = format!(
            r"
            SELECT {ATTEMPT_COLUMNS}
            FROM notification_attempts
            WHERE id = $1
            "
        );

        let row = sqlx::query_as::<_, NotificationAttemptRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(NotificationAttempt::from))
    }

    async fn list_failed(&self) -> Result<Vec<NotificationAttempt>, RepositoryError> {
        let query = format!(
            r"
            SELECT {ATTEMPT_COLUMNS}
            FROM notification_attempts
            WHERE status IN ('failed', 'retry_pending')
            ORDER BY created_at DESC
            "
        );

        let rows = sqlx::query_as::<_, NotificationAttemptRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(NotificationAttempt::from).collect())
    }

    async fn mark_retry_pending(&self, id: NotificationAttemptId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE notification_attempts
            SET status = 'retry_pending', updated_at = now()
            WHERE id = $1 AND status IN ('failed', 'retry_pending')
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn record_retry(
        &self,
        id: NotificationAttemptId,
        outcome: SendOutcome,
    ) -> Result<NotificationAttempt, RepositoryError> {
        let query = format!(
            r"
            UPDATE notification_attempts
            SET attempts = attempts + 1,
                status = $2,
                error = $3,
                updated_at = now()
            WHERE id = $1
            RETURNING {ATTEMPT_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, NotificationAttemptRow>(&query)
            .bind(id)
            .bind(outcome.status())
            .bind(outcome.error())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }
}
