//! Notification administration route handlers.
//!
//! Operator surface over the attempt ledger: list failed sends, retry one
//! on demand, and export the failure list as CSV.

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use mercadito_core::{NotificationAttemptId, NotificationKind, NotificationStatus};
use tracing::instrument;

use crate::db::{PgNotificationLedger, PgOrderStore};
use crate::error::AppError;
use crate::models::NotificationAttempt;
use crate::services::notifications::{EmailRetryService, NotificationLedger as _};
use crate::state::AppState;

/// List notification attempts currently in the failed state, newest first.
pub async fn list_failed(
    State(state): State<AppState>,
) -> Result<Json<Vec<NotificationAttempt>>, AppError> {
    let ledger = PgNotificationLedger::new(state.pool().clone());
    Ok(Json(ledger.list_failed().await?))
}

/// Re-send one failed notification attempt.
///
/// Returns the updated ledger row whether or not the re-send succeeded;
/// only a missing row, a non-failed row, or a deleted order is an error.
#[instrument(skip(state), fields(attempt_id = %id))]
pub async fn retry(
    State(state): State<AppState>,
    Path(id): Path<NotificationAttemptId>,
) -> Result<Json<NotificationAttempt>, AppError> {
    let service = EmailRetryService::new(
        PgOrderStore::new(state.pool().clone()),
        PgNotificationLedger::new(state.pool().clone()),
        state.mailer(),
        state.config().store_name.clone(),
    );
    Ok(Json(service.retry(id).await?))
}

const fn kind_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::OrderConfirmation => "order_confirmation",
        NotificationKind::StatusUpdate => "status_update",
    }
}

const fn status_label(status: NotificationStatus) -> &'static str {
    match status {
        NotificationStatus::Sent => "sent",
        NotificationStatus::Failed => "failed",
        NotificationStatus::RetryPending => "retry_pending",
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn failed_attempts_csv(attempts: &[NotificationAttempt]) -> String {
    let mut csv =
        String::from("id,kind,recipient,order_id,order_number,status,attempts,error,created_at,updated_at\n");

    for attempt in attempts {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            attempt.id,
            kind_label(attempt.kind),
            csv_field(&attempt.recipient),
            attempt.order_id,
            csv_field(&attempt.order_number),
            status_label(attempt.status),
            attempt.attempts,
            csv_field(attempt.error.as_deref().unwrap_or_default()),
            attempt.created_at.to_rfc3339(),
            attempt.updated_at.to_rfc3339(),
        ));
    }

    csv
}

/// Export the failed-attempt list as a CSV download.
pub async fn export_failed(State(state): State<AppState>) -> Result<Response, AppError> {
    let ledger = PgNotificationLedger::new(state.pool().clone());
    let attempts = ledger.list_failed().await?;
    let csv = failed_attempts_csv(&attempts);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"failed_notifications.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mercadito_core::OrderId;

    use super::*;

    fn failed_attempt(error: &str) -> NotificationAttempt {
        let now = Utc::now();
        NotificationAttempt {
            id: NotificationAttemptId::new(1),
            kind: NotificationKind::OrderConfirmation,
            recipient: "ana@example.com".to_string(),
            order_id: OrderId::new(42),
            order_number: "MR-AB12CD34".to_string(),
            status: NotificationStatus::Failed,
            attempts: 2,
            error: Some(error.to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_export_includes_header_and_rows() {
        let csv = failed_attempts_csv(&[failed_attempt("connection refused, twice")]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("id,kind,recipient,order_id,order_number,status,attempts,error,created_at,updated_at")
        );
        let row = lines.next().expect("one data row");
        assert!(row.starts_with("1,order_confirmation,ana@example.com,42,MR-AB12CD34,failed,2,"));
        // The comma in the error text forces quoting.
        assert!(row.contains("\"connection refused, twice\""));
    }

    #[test]
    fn test_export_with_no_failures_is_header_only() {
        let csv = failed_attempts_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
    }
}
