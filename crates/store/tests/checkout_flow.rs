//! End-to-end checkout, notification, and retry behavior against in-memory
//! fakes.

mod support;

use std::sync::Arc;

use mercadito_core::{NotificationStatus, OrderStatus, ProductId};
use mercadito_store::services::checkout::{
    self, CheckoutError, CheckoutLine, CheckoutRequest, CheckoutSettings, OrderStore,
    RejectReason, StatusUpdateError,
};
use mercadito_store::services::email::MailTransport;
use mercadito_store::services::notifications::{
    EmailRetryService, NotificationDispatcher, NotificationLedger, RetryError,
    StatusChangeNotifier,
};
use rust_decimal::Decimal;
use support::{FakeMailer, MemoryLedger, MemoryStore, address, contact, product};

const STORE_NAME: &str = "Mercadito";

fn settings() -> CheckoutSettings {
    CheckoutSettings {
        tax_rate: Decimal::ZERO,
        shipping_fee: Decimal::ZERO,
    }
}

fn request(lines: Vec<CheckoutLine>) -> CheckoutRequest {
    CheckoutRequest {
        lines,
        contact: contact(),
        shipping_address: address(),
        user_id: None,
    }
}

fn line(product_id: i32, quantity: i32, price: Decimal) -> CheckoutLine {
    CheckoutLine {
        product_id: ProductId::new(product_id),
        quantity,
        price,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_checkouts_never_oversell() {
    let store = Arc::new(MemoryStore::new());
    let price = Decimal::new(1000, 2);
    store.insert_product(product(1, price, 5));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            checkout::place_order(&store, &store, &settings(), request(vec![line(1, 1, price)]))
                .await
        }));
    }

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(_) => succeeded += 1,
            Err(CheckoutError::Rejected(r)) => {
                assert_eq!(r.reason, RejectReason::InsufficientStock);
                rejected += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    // Exactly as many orders as there was stock, and not one unit more.
    assert_eq!(succeeded, 5);
    assert_eq!(rejected, 15);
    assert_eq!(store.stock_of(ProductId::new(1)), 0);
    assert_eq!(store.order_count(), 5);
}

#[tokio::test]
async fn multi_line_failure_leaves_no_reservations() {
    let store = MemoryStore::new();
    let price = Decimal::new(1000, 2);
    store.insert_product(product(1, price, 10));
    store.insert_product(product(2, price, 1));

    let result = checkout::place_order(
        &store,
        &store,
        &settings(),
        request(vec![line(1, 3, price), line(2, 5, price)]),
    )
    .await;

    let Err(CheckoutError::Rejected(rejection)) = result else {
        panic!("expected rejection");
    };
    assert_eq!(rejection.line, 1);
    assert_eq!(rejection.product_id, ProductId::new(2));
    assert_eq!(rejection.reason, RejectReason::InsufficientStock);

    // The passing first line reserved nothing.
    assert_eq!(store.stock_of(ProductId::new(1)), 10);
    assert_eq!(store.stock_of(ProductId::new(2)), 1);
    assert_eq!(store.order_count(), 0);
}

#[tokio::test]
async fn price_mismatch_rejects_before_any_mutation() {
    let store = MemoryStore::new();
    store.insert_product(product(1, Decimal::new(1000, 2), 10));

    let result = checkout::place_order(
        &store,
        &store,
        &settings(),
        request(vec![line(1, 1, Decimal::new(999, 2))]),
    )
    .await;

    let Err(CheckoutError::Rejected(rejection)) = result else {
        panic!("expected rejection");
    };
    assert!(matches!(rejection.reason, RejectReason::PriceMismatch { .. }));
    assert_eq!(store.stock_of(ProductId::new(1)), 10);
}

#[tokio::test]
async fn empty_checkout_is_rejected() {
    let store = MemoryStore::new();
    let result = checkout::place_order(&store, &store, &settings(), request(vec![])).await;
    assert!(matches!(result, Err(CheckoutError::EmptyOrder)));
}

#[tokio::test]
async fn order_totals_are_frozen_against_later_price_edits() {
    let store = MemoryStore::new();
    let price = Decimal::new(2500, 2);
    store.insert_product(product(1, price, 10));

    let tax_settings = CheckoutSettings {
        tax_rate: Decimal::new(10, 2), // 10%
        shipping_fee: Decimal::new(500, 2),
    };
    let order = checkout::place_order(
        &store,
        &store,
        &tax_settings,
        request(vec![line(1, 2, price)]),
    )
    .await
    .expect("order placed");

    assert_eq!(order.subtotal, Decimal::new(5000, 2));
    assert_eq!(order.tax, Decimal::new(500, 2));
    assert_eq!(order.shipping, Decimal::new(500, 2));
    assert_eq!(order.total, Decimal::new(6000, 2));

    // Later catalog edits must not leak into the committed order.
    store.set_price(ProductId::new(1), Decimal::new(9900, 2));
    let reloaded = checkout::update_order_status(&store, order.id, OrderStatus::Confirmed)
        .await
        .expect("status update")
        .order;
    assert_eq!(reloaded.total, Decimal::new(6000, 2));
    assert_eq!(reloaded.items[0].unit_price, price);
}

#[tokio::test]
async fn failed_confirmation_email_does_not_fail_checkout() {
    let store = MemoryStore::new();
    let price = Decimal::new(1000, 2);
    store.insert_product(product(1, price, 5));

    let order =
        checkout::place_order(&store, &store, &settings(), request(vec![line(1, 1, price)]))
            .await
            .expect("order placed");

    let ledger = Arc::new(MemoryLedger::new());
    let mailer = Arc::new(FakeMailer::failing());
    let dispatcher = NotificationDispatcher::new(Arc::clone(&ledger), mailer, STORE_NAME);

    let outcome = dispatcher.send_order_confirmation(&order).await;
    assert_eq!(outcome.channel, "email");
    assert!(!outcome.sent);
    assert!(outcome.error.is_some());

    // The order survived and exactly one failed ledger row was written.
    assert_eq!(store.stock_of(ProductId::new(1)), 4);
    let rows = ledger.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, NotificationStatus::Failed);
    assert_eq!(rows[0].attempts, 1);
    assert_eq!(rows[0].order_number, order.order_number);
    assert_eq!(rows[0].recipient, "ana@example.com");
}

#[tokio::test]
async fn successful_confirmation_renders_both_bodies() {
    let store = MemoryStore::new();
    let price = Decimal::new(1500, 2);
    store.insert_product(product(1, price, 5));

    let order =
        checkout::place_order(&store, &store, &settings(), request(vec![line(1, 2, price)]))
            .await
            .expect("order placed");

    let ledger = Arc::new(MemoryLedger::new());
    let mailer = Arc::new(FakeMailer::new());
    let transport = Arc::clone(&mailer) as Arc<dyn MailTransport>;
    let dispatcher = NotificationDispatcher::new(Arc::clone(&ledger), transport, STORE_NAME);

    let outcome = dispatcher.send_order_confirmation(&order).await;
    assert!(outcome.sent);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ana@example.com");
    assert!(sent[0].subject.contains(&order.order_number));
    assert!(sent[0].text.contains("Product 1"));
    assert!(sent[0].html.contains("Product 1"));
    assert_eq!(ledger.rows()[0].status, NotificationStatus::Sent);
}

#[tokio::test]
async fn idempotent_status_update_sends_nothing() {
    let store = MemoryStore::new();
    let price = Decimal::new(1000, 2);
    store.insert_product(product(1, price, 5));

    let order =
        checkout::place_order(&store, &store, &settings(), request(vec![line(1, 1, price)]))
            .await
            .expect("order placed");

    let ledger = Arc::new(MemoryLedger::new());
    let mailer = Arc::new(FakeMailer::new());
    let transport = Arc::clone(&mailer) as Arc<dyn MailTransport>;
    let notifier = StatusChangeNotifier::new(Arc::clone(&ledger), transport, STORE_NAME);

    // First update is a real transition and notifies.
    let update = checkout::update_order_status(&store, order.id, OrderStatus::Confirmed)
        .await
        .expect("transition");
    assert!(update.changed);
    let outcome = notifier.notify_status_change(&update.order).await;
    assert!(outcome.expect("confirmed is templated").sent);

    // Repeating the same target is a no-op; the caller sees changed=false
    // and must not notify.
    let repeat = checkout::update_order_status(&store, order.id, OrderStatus::Confirmed)
        .await
        .expect("no-op");
    assert!(!repeat.changed);
    assert_eq!(repeat.order.status, OrderStatus::Confirmed);

    assert_eq!(mailer.sent().len(), 1);
    assert_eq!(ledger.rows().len(), 1);
}

#[tokio::test]
async fn invalid_transition_is_rejected() {
    let store = MemoryStore::new();
    let price = Decimal::new(1000, 2);
    store.insert_product(product(1, price, 5));

    let order =
        checkout::place_order(&store, &store, &settings(), request(vec![line(1, 1, price)]))
            .await
            .expect("order placed");

    let err = checkout::update_order_status(&store, order.id, OrderStatus::Delivered)
        .await
        .expect_err("pending cannot jump to delivered");
    assert!(matches!(
        err,
        StatusUpdateError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        }
    ));

    // The order is untouched.
    let reloaded = checkout::update_order_status(&store, order.id, OrderStatus::Confirmed)
        .await
        .expect("valid transition still works");
    assert_eq!(reloaded.order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn retry_flips_failed_row_to_sent_and_bumps_counter() {
    let store = Arc::new(MemoryStore::new());
    let price = Decimal::new(1000, 2);
    store.insert_product(product(1, price, 5));

    let order =
        checkout::place_order(&store, &store, &settings(), request(vec![line(1, 1, price)]))
            .await
            .expect("order placed");

    let ledger = Arc::new(MemoryLedger::new());
    let mailer = Arc::new(FakeMailer::failing());
    let transport = Arc::clone(&mailer) as Arc<dyn MailTransport>;
    let dispatcher =
        NotificationDispatcher::new(Arc::clone(&ledger), Arc::clone(&transport), STORE_NAME);
    dispatcher.send_order_confirmation(&order).await;

    let failed = ledger.rows().pop().expect("one row");
    assert_eq!(failed.status, NotificationStatus::Failed);

    // Mail comes back up; the operator retries.
    mailer.set_failing(false);
    let retry_service = EmailRetryService::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
        Arc::clone(&transport),
        STORE_NAME,
    );
    let updated = retry_service.retry(failed.id).await.expect("retry");

    assert_eq!(updated.status, NotificationStatus::Sent);
    assert_eq!(updated.attempts, 2);
    assert!(updated.error.is_none());
    assert_eq!(mailer.sent().len(), 1);
    assert_eq!(mailer.sent()[0].to, failed.recipient);

    // A sent row is no longer retryable.
    let err = retry_service
        .retry(failed.id)
        .await
        .expect_err("not retryable");
    assert!(matches!(err, RetryError::NotRetryable { .. }));
}

#[tokio::test]
async fn failed_retry_keeps_row_failed_with_bumped_counter() {
    let store = Arc::new(MemoryStore::new());
    let price = Decimal::new(1000, 2);
    store.insert_product(product(1, price, 5));

    let order =
        checkout::place_order(&store, &store, &settings(), request(vec![line(1, 1, price)]))
            .await
            .expect("order placed");

    let ledger = Arc::new(MemoryLedger::new());
    let mailer = Arc::new(FakeMailer::failing());
    let transport = Arc::clone(&mailer) as Arc<dyn MailTransport>;
    let dispatcher =
        NotificationDispatcher::new(Arc::clone(&ledger), Arc::clone(&transport), STORE_NAME);
    dispatcher.send_order_confirmation(&order).await;
    let failed = ledger.rows().pop().expect("one row");

    let retry_service = EmailRetryService::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
        Arc::clone(&transport),
        STORE_NAME,
    );
    let updated = retry_service
        .retry(failed.id)
        .await
        .expect("retry recorded");

    // A failed re-send is a recorded outcome, not an API error.
    assert_eq!(updated.status, NotificationStatus::Failed);
    assert_eq!(updated.attempts, 2);
    assert!(updated.error.is_some());
}

#[tokio::test]
async fn retry_with_deleted_order_leaves_row_untouched() {
    let store = Arc::new(MemoryStore::new());
    let price = Decimal::new(1000, 2);
    store.insert_product(product(1, price, 5));

    let order =
        checkout::place_order(&store, &store, &settings(), request(vec![line(1, 1, price)]))
            .await
            .expect("order placed");

    let ledger = Arc::new(MemoryLedger::new());
    let mailer = Arc::new(FakeMailer::failing());
    let transport = Arc::clone(&mailer) as Arc<dyn MailTransport>;
    let dispatcher =
        NotificationDispatcher::new(Arc::clone(&ledger), Arc::clone(&transport), STORE_NAME);
    dispatcher.send_order_confirmation(&order).await;
    let failed = ledger.rows().pop().expect("one row");

    store.delete_order(order.id);
    mailer.set_failing(false);

    let retry_service = EmailRetryService::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
        Arc::clone(&transport),
        STORE_NAME,
    );
    let err = retry_service
        .retry(failed.id)
        .await
        .expect_err("order gone");
    assert!(matches!(err, RetryError::OrderMissing(_)));

    // The ledger row survives order deletion, unmodified.
    let row = ledger.rows().pop().expect("row still there");
    assert_eq!(row.status, NotificationStatus::Failed);
    assert_eq!(row.attempts, 1);
    assert_eq!(row.order_number, order.order_number);
}

#[tokio::test]
async fn interrupted_retry_stays_visible_and_retryable() {
    let store = Arc::new(MemoryStore::new());
    let price = Decimal::new(1000, 2);
    store.insert_product(product(1, price, 5));

    let order =
        checkout::place_order(&store, &store, &settings(), request(vec![line(1, 1, price)]))
            .await
            .expect("order placed");

    let ledger = Arc::new(MemoryLedger::new());
    let mailer = Arc::new(FakeMailer::failing());
    let transport = Arc::clone(&mailer) as Arc<dyn MailTransport>;
    let dispatcher =
        NotificationDispatcher::new(Arc::clone(&ledger), Arc::clone(&transport), STORE_NAME);
    dispatcher.send_order_confirmation(&order).await;
    let failed = ledger.rows().pop().expect("one row");

    // A retry that crashed after flagging the row in flight leaves it
    // retry-pending. The row must stay listed and a later retry must still
    // pick it up.
    ledger
        .mark_retry_pending(failed.id)
        .await
        .expect("mark in flight");
    let listed = ledger.list_failed().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, NotificationStatus::RetryPending);

    mailer.set_failing(false);
    let retry_service = EmailRetryService::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
        Arc::clone(&transport),
        STORE_NAME,
    );
    let updated = retry_service.retry(failed.id).await.expect("retry");

    assert_eq!(updated.status, NotificationStatus::Sent);
    assert_eq!(updated.attempts, 2);
    assert!(ledger.list_failed().await.expect("list").is_empty());
}

#[tokio::test]
async fn stale_status_write_cannot_escape_a_later_update() {
    let store = MemoryStore::new();
    let price = Decimal::new(1000, 2);
    store.insert_product(product(1, price, 5));

    let order =
        checkout::place_order(&store, &store, &settings(), request(vec![line(1, 1, price)]))
            .await
            .expect("order placed");

    checkout::update_order_status(&store, order.id, OrderStatus::Cancelled)
        .await
        .expect("cancel");

    // A writer still holding the pending snapshot loses: the conditional
    // write matches zero rows instead of resurrecting the order.
    let stale = store
        .update_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
        .await
        .expect("store");
    assert!(stale.is_none());

    let reloaded = store
        .find(order.id)
        .await
        .expect("find")
        .expect("order still there");
    assert_eq!(reloaded.status, OrderStatus::Cancelled);
}
