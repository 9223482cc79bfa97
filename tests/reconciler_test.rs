use pos_checkout::application::checkout::{ConfirmationOutcome, OrderSource};
use pos_checkout::application::reconciler::{ReconcileOutcome, Reconciler};
use pos_checkout::config::CheckoutConfig;
use pos_checkout::domain::ports::{
    NotificationChannel, OrderStore, OrderStoreBox, PendingPaymentStore, PendingPaymentStoreBox,
};
use pos_checkout::infrastructure::gateway::SimulatedOutcome;
use std::sync::Arc;

mod common;
use common::{failure, fill_cart, session, success};

#[tokio::test]
async fn test_late_confirmation_after_cancel_is_recorded_once() {
    let mut s = session(SimulatedOutcome::Silent);
    fill_cart(&mut s.checkout);

    let id = s.checkout.initiate_mpesa("0712345678").await.unwrap();
    assert_eq!(s.checkout.cancel(), Some(id.clone()));

    let orders: OrderStoreBox = Arc::new(s.orders.clone());
    let pending: PendingPaymentStoreBox = Arc::new(s.pending.clone());
    let reconciler = Reconciler::new(orders, pending, CheckoutConfig::default());
    let subscription = s.channel.subscribe().await.unwrap();
    let worker = tokio::spawn(async move { reconciler.run(subscription).await });

    // The session no longer cares about this payment
    let late = s
        .checkout
        .handle_notification(success(&id, "LATE01"))
        .await
        .unwrap();
    assert_eq!(late, ConfirmationOutcome::Ignored);

    s.channel.publish(success(&id, "LATE01"));
    s.channel.publish(success(&id, "LATE01"));
    drop(s.channel);
    drop(s.checkout);

    let recorded = worker.await.unwrap();
    assert_eq!(recorded, 1);

    let stored = s.orders.fetch_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(s.pending.inner.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_late_callback_leaves_pending_record() {
    let mut s = session(SimulatedOutcome::Silent);
    fill_cart(&mut s.checkout);
    let id = s.checkout.initiate_mpesa("0712345678").await.unwrap();
    s.checkout.cancel();

    let reconciler = Reconciler::new(
        Arc::new(s.orders.clone()),
        Arc::new(s.pending.clone()),
        CheckoutConfig::default(),
    );
    let outcome = reconciler
        .handle(failure(&id, "DS timeout user cannot be reached"))
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::LeftPending { .. }));
    assert!(s.pending.inner.get(&id).await.unwrap().is_some());

    let an_hour_later = chrono::Utc::now() + chrono::Duration::hours(1);
    let stale = reconciler
        .stale_pending(an_hour_later, chrono::Duration::minutes(15))
        .await
        .unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].correlation_id, id);
}

#[tokio::test]
async fn test_session_and_reconciler_write_the_same_order() {
    let mut s = session(SimulatedOutcome::Silent);
    fill_cart(&mut s.checkout);
    let id = s.checkout.initiate_mpesa("0712345678").await.unwrap();

    let reconciler = Reconciler::new(
        Arc::new(s.orders.clone()),
        Arc::new(s.pending.clone()),
        CheckoutConfig::default(),
    );
    let ReconcileOutcome::Recorded(first) = reconciler.handle(success(&id, "QWE123")).await.unwrap()
    else {
        panic!("expected the reconciler to record the order");
    };
    assert_eq!(first.source, OrderSource::ReconciledFromStore);

    // The session sees the same callback after the pending record is gone
    let outcome = s
        .checkout
        .handle_notification(success(&id, "QWE123"))
        .await
        .unwrap();
    let ConfirmationOutcome::Completed(second) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(second.source, OrderSource::ReconstructedFromSession);
    assert_eq!(second.order.id, first.order.id);

    assert_eq!(s.orders.fetch_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let s = session(SimulatedOutcome::Success);
    let orders: OrderStoreBox = Arc::new(s.orders.clone());
    let pending: PendingPaymentStoreBox = Arc::new(s.pending.clone());

    // Verify Send + Sync by spawning tasks
    let os_handle = tokio::spawn(async move { orders.fetch_all().await.unwrap().len() });
    let ps_handle = tokio::spawn(async move { pending.list().await.unwrap().len() });

    assert_eq!(os_handle.await.unwrap(), 0);
    assert_eq!(ps_handle.await.unwrap(), 0);
}
