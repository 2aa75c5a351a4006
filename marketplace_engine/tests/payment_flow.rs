//! Integration tests for the payment lifecycle: initiation, gateway outcomes, refunds, and the
//! concurrency guarantees around the 1:1 order↔payment relation.

mod support;

use std::sync::Arc;

use marketplace_engine::{
    authz::Actor,
    db_types::{CardDetails, NewOrder, OrderStatusType, PaymentMethod, PaymentStatus, Role},
    events::{GroupKey, NotificationEvent, PaymentNotificationType},
    gateway::{FakeGateway, FakeGatewayConfig},
    traits::MarketplaceDatabase,
    PaymentFlowError,
    PaymentRequest,
};
use smp_common::Money;
use support::TestRig;
use tokio::time::Duration;

fn card_details() -> CardDetails {
    CardDetails {
        card_number: "4111111111111111".into(),
        card_expiry: "12/29".into(),
        card_cvv: "123".into(),
        card_holder_name: "Alice Client".into(),
    }
}

async fn place_order(rig: &mut TestRig, quantity: i64) -> i64 {
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let request = NewOrder::new(rig.seed.client.id, rig.seed.service.id, quantity)
        .with_description("Two-bedroom flat")
        .with_address("12 Canal Street");
    let order = rig.orders.create_order(request, &client).await.expect("order creation failed");
    // Creation publishes its own events; they are not under test here.
    rig.drain_events();
    order.id
}

#[tokio::test]
async fn approved_payment_completes_and_marks_order_paid() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    // base price 250.00 × 2 = 500.00
    let order_id = place_order(&mut rig, 2).await;

    let request = PaymentRequest::new(PaymentMethod::Card).with_card(card_details());
    let result = rig.payments.initiate(order_id, request, &client).await.expect("payment failed");

    assert_eq!(result.payment.amount, Money::from_whole(500));
    assert_eq!(result.payment.status, PaymentStatus::Completed);
    assert!(result.payment.gateway_transaction_id.is_some());
    assert!(result.payment.processed_at.is_some());
    assert_eq!(result.order.status, OrderStatusType::Paid);
    assert_eq!(result.gateway_response["gateway_fee"], "15.00");

    // Exactly one payment_success event, addressed to the client's group, carrying the order id
    // and the full amount.
    let events = rig.drain_events();
    let payment_events: Vec<_> = events
        .iter()
        .filter(|n| matches!(n.event, NotificationEvent::PaymentNotification { .. }))
        .collect();
    assert_eq!(payment_events.len(), 1);
    let notification = payment_events[0];
    assert_eq!(notification.group, GroupKey::user(rig.seed.client.id));
    match &notification.event {
        NotificationEvent::PaymentNotification { notification_type, order_id: oid, amount, .. } => {
            assert_eq!(*notification_type, PaymentNotificationType::PaymentSuccess);
            assert_eq!(*oid, order_id);
            assert_eq!(amount, "500.00");
        },
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn declined_payment_fails_and_cancels_order() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_decline()).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 1).await;

    let result = rig
        .payments
        .initiate(order_id, PaymentRequest::new(PaymentMethod::Payme), &client)
        .await
        .expect("a declared decline is not an error");

    assert_eq!(result.payment.status, PaymentStatus::Failed);
    assert!(result.payment.gateway_transaction_id.is_none());
    assert!(result.payment.gateway_response_value().is_some());
    assert_eq!(result.order.status, OrderStatusType::Canceled);
    assert_eq!(result.gateway_response["code"], "400");

    let notification = rig.next_event().await;
    assert_eq!(notification.group, GroupKey::user(rig.seed.client.id));
    assert!(matches!(
        notification.event,
        NotificationEvent::PaymentNotification {
            notification_type: PaymentNotificationType::PaymentFailed,
            ..
        }
    ));
}

#[tokio::test]
async fn card_payments_require_complete_card_details() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 1).await;

    let err = rig
        .payments
        .initiate(order_id, PaymentRequest::new(PaymentMethod::Card), &client)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentFlowError::Validation(_)));

    let mut incomplete = card_details();
    incomplete.card_cvv = String::new();
    let err = rig
        .payments
        .initiate(order_id, PaymentRequest::new(PaymentMethod::Card).with_card(incomplete), &client)
        .await
        .unwrap_err();
    match err {
        PaymentFlowError::Validation(reason) => assert!(reason.contains("card_cvv")),
        other => panic!("expected a validation error, got {other:?}"),
    }

    // Validation failed before any mutation: no payment row, order untouched.
    assert!(rig.payments.db().fetch_payment_for_order(order_id).await.unwrap().is_none());
    let order = rig.orders.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn initiate_on_non_pending_order_conflicts_without_creating_a_payment() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let admin = Actor::new(rig.seed.admin.id, Role::Admin);
    let order_id = place_order(&mut rig, 1).await;
    rig.orders.update_status(order_id, OrderStatusType::Canceled, "called off", &admin).await.unwrap();

    let err = rig
        .payments
        .initiate(order_id, PaymentRequest::new(PaymentMethod::Click), &client)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentFlowError::Conflict(_)));
    assert!(rig.payments.db().fetch_payment_for_order(order_id).await.unwrap().is_none());
}

#[tokio::test]
async fn a_failed_payment_permanently_blocks_the_order() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_decline()).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 1).await;
    rig.payments.initiate(order_id, PaymentRequest::new(PaymentMethod::Payme), &client).await.unwrap();

    let err = rig
        .payments
        .initiate(order_id, PaymentRequest::new(PaymentMethod::Payme), &client)
        .await
        .unwrap_err();
    // The order was canceled by the failure, so the precondition trips first; either way the
    // caller sees a conflict and no second payment is ever created.
    assert!(matches!(err, PaymentFlowError::Conflict(_)));
}

#[tokio::test]
async fn concurrent_initiates_create_exactly_one_payment() {
    // A little gateway latency keeps both calls in flight at once.
    let gateway = FakeGateway::new(FakeGatewayConfig { success_rate: 1.0, latency_ms: (10, 20), decline_refunds: false });
    let mut rig = TestRig::with_gateway(gateway).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 1).await;

    let payments = Arc::new(rig.payments);
    let (a, b) = tokio::join!(
        {
            let api = Arc::clone(&payments);
            async move { api.initiate(order_id, PaymentRequest::new(PaymentMethod::Payme), &client).await }
        },
        {
            let api = Arc::clone(&payments);
            async move { api.initiate(order_id, PaymentRequest::new(PaymentMethod::Click), &client).await }
        },
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one initiate must win: {a:?} / {b:?}");
    let loser = if a.is_ok() { b.unwrap_err() } else { a.unwrap_err() };
    assert!(matches!(loser, PaymentFlowError::Conflict(_)));
    assert!(payments.db().fetch_payment_for_order(order_id).await.unwrap().is_some());
}

#[tokio::test]
async fn gateway_timeout_is_recorded_as_a_failure() {
    let slow = FakeGateway::new(FakeGatewayConfig { success_rate: 1.0, latency_ms: (300, 400), decline_refunds: false });
    let mut rig = TestRig::with_gateway_and_timeout(slow, Duration::from_millis(50)).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 1).await;

    let err = rig
        .payments
        .initiate(order_id, PaymentRequest::new(PaymentMethod::Payme), &client)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentFlowError::Gateway(_)));

    // The timeout is absorbed into the same failed/canceled transition as a decline, so nothing
    // is left dangling in pending state.
    let payment = rig.payments.db().fetch_payment_for_order(order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    let order = rig.orders.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Canceled);
}

#[tokio::test]
async fn refund_moves_payment_to_refunded_and_cancels_order() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 2).await;
    let paid = rig
        .payments
        .initiate(order_id, PaymentRequest::new(PaymentMethod::Card).with_card(card_details()), &client)
        .await
        .unwrap();
    rig.drain_events();

    let result = rig.payments.refund(&paid.payment.id, &client).await.expect("refund failed");
    assert_eq!(result.payment.status, PaymentStatus::Refunded);
    assert_eq!(result.order.status, OrderStatusType::Canceled);

    // The refund document is merged into the stored gateway response.
    let stored = result.payment.gateway_response_value().unwrap();
    assert_eq!(stored["refund_data"]["status"], "refunded");
    assert_eq!(
        stored["refund_data"]["original_transaction_id"],
        paid.payment.gateway_transaction_id.clone().unwrap().as_str()
    );
    assert_eq!(stored["refund_data"]["refunded_amount"], "500.00");

    let notification = rig.next_event().await;
    assert_eq!(notification.group, GroupKey::user(rig.seed.client.id));
    assert!(matches!(
        notification.event,
        NotificationEvent::PaymentNotification {
            notification_type: PaymentNotificationType::PaymentRefunded,
            ..
        }
    ));
}

#[tokio::test]
async fn only_completed_payments_are_refundable() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_decline()).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 1).await;
    let failed = rig.payments.initiate(order_id, PaymentRequest::new(PaymentMethod::Payme), &client).await.unwrap();
    rig.drain_events();

    let err = rig.payments.refund(&failed.payment.id, &client).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::InvalidState(PaymentStatus::Failed)));

    // Nothing moved, and no notification went out.
    let payment = rig.payments.db().fetch_payment(&failed.payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(rig.drain_events().is_empty());
}

#[tokio::test]
async fn refunds_require_the_payer_or_an_admin() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 1).await;
    let paid = rig
        .payments
        .initiate(order_id, PaymentRequest::new(PaymentMethod::Card).with_card(card_details()), &client)
        .await
        .unwrap();
    rig.drain_events();

    let stranger = rig.db.insert_user("mallory", Role::Client).await.unwrap();
    let err = rig.payments.refund(&paid.payment.id, &Actor::new(stranger.id, Role::Client)).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::Permission(_)));

    let admin = Actor::new(rig.seed.admin.id, Role::Admin);
    let result = rig.payments.refund(&paid.payment.id, &admin).await.expect("admin refund failed");
    assert_eq!(result.payment.status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn concurrent_refunds_have_exactly_one_winner() {
    let gateway = FakeGateway::new(FakeGatewayConfig { success_rate: 1.0, latency_ms: (10, 20), decline_refunds: false });
    let mut rig = TestRig::with_gateway(gateway).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 1).await;
    let paid = rig.payments.initiate(order_id, PaymentRequest::new(PaymentMethod::Payme), &client).await.unwrap();
    rig.drain_events();

    let payments = Arc::new(rig.payments);
    let id_a = paid.payment.id.clone();
    let id_b = paid.payment.id.clone();
    let (a, b) = tokio::join!(
        {
            let api = Arc::clone(&payments);
            async move { api.refund(&id_a, &client).await }
        },
        {
            let api = Arc::clone(&payments);
            async move { api.refund(&id_b, &client).await }
        },
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one refund must win: {a:?} / {b:?}");
    let loser = if a.is_ok() { b.unwrap_err() } else { a.unwrap_err() };
    assert!(matches!(loser, PaymentFlowError::InvalidState(_)));
    let payment = payments.db().fetch_payment(&paid.payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn declined_refunds_leave_all_state_untouched() {
    let mut rig = TestRig::with_gateway(FakeGateway::failing_refunds()).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 1).await;
    let paid = rig
        .payments
        .initiate(order_id, PaymentRequest::new(PaymentMethod::Card).with_card(card_details()), &client)
        .await
        .unwrap();
    rig.drain_events();

    let err = rig.payments.refund(&paid.payment.id, &client).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::RefundDeclined(_)));

    let payment = rig.payments.db().fetch_payment(&paid.payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    let order = rig.orders.db().fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert!(rig.drain_events().is_empty());
}

#[tokio::test]
async fn gateway_response_round_trips_structurally() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let client = Actor::new(rig.seed.client.id, Role::Client);
    let order_id = place_order(&mut rig, 2).await;
    let result = rig
        .payments
        .initiate(order_id, PaymentRequest::new(PaymentMethod::Card).with_card(card_details()), &client)
        .await
        .unwrap();

    // Reload from storage and compare the documents structurally.
    let reloaded = rig.payments.db().fetch_payment(&result.payment.id).await.unwrap().unwrap();
    assert_eq!(reloaded.gateway_response_value().unwrap(), &result.gateway_response);
}
