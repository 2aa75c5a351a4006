//! Integration tests for order creation, worker assignment and the status-update flow.

mod support;

use std::sync::Arc;

use marketplace_engine::{
    authz::Actor,
    db_types::{NewOrder, OrderStatusType, Role},
    events::{GroupKey, NotificationEvent, OrderNotificationType},
    gateway::FakeGateway,
    traits::MarketplaceDatabase,
    OrderFlowError,
};
use smp_common::Money;
use support::TestRig;

fn client_actor(rig: &TestRig) -> Actor {
    Actor::new(rig.seed.client.id, Role::Client)
}

fn worker_actor(rig: &TestRig) -> Actor {
    Actor::new(rig.seed.worker.id, Role::Worker)
}

fn admin_actor(rig: &TestRig) -> Actor {
    Actor::new(rig.seed.admin.id, Role::Admin)
}

/// Create an order and walk it to `paid` so assignment tests can start from the right state.
async fn paid_order(rig: &mut TestRig) -> i64 {
    let client = client_actor(rig);
    let order = rig
        .orders
        .create_order(NewOrder::new(rig.seed.client.id, rig.seed.service.id, 1), &client)
        .await
        .unwrap();
    rig.orders.update_status(order.id, OrderStatusType::Paid, "paid externally", &admin_actor(rig)).await.unwrap();
    rig.drain_events();
    order.id
}

#[tokio::test]
async fn create_order_computes_the_total_once() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let client = client_actor(&rig);
    let request = NewOrder::new(rig.seed.client.id, rig.seed.service.id, 3)
        .with_description("Three rooms")
        .with_address("5 Hill Road");
    let order = rig.orders.create_order(request, &client).await.unwrap();

    // 250.00 × 3
    assert_eq!(order.total_price, Money::from_whole(750));
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(order.worker_id.is_none());

    // order_created to the client's group, new_order_available broadcast to the worker role.
    let events = rig.drain_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].group, GroupKey::user(rig.seed.client.id));
    assert!(matches!(
        events[0].event,
        NotificationEvent::OrderNotification { notification_type: OrderNotificationType::OrderCreated, .. }
    ));
    assert_eq!(events[1].group, GroupKey::role(Role::Worker));
    match &events[1].event {
        NotificationEvent::OrderNotification { notification_type, message, .. } => {
            assert_eq!(*notification_type, OrderNotificationType::NewOrderAvailable);
            assert!(message.contains("Deep cleaning"));
        },
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn an_explicitly_supplied_total_is_kept() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let client = client_actor(&rig);
    let request = NewOrder::new(rig.seed.client.id, rig.seed.service.id, 2).with_total_price(Money::from_whole(99));
    let order = rig.orders.create_order(request, &client).await.unwrap();
    assert_eq!(order.total_price, Money::from_whole(99));
}

#[tokio::test]
async fn orders_require_an_active_service_and_a_client() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let client = client_actor(&rig);

    let err = rig.orders.create_order(NewOrder::new(rig.seed.client.id, 999, 1), &client).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Validation(_)));

    rig.db.set_service_active(rig.seed.service.id, false).await.unwrap();
    let err = rig
        .orders
        .create_order(NewOrder::new(rig.seed.client.id, rig.seed.service.id, 1), &client)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::Validation(_)));

    rig.db.set_service_active(rig.seed.service.id, true).await.unwrap();
    let err = rig
        .orders
        .create_order(NewOrder::new(rig.seed.worker.id, rig.seed.service.id, 1), &worker_actor(&rig))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::Permission(_)));
}

#[tokio::test]
async fn assignment_claims_the_order_and_notifies_the_client() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let order_id = paid_order(&mut rig).await;
    let order = rig.orders.assign(order_id, &worker_actor(&rig)).await.unwrap();

    assert_eq!(order.status, OrderStatusType::InProgress);
    assert_eq!(order.worker_id, Some(rig.seed.worker.id));

    // The audit trail gained an entry naming the worker.
    let history = rig.orders.status_history(order_id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.status, OrderStatusType::InProgress);
    assert_eq!(last.comment, "Assigned to bob");
    assert_eq!(last.created_by, rig.seed.worker.id);

    let notification = rig.next_event().await;
    assert_eq!(notification.group, GroupKey::user(rig.seed.client.id));
    match &notification.event {
        NotificationEvent::OrderNotification { notification_type, worker_name, .. } => {
            assert_eq!(*notification_type, OrderNotificationType::WorkerAssigned);
            assert_eq!(worker_name.as_deref(), Some("bob"));
        },
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn assignment_requires_the_right_specialization() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let order_id = paid_order(&mut rig).await;
    let unskilled = rig.db.insert_user("dave", Role::Worker).await.unwrap();

    let err = rig.orders.assign(order_id, &Actor::new(unskilled.id, Role::Worker)).await.unwrap_err();
    match err {
        OrderFlowError::Validation(reason) => assert!(reason.contains("not specialized")),
        other => panic!("expected a validation error, got {other:?}"),
    }
    // The order was not touched.
    let order = rig.db.fetch_order(order_id).await.unwrap().unwrap();
    assert!(order.worker_id.is_none());
    assert_eq!(order.status, OrderStatusType::Paid);
}

#[tokio::test]
async fn assignment_fails_closed_for_non_workers() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let order_id = paid_order(&mut rig).await;
    for actor in [client_actor(&rig), admin_actor(&rig)] {
        let err = rig.orders.assign(order_id, &actor).await.unwrap_err();
        assert!(matches!(err, OrderFlowError::Permission(_)));
    }
}

#[tokio::test]
async fn unpaid_orders_cannot_be_claimed() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let client = client_actor(&rig);
    let order =
        rig.orders.create_order(NewOrder::new(rig.seed.client.id, rig.seed.service.id, 1), &client).await.unwrap();
    rig.drain_events();

    let err = rig.orders.assign(order.id, &worker_actor(&rig)).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Conflict(_)));
}

#[tokio::test]
async fn an_order_is_assigned_at_most_once() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let order_id = paid_order(&mut rig).await;
    let rival = rig.db.insert_user("erin", Role::Worker).await.unwrap();
    rig.db.add_specialization(rival.id, rig.seed.service.id).await.unwrap();

    rig.orders.assign(order_id, &worker_actor(&rig)).await.unwrap();
    let err = rig.orders.assign(order_id, &Actor::new(rival.id, Role::Worker)).await.unwrap_err();
    match err {
        OrderFlowError::Conflict(reason) => assert!(reason.contains("already assigned")),
        other => panic!("expected a conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let order_id = paid_order(&mut rig).await;
    let rival = rig.db.insert_user("erin", Role::Worker).await.unwrap();
    rig.db.add_specialization(rival.id, rig.seed.service.id).await.unwrap();
    let worker = worker_actor(&rig);
    let rival_actor = Actor::new(rival.id, Role::Worker);

    let orders = Arc::new(rig.orders);
    let (a, b) = tokio::join!(
        {
            let api = Arc::clone(&orders);
            async move { api.assign(order_id, &worker).await }
        },
        {
            let api = Arc::clone(&orders);
            async move { api.assign(order_id, &rival_actor).await }
        },
    );
    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one claim must win: {a:?} / {b:?}");
}

#[tokio::test]
async fn status_updates_follow_the_transition_table() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let order_id = paid_order(&mut rig).await;
    rig.orders.assign(order_id, &worker_actor(&rig)).await.unwrap();
    rig.drain_events();

    // in_progress → completed is in the table; the worker may perform it.
    let order = rig
        .orders
        .update_status(order_id, OrderStatusType::Completed, "all done", &worker_actor(&rig))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);
    assert!(order.completed_at.is_some());

    // completed is terminal for non-admins.
    let err = rig
        .orders
        .update_status(order_id, OrderStatusType::Pending, "reopen", &client_actor(&rig))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidTransition { .. }));

    // An admin may override the table.
    let order = rig
        .orders
        .update_status(order_id, OrderStatusType::Pending, "back-office correction", &admin_actor(&rig))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn status_updates_are_restricted_to_involved_parties() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let order_id = paid_order(&mut rig).await;
    let stranger = rig.db.insert_user("mallory", Role::Client).await.unwrap();

    let err = rig
        .orders
        .update_status(order_id, OrderStatusType::Canceled, "", &Actor::new(stranger.id, Role::Client))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::Permission(_)));
}

#[tokio::test]
async fn status_updates_notify_client_and_assigned_worker() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let order_id = paid_order(&mut rig).await;
    rig.orders.assign(order_id, &worker_actor(&rig)).await.unwrap();
    rig.drain_events();

    rig.orders.update_status(order_id, OrderStatusType::Completed, "done and dusted", &worker_actor(&rig)).await.unwrap();

    let events = rig.drain_events();
    let groups: Vec<_> = events.iter().map(|n| n.group.clone()).collect();
    assert_eq!(groups, vec![GroupKey::user(rig.seed.client.id), GroupKey::user(rig.seed.worker.id)]);
    for n in &events {
        match &n.event {
            NotificationEvent::StatusUpdate { order_id: oid, new_status, comment, .. } => {
                assert_eq!(*oid, order_id);
                assert_eq!(*new_status, OrderStatusType::Completed);
                assert_eq!(comment, "done and dusted");
            },
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn the_audit_trail_is_append_only_and_ordered() {
    let mut rig = TestRig::with_gateway(FakeGateway::always_approve()).await;
    let order_id = paid_order(&mut rig).await;
    rig.orders.assign(order_id, &worker_actor(&rig)).await.unwrap();
    rig.orders.update_status(order_id, OrderStatusType::Completed, "finished", &worker_actor(&rig)).await.unwrap();

    let history = rig.orders.status_history(order_id).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![OrderStatusType::Paid, OrderStatusType::InProgress, OrderStatusType::Completed]
    );
    assert!(history.windows(2).all(|w| w[0].id < w[1].id));
}
