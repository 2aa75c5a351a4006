use actix_web::{http::StatusCode, test::TestRequest};
use marketplace_engine::gateway::FakeGateway;
use serde_json::json;

use super::helpers::{bearer, TestBackend};

#[actix_web::test]
async fn creating_an_order_requires_a_token() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let req = TestRequest::post().uri("/api/orders").set_json(json!({"service_id": 1}));
    let (status, body) = backend.request(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("No access token"));
}

#[actix_web::test]
async fn creating_an_order_is_client_only() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(&backend.seed.worker))
        .set_json(json!({"service_id": backend.seed.service.id}));
    let (status, _) = backend.request(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn a_garbage_token_is_rejected() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(("Authorization", "Bearer not-a-real-token"))
        .set_json(json!({"service_id": 1}));
    let (status, _) = backend.request(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn clients_can_place_orders() {
    let mut backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(&backend.seed.client))
        .set_json(json!({
            "service_id": backend.seed.service.id,
            "quantity": 2,
            "description": "Whole flat",
            "address": "12 Canal Street",
        }));
    let (status, body) = backend.request(req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["client_id"], backend.seed.client.id);
    // 250.00 × 2, in minor units.
    assert_eq!(body["total_price"], 50_000);

    // order_created to the client plus the worker-role broadcast.
    let events = backend.drain_events();
    assert_eq!(events.len(), 2);
}

#[actix_web::test]
async fn the_full_order_lifecycle_over_http() {
    let mut backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;

    // Client places an order.
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(&backend.seed.client))
        .set_json(json!({"service_id": backend.seed.service.id, "quantity": 1}));
    let (status, order) = backend.request(req).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    let order_id = order["id"].as_i64().unwrap();

    // Client pays.
    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/payments"))
        .insert_header(bearer(&backend.seed.client))
        .set_json(json!({"payment_method": "payme"}));
    let (status, body) = backend.request(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment"]["status"], "completed");

    // Worker accepts.
    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/assign"))
        .insert_header(bearer(&backend.seed.worker));
    let (status, body) = backend.request(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["worker_id"], backend.seed.worker.id);

    // Worker completes.
    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/status"))
        .insert_header(bearer(&backend.seed.worker))
        .set_json(json!({"status": "completed", "comment": "all done"}));
    let (status, body) = backend.request(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "completed");
    assert!(!body["completed_at"].is_null());

    assert!(!backend.drain_events().is_empty());
}

#[actix_web::test]
async fn assignment_is_worker_only_over_http() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let req = TestRequest::post().uri("/api/orders/1/assign").insert_header(bearer(&backend.seed.client));
    let (status, _) = backend.request(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn out_of_table_transitions_are_rejected_for_non_admins() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(&backend.seed.client))
        .set_json(json!({"service_id": backend.seed.service.id}));
    let (_, order) = backend.request(req).await;
    let order_id = order["id"].as_i64().unwrap();

    // pending → completed skips paid and in_progress.
    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/status"))
        .insert_header(bearer(&backend.seed.client))
        .set_json(json!({"status": "completed"}));
    let (status, body) = backend.request(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid status transition"));

    // The admin override goes through.
    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/status"))
        .insert_header(bearer(&backend.seed.admin))
        .set_json(json!({"status": "completed", "comment": "override"}));
    let (status, body) = backend.request(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "completed");
}

#[actix_web::test]
async fn unknown_orders_return_404() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let req = TestRequest::post()
        .uri("/api/orders/4242/status")
        .insert_header(bearer(&backend.seed.client))
        .set_json(json!({"status": "canceled"}));
    let (status, _) = backend.request(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
