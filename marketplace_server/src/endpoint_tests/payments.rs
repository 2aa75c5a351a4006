use actix_web::{http::StatusCode, test::TestRequest};
use marketplace_engine::gateway::FakeGateway;
use serde_json::{json, Value};

use super::helpers::{bearer, TestBackend};

async fn place_order(backend: &TestBackend) -> i64 {
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(&backend.seed.client))
        .set_json(json!({"service_id": backend.seed.service.id, "quantity": 2}));
    let (status, order) = backend.request(req).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    order["id"].as_i64().unwrap()
}

async fn pay(backend: &TestBackend, order_id: i64, body: Value) -> (StatusCode, Value) {
    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/payments"))
        .insert_header(bearer(&backend.seed.client))
        .set_json(body);
    backend.request(req).await
}

#[actix_web::test]
async fn paying_an_unknown_order_returns_404() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let (status, _) = pay(&backend, 4242, json!({"payment_method": "click"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn an_approved_card_payment_returns_the_gateway_document() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let order_id = place_order(&backend).await;
    let (status, body) = pay(
        &backend,
        order_id,
        json!({
            "payment_method": "card",
            "card_number": "4111111111111111",
            "card_expiry": "12/29",
            "card_cvv": "123",
            "card_holder_name": "Alice Client",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment"]["status"], "completed");
    assert_eq!(body["payment"]["amount"], 50_000);
    assert_eq!(body["gateway_response"]["code"], "200");
    assert_eq!(body["gateway_response"]["amount"], "500.00");
    assert_eq!(body["gateway_response"]["gateway_fee"], "15.00");
}

#[actix_web::test]
async fn card_payments_without_card_details_are_rejected() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let order_id = place_order(&backend).await;
    let (status, body) = pay(&backend, order_id, json!({"payment_method": "card"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().to_lowercase().contains("card"));
}

#[actix_web::test]
async fn a_declined_payment_still_returns_the_document() {
    let backend = TestBackend::with_gateway(FakeGateway::always_decline()).await;
    let order_id = place_order(&backend).await;
    let (status, body) = pay(&backend, order_id, json!({"payment_method": "payme"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment"]["status"], "failed");
    assert!(body["payment"]["gateway_transaction_id"].is_null());
    assert_eq!(body["gateway_response"]["code"], "400");
}

#[actix_web::test]
async fn a_second_payment_attempt_conflicts() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let order_id = place_order(&backend).await;
    let (status, _) = pay(&backend, order_id, json!({"payment_method": "click"})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = pay(&backend, order_id, json!({"payment_method": "click"})).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[actix_web::test]
async fn only_clients_may_initiate_payments() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let order_id = place_order(&backend).await;
    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/payments"))
        .insert_header(bearer(&backend.seed.worker))
        .set_json(json!({"payment_method": "click"}));
    let (status, _) = backend.request(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn refunds_are_restricted_and_single_shot() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let order_id = place_order(&backend).await;
    let (_, body) = pay(&backend, order_id, json!({"payment_method": "payme"})).await;
    let payment_id = body["payment"]["id"].as_str().unwrap().to_string();

    // A different client may not refund someone else's payment.
    let stranger = {
        use marketplace_engine::{db_types::Role, traits::MarketplaceDatabase};
        backend.db.insert_user("mallory", Role::Client).await.unwrap()
    };
    let req = TestRequest::post()
        .uri(&format!("/api/payments/{payment_id}/refund"))
        .insert_header(bearer(&stranger));
    let (status, _) = backend.request(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The payer may.
    let req = TestRequest::post()
        .uri(&format!("/api/payments/{payment_id}/refund"))
        .insert_header(bearer(&backend.seed.client));
    let (status, body) = backend.request(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment"]["status"], "refunded");
    assert_eq!(body["refund_response"]["status"], "refunded");

    // A second refund observes the non-completed status.
    let req = TestRequest::post()
        .uri(&format!("/api/payments/{payment_id}/refund"))
        .insert_header(bearer(&backend.seed.client));
    let (status, body) = backend.request(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["error"].as_str().unwrap().contains("refunded"));
}

#[actix_web::test]
async fn refunding_an_unknown_payment_returns_404() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let req = TestRequest::post()
        .uri("/api/payments/00000000-0000-0000-0000-000000000000/refund")
        .insert_header(bearer(&backend.seed.client));
    let (status, _) = backend.request(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
