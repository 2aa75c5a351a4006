//! The reject-before-accept contract of the notification endpoint. Live-connection behaviour
//! (group membership, fan-out, ping echo) is covered by the engine hub tests and the ws unit
//! tests; here we verify the HTTP-side token gate.

use actix_web::{http::StatusCode, test::TestRequest};
use marketplace_engine::gateway::FakeGateway;

use super::helpers::TestBackend;

#[actix_web::test]
async fn connections_without_a_token_are_refused() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let (status, body) = backend.request(TestRequest::get().uri("/ws")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");
}

#[actix_web::test]
async fn connections_with_an_invalid_token_are_refused() {
    let backend = TestBackend::with_gateway(FakeGateway::always_approve()).await;
    let (status, body) = backend.request(TestRequest::get().uri("/ws?token=junk")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");
}
