use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::Duration;
use marketplace_engine::{
    db_types::User,
    events::{EventProducer, EventProducers, Notification, NotificationHub},
    gateway::{FakeGateway, GatewayRegistry},
    test_utils::{init_test_logging, prepare_test_env, seed_marketplace, MarketplaceSeed},
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};
use smp_common::Secret;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::{
    auth::TokenIssuer,
    config::AuthConfig,
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        AssignOrderRoute,
        CreateOrderRoute,
        InitiatePaymentRoute,
        RefundPaymentRoute,
        UpdateOrderStatusRoute,
    },
    ws::notifications_ws,
};

// A test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: Secret::new("endpoint-test-signing-secret, not for reuse".to_string()),
        token_expiry: Duration::hours(1),
    }
}

pub fn bearer(user: &User) -> (&'static str, String) {
    let issuer = TokenIssuer::new(&test_auth_config());
    ("Authorization", format!("Bearer {}", issuer.issue_token(user.id, user.role).expect("token issue failed")))
}

pub struct TestBackend {
    // Keeps the temp database directory alive.
    _guard: TempDir,
    pub db: SqliteDatabase,
    pub seed: MarketplaceSeed,
    pub hub: NotificationHub,
    pub events: mpsc::Receiver<Notification>,
    producers: EventProducers,
    registry: GatewayRegistry,
}

impl TestBackend {
    pub async fn with_gateway(gateway: FakeGateway) -> Self {
        init_test_logging();
        let (_guard, db) = prepare_test_env().await;
        let seed = seed_marketplace(&db).await;
        let (tx, events) = mpsc::channel(64);
        let producers = EventProducers { notification_producers: vec![EventProducer::new(tx)] };
        let registry = GatewayRegistry::pinned(std::sync::Arc::new(gateway));
        let hub = NotificationHub::new(16);
        Self { _guard, db, seed, hub, events, producers, registry }
    }

    /// Build a fresh app instance, the same wiring a server worker gets, and run `req` against
    /// it. Errors raised by middleware are rendered the way the HTTP layer would render them.
    pub async fn request(&self, req: TestRequest) -> (StatusCode, serde_json::Value) {
        let orders_api = OrderFlowApi::new(self.db.clone(), self.producers.clone());
        let payments_api = PaymentFlowApi::new(self.db.clone(), self.registry.clone(), self.producers.clone());
        let issuer = TokenIssuer::new(&test_auth_config());
        let app = App::new()
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(issuer.clone()))
            .app_data(web::Data::new(self.hub.clone()))
            .service(health)
            .route("/ws", web::get().to(notifications_ws))
            .service(
                web::scope("/api")
                    .wrap(JwtMiddlewareFactory::new(issuer))
                    .service(CreateOrderRoute::<SqliteDatabase>::new())
                    .service(InitiatePaymentRoute::<SqliteDatabase>::new())
                    .service(RefundPaymentRoute::<SqliteDatabase>::new())
                    .service(AssignOrderRoute::<SqliteDatabase>::new())
                    .service(UpdateOrderStatusRoute::<SqliteDatabase>::new()),
            );
        let service = test::init_service(app).await;
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let bytes = test::read_body(res).await;
                (status, parse_body(&bytes))
            },
            Err(e) => {
                let res = e.error_response();
                let status = res.status();
                let bytes = actix_web::body::to_bytes(res.into_body()).await.unwrap_or_default();
                (status, parse_body(&bytes))
            },
        }
    }

    pub fn drain_events(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.events.try_recv() {
            out.push(n);
        }
        out
    }
}

fn parse_body(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
