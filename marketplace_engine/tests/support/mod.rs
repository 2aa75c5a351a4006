//! Shared scaffolding for the engine integration suites.

use std::sync::Arc;

use marketplace_engine::{
    events::{EventProducer, EventProducers, Notification},
    gateway::{FakeGateway, GatewayRegistry},
    test_utils::{prepare_test_env, seed_marketplace, MarketplaceSeed},
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};
use tempfile::TempDir;
use tokio::{
    sync::mpsc,
    time::{timeout, Duration},
};

pub struct TestRig {
    // Holds the temp database directory open for the duration of the test.
    _guard: TempDir,
    pub db: SqliteDatabase,
    pub seed: MarketplaceSeed,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentFlowApi<SqliteDatabase>,
    pub events: mpsc::Receiver<Notification>,
}

impl TestRig {
    /// A fully seeded engine with every payment method routed to `gateway` and a plain capture
    /// channel standing in for the delivery layer.
    pub async fn with_gateway(gateway: FakeGateway) -> Self {
        Self::build(gateway, None).await
    }

    pub async fn with_gateway_and_timeout(gateway: FakeGateway, gateway_timeout: Duration) -> Self {
        Self::build(gateway, Some(gateway_timeout)).await
    }

    async fn build(gateway: FakeGateway, gateway_timeout: Option<Duration>) -> Self {
        let (_guard, db) = prepare_test_env().await;
        let seed = seed_marketplace(&db).await;
        let (tx, events) = mpsc::channel(64);
        let producers = EventProducers { notification_producers: vec![EventProducer::new(tx)] };
        let registry = GatewayRegistry::pinned(Arc::new(gateway));
        let orders = OrderFlowApi::new(db.clone(), producers.clone());
        let mut payments = PaymentFlowApi::new(db.clone(), registry, producers);
        if let Some(t) = gateway_timeout {
            payments = payments.with_gateway_timeout(t);
        }
        Self { _guard, db, seed, orders, payments, events }
    }

    /// Pop the next published notification, failing the test if none arrives promptly.
    pub async fn next_event(&mut self) -> Notification {
        timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for a notification")
            .expect("notification channel closed")
    }

    /// Everything published so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.events.try_recv() {
            out.push(n);
        }
        out
    }
}
