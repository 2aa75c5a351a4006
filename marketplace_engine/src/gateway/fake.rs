//! The simulated payment processor.
//!
//! Mimics the behaviour of the Payme/Click/card processors the platform integrates with in
//! production: a bounded random latency window, an 85% approval rate, a 3% gateway fee on
//! approved payments, and a fixed set of decline reason codes. Refunds always succeed unless the
//! adapter is built with refund fault injection.

use async_trait::async_trait;
use chrono::Utc;
use rand::{seq::SliceRandom, thread_rng, Rng};
use serde_json::{json, Value};
use smp_common::Money;
use tokio::time::Duration;
use uuid::Uuid;

use crate::{
    db_types::{CardDetails, PaymentMethod},
    gateway::{
        ApprovedPayment,
        DeclineCode,
        DeclinedPayment,
        GatewayError,
        PaymentGateway,
        ProcessOutcome,
        RefundConfirmation,
        RefundOutcome,
    },
};

#[derive(Debug, Clone)]
pub struct FakeGatewayConfig {
    /// Probability in `[0, 1]` that `process` approves a payment.
    pub success_rate: f64,
    /// Simulated processing latency bounds in milliseconds. Refunds take half as long.
    pub latency_ms: (u64, u64),
    /// When set, every refund comes back as a declared decline.
    pub decline_refunds: bool,
}

impl Default for FakeGatewayConfig {
    fn default() -> Self {
        Self { success_rate: 0.85, latency_ms: (1000, 3000), decline_refunds: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    config: FakeGatewayConfig,
}

impl FakeGateway {
    pub fn new(config: FakeGatewayConfig) -> Self {
        Self { config }
    }

    /// An adapter that approves every payment, with no simulated latency. For tests.
    pub fn always_approve() -> Self {
        Self::new(FakeGatewayConfig { success_rate: 1.0, latency_ms: (0, 0), decline_refunds: false })
    }

    /// An adapter that declines every payment, with no simulated latency. For tests.
    pub fn always_decline() -> Self {
        Self::new(FakeGatewayConfig { success_rate: 0.0, latency_ms: (0, 0), decline_refunds: false })
    }

    /// An approving adapter whose refunds are declined. Fault injection for the refund-failure
    /// branch, which the default simulation never exercises.
    pub fn failing_refunds() -> Self {
        Self::new(FakeGatewayConfig { success_rate: 1.0, latency_ms: (0, 0), decline_refunds: true })
    }

    async fn simulate_latency(&self, divisor: u64) {
        // The rng handle must not be held across an await point.
        let delay_ms = {
            let (lo, hi) = self.config.latency_ms;
            let mut rng = thread_rng();
            rng.gen_range(lo..=hi) / divisor.max(1)
        };
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn process(
        &self,
        amount: Money,
        method: PaymentMethod,
        _card: Option<&CardDetails>,
    ) -> Result<ProcessOutcome, GatewayError> {
        let (approved, decline) = {
            let mut rng = thread_rng();
            let roll: f64 = rng.gen();
            let decline = *DeclineCode::ALL.choose(&mut rng).expect("decline code list is non-empty");
            (roll < self.config.success_rate, decline)
        };
        self.simulate_latency(1).await;

        let transaction_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now().timestamp();
        if approved {
            let fee = amount.percent(3);
            let response = json!({
                "code": "200",
                "message": "Payment processed successfully",
                "amount": amount.to_string(),
                "currency": "USD",
                "payment_method": method.to_string(),
                "timestamp": timestamp,
                "gateway_fee": fee.to_string(),
            });
            Ok(ProcessOutcome::Approved(ApprovedPayment { transaction_id, fee, response }))
        } else {
            let response = json!({
                "code": "400",
                "message": decline.message(),
                "error_code": decline.as_str(),
                "amount": amount.to_string(),
                "currency": "USD",
                "payment_method": method.to_string(),
                "timestamp": timestamp,
            });
            Ok(ProcessOutcome::Declined(DeclinedPayment {
                error_code: decline,
                message: decline.message().to_string(),
                response,
            }))
        }
    }

    async fn refund(&self, transaction_id: &str, amount: Option<Money>) -> Result<RefundOutcome, GatewayError> {
        self.simulate_latency(2).await;
        if self.config.decline_refunds {
            return Ok(RefundOutcome::Declined { message: "Refund declined by gateway".to_string() });
        }
        let refund_id = Uuid::new_v4().to_string();
        let refunded_amount = amount.map(|a| a.to_string()).unwrap_or_else(|| "full".to_string());
        let response = json!({
            "status": "refunded",
            "refund_id": refund_id,
            "original_transaction_id": transaction_id,
            "refunded_amount": refunded_amount,
            "timestamp": Utc::now().timestamp(),
        });
        Ok(RefundOutcome::Refunded(RefundConfirmation { refund_id, response }))
    }

    async fn verify(&self, transaction_id: &str) -> Result<Value, GatewayError> {
        Ok(json!({
            "status": "completed",
            "transaction_id": transaction_id,
            "verified": true,
            "timestamp": Utc::now().timestamp(),
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn approved_payments_carry_a_3_percent_fee() {
        let gw = FakeGateway::always_approve();
        let outcome = gw.process(Money::from_whole(500), PaymentMethod::Card, None).await.unwrap();
        match outcome {
            ProcessOutcome::Approved(ok) => {
                assert_eq!(ok.fee, Money::from_whole(15));
                assert_eq!(ok.response["code"], "200");
                assert_eq!(ok.response["amount"], "500.00");
                assert_eq!(ok.response["gateway_fee"], "15.00");
                assert!(!ok.transaction_id.is_empty());
            },
            ProcessOutcome::Declined(_) => panic!("always_approve declined a payment"),
        }
    }

    #[tokio::test]
    async fn declined_payments_use_a_known_reason_code() {
        let gw = FakeGateway::always_decline();
        let outcome = gw.process(Money::from_whole(10), PaymentMethod::Payme, None).await.unwrap();
        match outcome {
            ProcessOutcome::Declined(err) => {
                assert!(DeclineCode::ALL.contains(&err.error_code));
                assert_eq!(err.response["code"], "400");
                assert_eq!(err.message, err.error_code.message());
            },
            ProcessOutcome::Approved(_) => panic!("always_decline approved a payment"),
        }
    }

    #[tokio::test]
    async fn refunds_succeed_by_default_and_echo_the_transaction() {
        let gw = FakeGateway::always_approve();
        match gw.refund("tx-123", Some(Money::from_whole(42))).await.unwrap() {
            RefundOutcome::Refunded(ok) => {
                assert_eq!(ok.response["original_transaction_id"], "tx-123");
                assert_eq!(ok.response["refunded_amount"], "42.00");
            },
            RefundOutcome::Declined { .. } => panic!("default adapter declined a refund"),
        }
        match gw.refund("tx-123", None).await.unwrap() {
            RefundOutcome::Refunded(ok) => assert_eq!(ok.response["refunded_amount"], "full"),
            RefundOutcome::Declined { .. } => panic!("default adapter declined a refund"),
        }
    }

    #[tokio::test]
    async fn verification_echoes_the_transaction_id() {
        let gw = FakeGateway::always_approve();
        let doc = gw.verify("tx-456").await.unwrap();
        assert_eq!(doc["transaction_id"], "tx-456");
        assert_eq!(doc["verified"], true);
    }

    #[tokio::test]
    async fn refund_fault_injection() {
        let gw = FakeGateway::failing_refunds();
        match gw.refund("tx-123", None).await.unwrap() {
            RefundOutcome::Declined { message } => assert!(message.contains("declined")),
            RefundOutcome::Refunded(_) => panic!("failing_refunds adapter refunded"),
        }
    }
}
