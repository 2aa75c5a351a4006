//! Payment gateway adapters.
//!
//! The engine talks to payment processors through the [`PaymentGateway`] trait and resolves the
//! adapter for a payment through a [`GatewayRegistry`] keyed by payment method. Declared business
//! outcomes (approved / declined) are values, not errors; [`GatewayError`] is reserved for the
//! cases where no declared outcome was produced at all (timeouts, transport faults, unknown
//! methods).

mod fake;

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use smp_common::Money;
use thiserror::Error;

pub use fake::{FakeGateway, FakeGatewayConfig};

use crate::db_types::{CardDetails, PaymentMethod};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The gateway did not respond within the allotted time")]
    Timeout,
    #[error("No gateway is registered for payment method '{0}'")]
    UnsupportedMethod(PaymentMethod),
    #[error("Gateway failure: {0}")]
    Internal(String),
}

//--------------------------------------   Process outcomes   -------------------------------------------------------

/// Reason codes a gateway may attach to a declined payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineCode {
    InsufficientFunds,
    CardDeclined,
    InvalidCard,
    NetworkError,
    FraudDetected,
}

impl DeclineCode {
    pub const ALL: [DeclineCode; 5] = [
        DeclineCode::InsufficientFunds,
        DeclineCode::CardDeclined,
        DeclineCode::InvalidCard,
        DeclineCode::NetworkError,
        DeclineCode::FraudDetected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeclineCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            DeclineCode::CardDeclined => "CARD_DECLINED",
            DeclineCode::InvalidCard => "INVALID_CARD",
            DeclineCode::NetworkError => "NETWORK_ERROR",
            DeclineCode::FraudDetected => "FRAUD_DETECTED",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DeclineCode::InsufficientFunds => "Insufficient funds",
            DeclineCode::CardDeclined => "Card declined by issuer",
            DeclineCode::InvalidCard => "Invalid card details",
            DeclineCode::NetworkError => "Network timeout",
            DeclineCode::FraudDetected => "Transaction flagged as potentially fraudulent",
        }
    }
}

impl std::fmt::Display for DeclineCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ApprovedPayment {
    pub transaction_id: String,
    pub fee: Money,
    /// The raw gateway document, recorded verbatim on the payment.
    pub response: Value,
}

#[derive(Debug, Clone)]
pub struct DeclinedPayment {
    pub error_code: DeclineCode,
    pub message: String,
    pub response: Value,
}

/// The declared result of a `process` call. Both arms are ordinary business outcomes; callers
/// must handle each.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Approved(ApprovedPayment),
    Declined(DeclinedPayment),
}

//--------------------------------------    Refund outcomes   -------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RefundConfirmation {
    pub refund_id: String,
    pub response: Value,
}

#[derive(Debug, Clone)]
pub enum RefundOutcome {
    Refunded(RefundConfirmation),
    /// A declared refusal. Real gateways can decline refunds; callers must treat this as a clean
    /// no-op and leave all state untouched.
    Declined { message: String },
}

//--------------------------------------   PaymentGateway     -------------------------------------------------------

/// The contract every payment processor adapter satisfies.
///
/// `process` and `refund` are synchronous from the caller's point of view: they return only once
/// the gateway has produced a declared outcome. Both can take real-world time (the simulated
/// adapter sleeps for a bounded random latency window); callers are expected to bound them with a
/// timeout.
#[async_trait]
pub trait PaymentGateway: Send + Sync + Debug {
    async fn process(
        &self,
        amount: Money,
        method: PaymentMethod,
        card: Option<&CardDetails>,
    ) -> Result<ProcessOutcome, GatewayError>;

    async fn refund(&self, transaction_id: &str, amount: Option<Money>) -> Result<RefundOutcome, GatewayError>;

    /// Look up a previously processed transaction.
    async fn verify(&self, transaction_id: &str) -> Result<Value, GatewayError>;
}

//--------------------------------------   GatewayRegistry    -------------------------------------------------------

/// Static mapping from payment method to adapter instance. Call sites resolve adapters only
/// through the registry, so new methods slot in without touching the flows.
#[derive(Debug, Clone, Default)]
pub struct GatewayRegistry {
    adapters: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard simulated setup: one fake adapter instance per supported method, mirroring a
    /// deployment where each method has its own processor.
    pub fn simulated() -> Self {
        Self::new()
            .with_adapter(PaymentMethod::Payme, Arc::new(FakeGateway::default()))
            .with_adapter(PaymentMethod::Click, Arc::new(FakeGateway::default()))
            .with_adapter(PaymentMethod::Card, Arc::new(FakeGateway::default()))
    }

    /// Route every method to the same adapter. Handy for tests that pin gateway outcomes.
    pub fn pinned(adapter: Arc<dyn PaymentGateway>) -> Self {
        Self::new()
            .with_adapter(PaymentMethod::Payme, Arc::clone(&adapter))
            .with_adapter(PaymentMethod::Click, Arc::clone(&adapter))
            .with_adapter(PaymentMethod::Card, adapter)
    }

    pub fn with_adapter(mut self, method: PaymentMethod, adapter: Arc<dyn PaymentGateway>) -> Self {
        self.adapters.insert(method, adapter);
        self
    }

    pub fn get(&self, method: PaymentMethod) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
        self.adapters.get(&method).cloned().ok_or(GatewayError::UnsupportedMethod(method))
    }
}
