use std::fmt::Debug;

use log::*;
use serde::Serialize;
use serde_json::Value;
use smp_common::USD_CURRENCY_CODE;
use tokio::time::{timeout, Duration};

use crate::{
    api::errors::PaymentFlowError,
    authz::{self, Actor},
    db_types::{CardDetails, Order, OrderStatusType, Payment, PaymentId, PaymentMethod, PaymentStatus},
    events::{EventProducers, GroupKey, NotificationEvent},
    gateway::{GatewayError, GatewayRegistry, ProcessOutcome, RefundOutcome},
    traits::{MarketplaceDatabase, PaymentFinalization},
};

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// What a client submits to pay for an order.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub card: Option<CardDetails>,
}

impl PaymentRequest {
    pub fn new(method: PaymentMethod) -> Self {
        Self { method, card: None }
    }

    pub fn with_card(mut self, card: CardDetails) -> Self {
        self.card = Some(card);
        self
    }
}

/// The final payment record and the raw gateway document, returned for both approved and
/// declined payments.
#[derive(Debug, Clone, Serialize)]
pub struct InitiateResult {
    pub payment: Payment,
    pub order: Order,
    pub gateway_response: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundResult {
    pub payment: Payment,
    pub order: Order,
    pub refund_response: Value,
}

/// `PaymentFlowApi` owns the payment lifecycle: it is the only component that moves a payment
/// between statuses, and it drives the owning order's status as a side effect.
pub struct PaymentFlowApi<B> {
    db: B,
    gateways: GatewayRegistry,
    gateway_timeout: Duration,
    producers: EventProducers,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, gateways: GatewayRegistry, producers: EventProducers) -> Self {
        Self { db, gateways, gateway_timeout: DEFAULT_GATEWAY_TIMEOUT, producers }
    }

    pub fn with_gateway_timeout(mut self, gateway_timeout: Duration) -> Self {
        self.gateway_timeout = gateway_timeout;
        self
    }
}

impl<B> PaymentFlowApi<B>
where B: MarketplaceDatabase
{
    /// Create and process the payment for a pending order.
    ///
    /// Preconditions are checked before any state is touched: the actor must be the order's
    /// client, card payments must carry complete card details, and the order must be pending
    /// with no existing payment (the storage layer enforces the latter two atomically, so
    /// concurrent calls cannot both create a payment).
    ///
    /// The gateway is invoked synchronously under a bounded timeout. A declared outcome
    /// (approved or declined) resolves to a normal [`InitiateResult`] carrying the final payment
    /// and the raw gateway document:
    /// * approved: payment `completed` (transaction id, response and `processed_at` recorded),
    ///   order `paid`, `payment_success` published to the client's group;
    /// * declined: payment `failed` (response recorded, no transaction id), order `canceled`,
    ///   `payment_failed` published.
    ///
    /// An adapter fault (timeout, transport error) performs the same failed/canceled transition
    /// so the record of what happened stays queryable, but surfaces as
    /// [`PaymentFlowError::Gateway`] so the caller can tell it apart from a declared decline.
    pub async fn initiate(
        &self,
        order_id: i64,
        request: PaymentRequest,
        actor: &Actor,
    ) -> Result<InitiateResult, PaymentFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(PaymentFlowError::OrderNotFound(order_id))?;
        authz::can_initiate_payment(actor, &order)?;
        if request.method == PaymentMethod::Card {
            match &request.card {
                None => {
                    return Err(PaymentFlowError::Validation(
                        "Card details are required for card payments".to_string(),
                    ))
                },
                Some(card) => {
                    if let Some(field) = card.missing_field() {
                        return Err(PaymentFlowError::Validation(format!("{field} is required")));
                    }
                },
            }
        }
        // Fast-fail here; the guarded insert below re-checks atomically.
        if order.status != OrderStatusType::Pending {
            return Err(PaymentFlowError::Conflict(format!(
                "Order is not in pending status (currently {})",
                order.status
            )));
        }
        let payment =
            self.db.create_payment_for_order(order_id, actor.id, request.method, USD_CURRENCY_CODE).await?;
        debug!("🔄️💳️ Payment {} created for order {order_id}; invoking {} gateway", payment.id, request.method);

        let outcome = match self.gateways.get(request.method) {
            Ok(gateway) => {
                match timeout(
                    self.gateway_timeout,
                    gateway.process(payment.amount, request.method, request.card.as_ref()),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::Timeout),
                }
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok(ProcessOutcome::Approved(approved)) => {
                let finalization = PaymentFinalization::Completed {
                    transaction_id: approved.transaction_id,
                    response: approved.response.clone(),
                };
                let (payment, order) = self.db.finalize_payment(&payment.id, finalization).await?;
                info!("🔄️💳️ Payment {} completed; order #{} paid", payment.id, order.id);
                self.producers.notify(GroupKey::user(order.client_id), NotificationEvent::payment_success(&payment)).await;
                Ok(InitiateResult { payment, order, gateway_response: approved.response })
            },
            Ok(ProcessOutcome::Declined(declined)) => {
                let finalization = PaymentFinalization::Failed { response: Some(declined.response.clone()) };
                let (payment, order) = self.db.finalize_payment(&payment.id, finalization).await?;
                info!(
                    "🔄️💳️ Payment {} declined ({}); order #{} canceled",
                    payment.id, declined.error_code, order.id
                );
                self.producers.notify(GroupKey::user(order.client_id), NotificationEvent::payment_failed(&payment)).await;
                Ok(InitiateResult { payment, order, gateway_response: declined.response })
            },
            Err(e) => {
                // No declared outcome. Record the failure anyway so the payment/order never
                // linger in pending state, then report the processing error.
                error!("🔄️💳️ Payment {} processing error: {e}", payment.id);
                let (payment, order) =
                    self.db.finalize_payment(&payment.id, PaymentFinalization::Failed { response: None }).await?;
                self.producers.notify(GroupKey::user(order.client_id), NotificationEvent::payment_failed(&payment)).await;
                Err(PaymentFlowError::Gateway(e))
            },
        }
    }

    /// Refund a completed payment.
    ///
    /// The requester must be the paying user or an admin, and only completed payments are
    /// refundable. On a declared gateway refund the transition `completed` → `refunded` is
    /// compare-and-set, so of two concurrent refunds exactly one succeeds; the other observes
    /// a non-completed status and fails with [`PaymentFlowError::InvalidState`]. The refund
    /// document is merged into the stored gateway response, the owning order is canceled, and a
    /// `payment_refunded` event goes to the payer's group. A declared refund decline mutates
    /// nothing.
    pub async fn refund(&self, payment_id: &PaymentId, actor: &Actor) -> Result<RefundResult, PaymentFlowError> {
        let payment = self
            .db
            .fetch_payment(payment_id)
            .await?
            .ok_or_else(|| PaymentFlowError::PaymentNotFound(payment_id.to_string()))?;
        authz::can_refund(actor, &payment)?;
        if payment.status != PaymentStatus::Completed {
            return Err(PaymentFlowError::InvalidState(payment.status));
        }
        let transaction_id = payment.gateway_transaction_id.clone().ok_or_else(|| {
            PaymentFlowError::Gateway(GatewayError::Internal("Completed payment has no transaction id".to_string()))
        })?;
        let gateway = self.gateways.get(payment.payment_method)?;
        let outcome = match timeout(self.gateway_timeout, gateway.refund(&transaction_id, Some(payment.amount))).await
        {
            Ok(result) => result?,
            Err(_) => return Err(PaymentFlowError::Gateway(GatewayError::Timeout)),
        };
        match outcome {
            RefundOutcome::Refunded(confirmation) => {
                let (payment, order) = self.db.refund_payment(payment_id, confirmation.response.clone()).await?;
                info!("🔄️💳️ Payment {} refunded; order #{} canceled", payment.id, order.id);
                self.producers.notify(GroupKey::user(payment.user_id), NotificationEvent::payment_refunded(&payment)).await;
                Ok(RefundResult { payment, order, refund_response: confirmation.response })
            },
            RefundOutcome::Declined { message } => {
                // Declared refusal: deliberately a no-op, nothing was mutated.
                info!("🔄️💳️ Refund for payment {} declined by gateway: {message}", payment.id);
                Err(PaymentFlowError::RefundDeclined(message))
            },
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
