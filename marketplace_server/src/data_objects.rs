use chrono::{DateTime, Utc};
use marketplace_engine::{
    db_types::{CardDetails, NewOrder, OrderStatusType, PaymentMethod},
    PaymentRequest,
};
use serde::Deserialize;

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderPayload {
    pub service_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    pub scheduled_date: Option<DateTime<Utc>>,
}

impl NewOrderPayload {
    pub fn into_new_order(self, client_id: i64) -> NewOrder {
        let mut order = NewOrder::new(client_id, self.service_id, self.quantity)
            .with_description(self.description)
            .with_address(self.address);
        if let Some(when) = self.scheduled_date {
            order = order.scheduled_for(when);
        }
        order
    }
}

/// Card fields arrive flat next to the payment method, matching the public API contract. They are
/// only meaningful for `card` payments; the engine validates completeness.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentPayload {
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub card_expiry: Option<String>,
    #[serde(default)]
    pub card_cvv: Option<String>,
    #[serde(default)]
    pub card_holder_name: Option<String>,
}

impl PaymentPayload {
    pub fn into_payment_request(self) -> PaymentRequest {
        let has_card = self.card_number.is_some() ||
            self.card_expiry.is_some() ||
            self.card_cvv.is_some() ||
            self.card_holder_name.is_some();
        let mut request = PaymentRequest::new(self.payment_method);
        if has_card {
            request = request.with_card(CardDetails {
                card_number: self.card_number.unwrap_or_default(),
                card_expiry: self.card_expiry.unwrap_or_default(),
                card_cvv: self.card_cvv.unwrap_or_default(),
                card_holder_name: self.card_holder_name.unwrap_or_default(),
            });
        }
        request
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdatePayload {
    pub status: OrderStatusType,
    #[serde(default)]
    pub comment: String,
}
