use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smp_common::Money;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        Role        ---------------------------------------------------------
/// The capability a user holds on the platform. Every user has exactly one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Posts orders and pays for them.
    Client,
    /// Accepts and fulfils paid orders matching their specializations.
    Worker,
    /// Back-office. May refund on behalf of users and override status transitions.
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Worker => write!(f, "worker"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "worker" => Ok(Self::Worker),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------        User        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      Service       ---------------------------------------------------------
/// A service offered on the marketplace. Only the fields the order and assignment flows read are
/// modelled here; catalogue management lives elsewhere.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub base_price: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   OrderStatusType  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Newly created, awaiting payment.
    Pending,
    /// Payment has completed; the order can be picked up by a worker.
    Paid,
    /// A worker has been assigned and is fulfilling the order.
    InProgress,
    /// The work is done.
    Completed,
    /// Payment failed, the payment was refunded, or the order was called off.
    Canceled,
}

impl OrderStatusType {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatusType::Completed | OrderStatusType::Canceled)
    }

    /// The allowed-transition table for order statuses:
    ///
    /// | From \ To   | Pending | Paid | InProgress | Completed | Canceled |
    /// |-------------|---------|------|------------|-----------|----------|
    /// | Pending     |  -      | ok   | -          | -         | ok       |
    /// | Paid        |  -      | -    | ok         | -         | ok       |
    /// | InProgress  |  -      | -    | -          | ok        | ok       |
    /// | Completed   |  -      | -    | -          | -         | -        |
    /// | Canceled    |  -      | -    | -          | -         | -        |
    ///
    /// Admins may move an order outside this table; everyone else may not.
    pub fn can_transition_to(self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        match (self, next) {
            (Pending, Paid) => true,
            (Paid, InProgress) => true,
            (InProgress, Completed) => true,
            (from, Canceled) => !from.is_terminal(),
            (_, _) => false,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Paid => write!(f, "paid"),
            OrderStatusType::InProgress => write!(f, "in_progress"),
            OrderStatusType::Completed => write!(f, "completed"),
            OrderStatusType::Canceled => write!(f, "canceled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "canceled" => Ok(Self::Canceled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub client_id: i64,
    pub worker_id: Option<i64>,
    pub service_id: i64,
    pub description: String,
    pub address: String,
    pub scheduled_date: DateTime<Utc>,
    pub quantity: i64,
    pub total_price: Money,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

//--------------------------------------      NewOrder      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// The client placing the order.
    pub client_id: i64,
    /// The service being ordered.
    pub service_id: i64,
    pub quantity: i64,
    pub description: String,
    pub address: String,
    pub scheduled_date: DateTime<Utc>,
    /// When `None`, the total is computed as `service.base_price * quantity` at save time. Once
    /// saved, the total never changes.
    pub total_price: Option<Money>,
}

impl NewOrder {
    pub fn new(client_id: i64, service_id: i64, quantity: i64) -> Self {
        Self {
            client_id,
            service_id,
            quantity,
            description: String::default(),
            address: String::default(),
            scheduled_date: Utc::now(),
            total_price: None,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_address<S: Into<String>>(mut self, address: S) -> Self {
        self.address = address.into();
        self
    }

    pub fn scheduled_for(mut self, when: DateTime<Utc>) -> Self {
        self.scheduled_date = when;
        self
    }

    pub fn with_total_price(mut self, total: Money) -> Self {
        self.total_price = Some(total);
        self
    }
}

//--------------------------------------  OrderStatusEntry  ---------------------------------------------------------
/// One row of the append-only order audit trail. Entries are written whenever an order changes
/// status through the assignment or status-update flows, and are never updated or deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderStatusEntry {
    pub id: i64,
    pub order_id: i64,
    pub status: OrderStatusType,
    pub comment: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     PaymentId      ---------------------------------------------------------
/// Opaque unique payment identifier, distinct from the numeric order id. UUID-shaped and stored as
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PaymentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for PaymentId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------   PaymentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Created, gateway call not yet resolved.
    Pending,
    /// Submitted to the gateway. Not observable in practice since the gateway call blocks the
    /// initiating request, but part of the status vocabulary.
    Processing,
    Completed,
    Failed,
    Canceled,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Processing => write!(f, "processing"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Canceled => write!(f, "canceled"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------   PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Payme,
    Click,
    Card,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Payme => write!(f, "payme"),
            PaymentMethod::Click => write!(f, "click"),
            PaymentMethod::Card => write!(f, "card"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payme" => Ok(Self::Payme),
            "click" => Ok(Self::Click),
            "card" => Ok(Self::Card),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------      Payment       ---------------------------------------------------------
/// The financial transaction record attached 1:1 to an order. The amount is copied from the
/// order's total at creation and never supplied independently. Status transitions are driven only
/// by the payment flow; nothing else writes this table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: i64,
    pub user_id: i64,
    pub amount: Money,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway_transaction_id: Option<String>,
    pub gateway_response: Option<Json<serde_json::Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn gateway_response_value(&self) -> Option<&serde_json::Value> {
        self.gateway_response.as_ref().map(|j| &j.0)
    }
}

//--------------------------------------    CardDetails     ---------------------------------------------------------
/// Card data supplied with a `card` payment. All four fields are required before the gateway is
/// ever contacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub card_number: String,
    pub card_expiry: String,
    pub card_cvv: String,
    pub card_holder_name: String,
}

impl CardDetails {
    /// The first missing (empty) field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.card_number.trim().is_empty() {
            Some("card_number")
        } else if self.card_expiry.trim().is_empty() {
            Some("card_expiry")
        } else if self.card_cvv.trim().is_empty() {
            Some("card_cvv")
        } else if self.card_holder_name.trim().is_empty() {
            Some("card_holder_name")
        } else {
            None
        }
    }
}
