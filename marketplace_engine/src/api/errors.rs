use thiserror::Error;

use crate::{
    authz::PermissionDenied,
    db_types::{OrderStatusType, PaymentStatus},
    gateway::GatewayError,
    traits::StorageError,
};

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Permission(#[from] PermissionDenied),
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Order #{0} not found")]
    NotFound(i64),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<StorageError> for OrderFlowError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::OrderNotFound(id) => Self::NotFound(id),
            StorageError::OrderAlreadyAssigned(_) => Self::Conflict("Order already assigned".to_string()),
            StorageError::OrderNotAwaitingAssignment(status) => {
                Self::Conflict(format!("Order must be paid before it can be accepted (currently {status})"))
            },
            e => Self::Database(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum PaymentFlowError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Permission(#[from] PermissionDenied),
    #[error("Only completed payments can be refunded (currently {0})")]
    InvalidState(PaymentStatus),
    #[error("Refund declined by the gateway: {0}")]
    RefundDeclined(String),
    #[error("Order #{0} not found")]
    OrderNotFound(i64),
    #[error("Payment {0} not found")]
    PaymentNotFound(String),
    /// The adapter produced no declared outcome at all (timeout, transport fault, missing
    /// adapter). On the initiate path the payment/order have already been marked
    /// failed/canceled when this surfaces.
    #[error("Payment processing failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<StorageError> for PaymentFlowError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::OrderNotPayable(status) => {
                Self::Conflict(format!("Order is not in pending status (currently {status})"))
            },
            StorageError::DuplicatePayment(order_id) => {
                Self::Conflict(format!("Payment already exists for order #{order_id}"))
            },
            StorageError::PaymentNotRefundable(status) => Self::InvalidState(status),
            StorageError::OrderNotFound(id) => Self::OrderNotFound(id),
            StorageError::PaymentNotFound(id) => Self::PaymentNotFound(id),
            e => Self::Database(e.to_string()),
        }
    }
}
