use serde_json::Value;
use smp_common::Money;
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderStatusEntry, OrderStatusType, Payment, PaymentId, PaymentMethod, PaymentStatus, Role, Service, User},
    traits::PaymentFinalization,
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Order #{0} not found")]
    OrderNotFound(i64),
    #[error("Payment {0} not found")]
    PaymentNotFound(String),
    #[error("User #{0} not found")]
    UserNotFound(i64),
    #[error("Service #{0} not found")]
    ServiceNotFound(i64),
    #[error("Order is not in pending status (currently {0})")]
    OrderNotPayable(OrderStatusType),
    #[error("Payment already exists for order #{0}")]
    DuplicatePayment(i64),
    #[error("Only completed payments can be refunded (currently {0})")]
    PaymentNotRefundable(PaymentStatus),
    #[error("Order #{0} is already assigned")]
    OrderAlreadyAssigned(i64),
    #[error("Order must be paid before it can be accepted (currently {0})")]
    OrderNotAwaitingAssignment(OrderStatusType),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage contract for the marketplace engine. Backends implement the relational constraints the
/// flows rely on (the 1:1 Order↔Payment relation, the append-only audit trail, foreign-key
/// integrity) and every exclusivity-sensitive mutation (payment creation, refund, assignment)
/// with check-and-act semantics so concurrent callers race on the database, not in memory.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    async fn insert_user(&self, username: &str, role: Role) -> Result<User, StorageError>;
    async fn fetch_user(&self, id: i64) -> Result<Option<User>, StorageError>;

    async fn insert_service(&self, name: &str, base_price: Money) -> Result<Service, StorageError>;
    async fn fetch_service(&self, id: i64) -> Result<Option<Service>, StorageError>;
    async fn set_service_active(&self, id: i64, active: bool) -> Result<(), StorageError>;

    /// Register `worker_id` as specialized in `service_id`. Idempotent.
    async fn add_specialization(&self, worker_id: i64, service_id: i64) -> Result<(), StorageError>;
    async fn has_specialization(&self, worker_id: i64, service_id: i64) -> Result<bool, StorageError>;

    /// Store a new order with the given (already computed) total. The total never changes after
    /// this call.
    async fn insert_order(&self, order: NewOrder, total_price: Money) -> Result<Order, StorageError>;
    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, StorageError>;
    /// The append-only audit trail for an order, oldest entry first.
    async fn fetch_order_status_history(&self, order_id: i64) -> Result<Vec<OrderStatusEntry>, StorageError>;

    /// Atomically create the payment record for a still-pending order, copying the amount from
    /// the order's total. The check and the insert are a single statement, so two concurrent
    /// callers cannot both succeed:
    /// * the order no longer being `pending` fails with [`StorageError::OrderNotPayable`]
    ///   (or [`StorageError::OrderNotFound`]),
    /// * an existing payment for the order fails with [`StorageError::DuplicatePayment`]
    ///   regardless of that payment's status.
    async fn create_payment_for_order(
        &self,
        order_id: i64,
        user_id: i64,
        method: PaymentMethod,
        currency: &str,
    ) -> Result<Payment, StorageError>;

    async fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, StorageError>;
    /// The payment attached to an order, if one was ever created.
    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, StorageError>;

    /// Move a pending payment to its terminal state and transition the owning order (`paid` on
    /// success, `canceled` on failure) in one transaction. Returns the updated pair.
    async fn finalize_payment(&self, id: &PaymentId, outcome: PaymentFinalization) -> Result<(Payment, Order), StorageError>;

    /// Compare-and-set transition `completed` → `refunded`. The refund document is merged into
    /// the stored gateway response under `refund_data` and the owning order is canceled, all in
    /// one transaction. A payment that is not (any longer) `completed` fails with
    /// [`StorageError::PaymentNotRefundable`]; at most one concurrent caller can succeed.
    async fn refund_payment(&self, id: &PaymentId, refund_data: Value) -> Result<(Payment, Order), StorageError>;

    /// Claim a paid, unassigned order for `worker` and move it to `in_progress`, appending an
    /// audit entry. Guarded so that of two concurrent workers exactly one wins; the loser fails
    /// with [`StorageError::OrderAlreadyAssigned`].
    async fn assign_worker(&self, order_id: i64, worker: &User, comment: &str) -> Result<Order, StorageError>;

    /// Set an order's status as given (legality is the caller's concern), append an audit entry,
    /// and stamp `completed_at` when entering `completed`.
    async fn update_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        comment: &str,
        updated_by: i64,
    ) -> Result<Order, StorageError>;
}
