use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde_json::Value;
use smp_common::Money;
use sqlx::SqlitePool;

use crate::{
    db_types::{
        NewOrder,
        Order,
        OrderStatusEntry,
        OrderStatusType,
        Payment,
        PaymentId,
        PaymentMethod,
        PaymentStatus,
        Role,
        Service,
        User,
    },
    sqlite::{create_schema, new_pool, orders, payments, services, users},
    traits::{MarketplaceDatabase, PaymentFinalization, StorageError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connect to the database at `url`, creating the schema if needed.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = new_pool(url, max_connections).await?;
        create_schema(&pool).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_user(&self, username: &str, role: Role) -> Result<User, StorageError> {
        let mut conn = self.pool.acquire().await?;
        users::insert_user(username, role, &mut conn).await
    }

    async fn fetch_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user(id, &mut conn).await
    }

    async fn insert_service(&self, name: &str, base_price: Money) -> Result<Service, StorageError> {
        let mut conn = self.pool.acquire().await?;
        services::insert_service(name, base_price, &mut conn).await
    }

    async fn fetch_service(&self, id: i64) -> Result<Option<Service>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        services::fetch_service(id, &mut conn).await
    }

    async fn set_service_active(&self, id: i64, active: bool) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        services::set_service_active(id, active, &mut conn).await
    }

    async fn add_specialization(&self, worker_id: i64, service_id: i64) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        users::add_specialization(worker_id, service_id, &mut conn).await
    }

    async fn has_specialization(&self, worker_id: i64, service_id: i64) -> Result<bool, StorageError> {
        let mut conn = self.pool.acquire().await?;
        users::has_specialization(worker_id, service_id, &mut conn).await
    }

    async fn insert_order(&self, order: NewOrder, total_price: Money) -> Result<Order, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, total_price, &mut conn).await
    }

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(id, &mut conn).await
    }

    async fn fetch_order_status_history(&self, order_id: i64) -> Result<Vec<OrderStatusEntry>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_status_history(order_id, &mut conn).await
    }

    async fn create_payment_for_order(
        &self,
        order_id: i64,
        user_id: i64,
        method: PaymentMethod,
        currency: &str,
    ) -> Result<Payment, StorageError> {
        let mut conn = self.pool.acquire().await?;
        payments::guarded_insert(order_id, user_id, method, currency, &mut conn).await
    }

    async fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(id, &mut conn).await
    }

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_for_order(order_id, &mut conn).await
    }

    async fn finalize_payment(&self, id: &PaymentId, outcome: PaymentFinalization) -> Result<(Payment, Order), StorageError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let order_status = match &outcome {
            PaymentFinalization::Completed { transaction_id, response } => {
                payments::finalize(id, PaymentStatus::Completed, Some(transaction_id), Some(response), Some(now), &mut tx)
                    .await?;
                OrderStatusType::Paid
            },
            PaymentFinalization::Failed { response } => {
                payments::finalize(id, PaymentStatus::Failed, None, response.as_ref(), None, &mut tx).await?;
                OrderStatusType::Canceled
            },
        };
        let payment = payments::fetch_payment(id, &mut tx).await?.ok_or(StorageError::PaymentNotFound(id.to_string()))?;
        orders::set_order_status(payment.order_id, order_status, now, &mut tx).await?;
        let order = orders::fetch_order(payment.order_id, &mut tx)
            .await?
            .ok_or(StorageError::OrderNotFound(payment.order_id))?;
        tx.commit().await?;
        debug!("🗃️💳️ Payment {id} finalized as {}; order #{} is now {}", payment.status, order.id, order.status);
        Ok((payment, order))
    }

    async fn refund_payment(&self, id: &PaymentId, refund_data: Value) -> Result<(Payment, Order), StorageError> {
        let mut tx = self.pool.begin().await?;
        // Compare-and-set first: of two concurrent refunds, the loser's guard matches no rows
        // and nothing it did needs rolling back.
        if !payments::mark_refunded(id, &mut tx).await? {
            let status = payments::fetch_payment(id, &mut tx)
                .await?
                .map(|p| p.status)
                .ok_or(StorageError::PaymentNotFound(id.to_string()))?;
            tx.rollback().await?;
            return Err(StorageError::PaymentNotRefundable(status));
        }
        payments::merge_refund_data(id, refund_data, &mut tx).await?;
        let payment = payments::fetch_payment(id, &mut tx).await?.ok_or(StorageError::PaymentNotFound(id.to_string()))?;
        orders::set_order_status(payment.order_id, OrderStatusType::Canceled, Utc::now(), &mut tx).await?;
        let order = orders::fetch_order(payment.order_id, &mut tx)
            .await?
            .ok_or(StorageError::OrderNotFound(payment.order_id))?;
        tx.commit().await?;
        debug!("🗃️💳️ Payment {id} refunded; order #{} canceled", order.id);
        Ok((payment, order))
    }

    async fn assign_worker(&self, order_id: i64, worker: &User, comment: &str) -> Result<Order, StorageError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        if !orders::claim_order(order_id, worker.id, now, &mut tx).await? {
            let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(StorageError::OrderNotFound(order_id))?;
            tx.rollback().await?;
            return if order.worker_id.is_some() {
                Err(StorageError::OrderAlreadyAssigned(order_id))
            } else {
                Err(StorageError::OrderNotAwaitingAssignment(order.status))
            };
        }
        orders::insert_status_entry(order_id, OrderStatusType::InProgress, comment, worker.id, &mut tx).await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(StorageError::OrderNotFound(order_id))?;
        tx.commit().await?;
        debug!("🗃️📦️ Order #{order_id} claimed by worker #{}", worker.id);
        Ok(order)
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        comment: &str,
        updated_by: i64,
    ) -> Result<Order, StorageError> {
        let mut tx = self.pool.begin().await?;
        orders::set_order_status(order_id, new_status, Utc::now(), &mut tx).await?;
        orders::insert_status_entry(order_id, new_status, comment, updated_by, &mut tx).await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(StorageError::OrderNotFound(order_id))?;
        tx.commit().await?;
        Ok(order)
    }
}
