use chrono::{DateTime, Utc};
use log::debug;
use smp_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderStatusEntry, OrderStatusType},
    traits::StorageError,
};

const ORDER_COLUMNS: &str = "id, client_id, worker_id, service_id, description, address, scheduled_date, quantity, \
                             total_price, status, created_at, updated_at, completed_at";

pub async fn insert_order(order: NewOrder, total_price: Money, conn: &mut SqliteConnection) -> Result<Order, StorageError> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO orders (client_id, service_id, description, address, scheduled_date, quantity, total_price, \
         status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $8)",
    )
    .bind(order.client_id)
    .bind(order.service_id)
    .bind(&order.description)
    .bind(&order.address)
    .bind(order.scheduled_date)
    .bind(order.quantity)
    .bind(total_price)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    let id = result.last_insert_rowid();
    debug!("🗃️📦️ Order #{id} saved with total {total_price}");
    Ok(Order {
        id,
        client_id: order.client_id,
        worker_id: None,
        service_id: order.service_id,
        description: order.description,
        address: order.address,
        scheduled_date: order.scheduled_date,
        quantity: order.quantity,
        total_price,
        status: OrderStatusType::Pending,
        created_at: now,
        updated_at: now,
        completed_at: None,
    })
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, StorageError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(order)
}

/// Set an order's status. `completed_at` is stamped when the new status is `completed` and left
/// alone otherwise.
pub async fn set_order_status(
    id: i64,
    status: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), StorageError> {
    let completed_at = (status == OrderStatusType::Completed).then_some(now);
    let result = sqlx::query(
        "UPDATE orders SET status = $2, updated_at = $3, completed_at = COALESCE($4, completed_at) WHERE id = $1",
    )
    .bind(id)
    .bind(status)
    .bind(now)
    .bind(completed_at)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::OrderNotFound(id));
    }
    Ok(())
}

/// Claim a paid, unassigned order for a worker. The guard is part of the statement, so of two
/// concurrent claims exactly one affects a row.
pub async fn claim_order(
    id: i64,
    worker_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "UPDATE orders SET worker_id = $2, status = 'in_progress', updated_at = $3 \
         WHERE id = $1 AND status = 'paid' AND worker_id IS NULL",
    )
    .bind(id)
    .bind(worker_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_status_entry(
    order_id: i64,
    status: OrderStatusType,
    comment: &str,
    created_by: i64,
    conn: &mut SqliteConnection,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO order_status_history (order_id, status, comment, created_by, created_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(order_id)
    .bind(status)
    .bind(comment)
    .bind(created_by)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch_status_history(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderStatusEntry>, StorageError> {
    let entries = sqlx::query_as::<_, OrderStatusEntry>(
        "SELECT id, order_id, status, comment, created_by, created_at FROM order_status_history \
         WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(entries)
}
