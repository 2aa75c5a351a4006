use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{Payment, PaymentId, PaymentMethod, PaymentStatus},
    traits::StorageError,
};

const PAYMENT_COLUMNS: &str = "id, order_id, user_id, amount, currency, payment_method, status, \
                               gateway_transaction_id, gateway_response, created_at, updated_at, processed_at";

/// Check-and-create for the one payment an order may ever have. The pending-order check and the
/// insert are a single statement, and the UNIQUE constraint on `order_id` resolves the remaining
/// race: of two concurrent callers, exactly one insert succeeds.
pub async fn guarded_insert(
    order_id: i64,
    user_id: i64,
    method: PaymentMethod,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<Payment, StorageError> {
    let id = PaymentId::random();
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO payments (id, order_id, user_id, amount, currency, payment_method, status, created_at, \
         updated_at) \
         SELECT $1, o.id, $3, o.total_price, $4, $5, 'pending', $6, $6 FROM orders o \
         WHERE o.id = $2 AND o.status = 'pending'",
    )
    .bind(&id)
    .bind(order_id)
    .bind(user_id)
    .bind(currency)
    .bind(method)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::DuplicatePayment(order_id),
        _ => StorageError::from(e),
    })?;
    if result.rows_affected() == 0 {
        // Nothing inserted: the order is missing or no longer payable.
        return match super::orders::fetch_order(order_id, conn).await? {
            None => Err(StorageError::OrderNotFound(order_id)),
            Some(order) => Err(StorageError::OrderNotPayable(order.status)),
        };
    }
    debug!("🗃️💳️ Payment {id} created for order #{order_id}");
    fetch_payment(&id, conn).await?.ok_or(StorageError::PaymentNotFound(id.to_string()))
}

pub async fn fetch_payment(id: &PaymentId, conn: &mut SqliteConnection) -> Result<Option<Payment>, StorageError> {
    let payment = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(payment)
}

pub async fn fetch_payment_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, StorageError> {
    let payment =
        sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"))
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(payment)
}

/// Write a payment's terminal state after the gateway call has resolved.
pub async fn finalize(
    id: &PaymentId,
    status: PaymentStatus,
    transaction_id: Option<&str>,
    response: Option<&Value>,
    processed_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<(), StorageError> {
    let result = sqlx::query(
        "UPDATE payments SET status = $2, gateway_transaction_id = $3, gateway_response = $4, processed_at = $5, \
         updated_at = $6 WHERE id = $1",
    )
    .bind(id)
    .bind(status)
    .bind(transaction_id)
    .bind(response.map(|r| Json(r.clone())))
    .bind(processed_at)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::PaymentNotFound(id.to_string()));
    }
    Ok(())
}

/// Compare-and-set `completed` → `refunded`. Returns false when the guard did not match, i.e. the
/// payment is not (any longer) completed.
pub async fn mark_refunded(id: &PaymentId, conn: &mut SqliteConnection) -> Result<bool, StorageError> {
    let result = sqlx::query("UPDATE payments SET status = 'refunded', updated_at = $2 WHERE id = $1 AND status = 'completed'")
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Merge the refund document into the stored gateway response under `refund_data`.
pub async fn merge_refund_data(id: &PaymentId, refund_data: Value, conn: &mut SqliteConnection) -> Result<(), StorageError> {
    let current: Option<(Option<Json<Value>>,)> =
        sqlx::query_as("SELECT gateway_response FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    let mut merged = match current {
        Some((Some(Json(Value::Object(map))),)) => map,
        Some(_) => serde_json::Map::new(),
        None => return Err(StorageError::PaymentNotFound(id.to_string())),
    };
    merged.insert("refund_data".to_string(), refund_data);
    sqlx::query("UPDATE payments SET gateway_response = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(Json(Value::Object(merged)))
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}
