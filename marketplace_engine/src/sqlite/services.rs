use chrono::Utc;
use smp_common::Money;
use sqlx::SqliteConnection;

use crate::{db_types::Service, traits::StorageError};

pub async fn insert_service(name: &str, base_price: Money, conn: &mut SqliteConnection) -> Result<Service, StorageError> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO services (name, base_price, is_active, created_at) VALUES ($1, $2, 1, $3)")
        .bind(name)
        .bind(base_price)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(Service { id: result.last_insert_rowid(), name: name.to_string(), base_price, is_active: true, created_at: now })
}

pub async fn fetch_service(id: i64, conn: &mut SqliteConnection) -> Result<Option<Service>, StorageError> {
    let service =
        sqlx::query_as::<_, Service>("SELECT id, name, base_price, is_active, created_at FROM services WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(service)
}

pub async fn set_service_active(id: i64, active: bool, conn: &mut SqliteConnection) -> Result<(), StorageError> {
    let result = sqlx::query("UPDATE services SET is_active = $2 WHERE id = $1")
        .bind(id)
        .bind(active)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::ServiceNotFound(id));
    }
    Ok(())
}
