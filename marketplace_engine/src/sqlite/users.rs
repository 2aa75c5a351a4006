use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Role, User},
    traits::StorageError,
};

pub async fn insert_user(username: &str, role: Role, conn: &mut SqliteConnection) -> Result<User, StorageError> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO users (username, role, created_at) VALUES ($1, $2, $3)")
        .bind(username)
        .bind(role)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(User { id: result.last_insert_rowid(), username: username.to_string(), role, created_at: now })
}

pub async fn fetch_user(id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, StorageError> {
    let user = sqlx::query_as::<_, User>("SELECT id, username, role, created_at FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

pub async fn add_specialization(worker_id: i64, service_id: i64, conn: &mut SqliteConnection) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO worker_specializations (worker_id, service_id) VALUES ($1, $2) \
         ON CONFLICT (worker_id, service_id) DO NOTHING",
    )
    .bind(worker_id)
    .bind(service_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn has_specialization(worker_id: i64, service_id: i64, conn: &mut SqliteConnection) -> Result<bool, StorageError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM worker_specializations WHERE worker_id = $1 AND service_id = $2")
            .bind(worker_id)
            .bind(service_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.is_some())
}
