pub mod db;

pub mod orders;
pub mod payments;
pub mod services;
pub mod users;

use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::traits::StorageError;

const SQLITE_DB_URL: &str = "sqlite://data/marketplace.db";

pub fn db_url() -> String {
    let result = env::var("SMP_DATABASE_URL").unwrap_or_else(|_| {
        info!("SMP_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, StorageError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Apply the embedded schema. Every statement is `IF NOT EXISTS`, so this is safe to run on an
/// existing database.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::raw_sql(include_str!("schema.sql")).execute(pool).await?;
    Ok(())
}
