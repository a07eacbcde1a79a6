use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use crate::repository::{KeyValueStore, ReplaceFn, StorageError};

use super::SqliteRepository;

fn connection_error(err: sqlx::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

async fn read_value(conn: &mut SqliteConnection, key: &str) -> Result<Option<String>, StorageError> {
    let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(connection_error)?;
    row.map(|row| row.try_get::<String, _>("value"))
        .transpose()
        .map_err(|err| StorageError::Serialization(err.to_string()))
}

async fn write_value(conn: &mut SqliteConnection, key: &str, value: &str) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO kv_store (key, value, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        ",
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(connection_error)?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for SqliteRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(connection_error)?;
        read_value(&mut conn, key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(connection_error)?;
        write_value(&mut conn, key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(connection_error)?;
        Ok(())
    }

    async fn replace_with(&self, key: &str, f: ReplaceFn) -> Result<String, StorageError> {
        // IMMEDIATE takes the write lock up front so two writers cannot both
        // read the same value before either commits. Dropping `tx` before
        // commit rolls back.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(connection_error)?;

        let current = read_value(&mut *tx, key).await?;
        let next = f(current);
        write_value(&mut *tx, key, &next).await?;

        tx.commit().await.map_err(connection_error)?;
        tracing::debug!(key, value = next.as_str(), "replaced");
        Ok(next)
    }
}
