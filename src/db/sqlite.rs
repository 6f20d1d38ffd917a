use std::str::FromStr;
use std::sync::OnceLock;

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};

use super::{StorageBackend, StorageKind};
use crate::error::StorageError;
use crate::models::SubmissionRecord;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Embedded SQLite storage. A connection is opened for each operation and
/// closed again on every exit path, so nothing stays open between calls.
/// Use a file-backed URL: `sqlite::memory:` would lose data on every close.
pub struct SqliteBackend {
    database_url: String,
    options: OnceLock<SqliteConnectOptions>,
}

impl SqliteBackend {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            options: OnceLock::new(),
        }
    }

    async fn open(&self) -> Result<SqliteConnection, StorageError> {
        let options = self.options.get().ok_or(StorageError::NotInitialized)?;
        Ok(options.connect().await?)
    }
}

async fn release(conn: SqliteConnection) {
    if let Err(e) = conn.close().await {
        tracing::warn!("Failed to close SQLite connection: {e}");
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::Sqlite
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        if self.options.get().is_some() {
            return Ok(());
        }

        let options = SqliteConnectOptions::from_str(&self.database_url)
            .map_err(|e| StorageError::Init(format!("Invalid database URL: {e}")))?
            .create_if_missing(true);

        let mut conn = options
            .connect()
            .await
            .map_err(|e| StorageError::Init(format!("Failed to open SQLite database: {e}")))?;
        let migrated = MIGRATOR.run_direct(&mut conn).await;
        release(conn).await;
        migrated.map_err(|e| StorageError::Init(format!("Failed to apply schema: {e}")))?;

        let _ = self.options.set(options);
        tracing::info!("SQLite storage ready at {}", self.database_url);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<SubmissionRecord>, StorageError> {
        let mut conn = self.open().await?;
        let result = sqlx::query_as::<_, SubmissionRecord>(
            "SELECT id, formData, status, attempts, timestamp, nextAttemptAt
             FROM submissions
             ORDER BY timestamp DESC, id ASC",
        )
        .fetch_all(&mut conn)
        .await;
        release(conn).await;
        Ok(result?)
    }

    async fn upsert(&self, record: &SubmissionRecord) -> Result<(), StorageError> {
        let mut conn = self.open().await?;
        let result = sqlx::query(
            "INSERT OR REPLACE INTO submissions
                 (id, formData, status, attempts, timestamp, nextAttemptAt)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.form_data)
        .bind(&record.status)
        .bind(record.attempts)
        .bind(record.timestamp)
        .bind(record.next_attempt_at)
        .execute(&mut conn)
        .await;
        release(conn).await;
        result?;
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StorageError> {
        let mut conn = self.open().await?;
        let result = sqlx::query("DELETE FROM submissions WHERE id = ?")
            .bind(id)
            .execute(&mut conn)
            .await;
        release(conn).await;
        result?;
        Ok(())
    }
}
