pub mod local;
pub mod sqlite;
pub mod submissions;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::models::SubmissionRecord;

pub use local::LocalBackend;
pub use sqlite::SqliteBackend;
pub use submissions::SubmissionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Single JSON blob in a local key-value file.
    Local,
    /// Embedded SQLite table keyed by id.
    Sqlite,
}

impl StorageKind {
    /// Capability check made once at startup.
    pub fn detect(config: &StorageConfig) -> Self {
        if config.database_url.is_some() {
            StorageKind::Sqlite
        } else {
            StorageKind::Local
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::Sqlite => "sqlite",
        }
    }
}

/// Durable, id-keyed persistence for queue records.
///
/// Both implementations return `list_all` newest first (ties broken by id),
/// replace on repeated `upsert`, and treat deleting a missing id as success.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> StorageKind;
    async fn initialize(&self) -> Result<(), StorageError>;
    async fn list_all(&self) -> Result<Vec<SubmissionRecord>, StorageError>;
    async fn upsert(&self, record: &SubmissionRecord) -> Result<(), StorageError>;
    async fn delete_by_id(&self, id: &str) -> Result<(), StorageError>;
}

pub fn select_backend(config: &StorageConfig) -> Arc<dyn StorageBackend> {
    match StorageKind::detect(config) {
        StorageKind::Sqlite => {
            let url = config.database_url.clone().unwrap_or_default();
            Arc::new(SqliteBackend::new(url))
        }
        StorageKind::Local => Arc::new(LocalBackend::new(config.local_path.clone())),
    }
}
