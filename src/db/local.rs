use std::cmp::Reverse;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{StorageBackend, StorageKind};
use crate::error::StorageError;
use crate::models::SubmissionRecord;

/// Local key-value storage: the whole queue is one JSON blob in a file.
///
/// The blob is read once by `initialize`; every mutation rewrites the full set
/// through a temp file and a rename, and only then updates the cached copy.
pub struct LocalBackend {
    path: PathBuf,
    records: Mutex<Option<Vec<SubmissionRecord>>>,
}

impl LocalBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Mutex::new(None),
        }
    }

    async fn persist(&self, records: &[SubmissionRecord]) -> Result<(), StorageError> {
        let blob = serde_json::to_vec(records)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, blob).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn read_blob(&self) -> Vec<SubmissionRecord> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read queue blob {}: {e}", self.path.display());
                return Vec::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    "Queue blob {} is corrupt, starting empty: {e}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        let mut guard = self.records.lock().await;
        if guard.is_none() {
            let records = self.read_blob().await;
            tracing::info!(
                "Local storage ready at {} ({} records)",
                self.path.display(),
                records.len()
            );
            *guard = Some(records);
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<SubmissionRecord>, StorageError> {
        let guard = self.records.lock().await;
        let mut records = guard.as_ref().ok_or(StorageError::NotInitialized)?.clone();
        records.sort_by(|a, b| {
            Reverse(a.timestamp)
                .cmp(&Reverse(b.timestamp))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    async fn upsert(&self, record: &SubmissionRecord) -> Result<(), StorageError> {
        let mut guard = self.records.lock().await;
        let current = guard.as_ref().ok_or(StorageError::NotInitialized)?;

        let mut next = current.clone();
        match next.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => next.insert(0, record.clone()),
        }

        self.persist(&next).await?;
        *guard = Some(next);
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StorageError> {
        let mut guard = self.records.lock().await;
        let current = guard.as_ref().ok_or(StorageError::NotInitialized)?;
        if !current.iter().any(|r| r.id == id) {
            return Ok(());
        }

        let next: Vec<SubmissionRecord> = current.iter().filter(|r| r.id != id).cloned().collect();
        self.persist(&next).await?;
        *guard = Some(next);
        Ok(())
    }
}
