use std::sync::Arc;

use super::{StorageBackend, StorageKind};
use crate::error::StorageError;
use crate::models::{Submission, SubmissionRecord, SubmissionStatus};

/// Typed access to the storage backend. Owns payload (de)serialization.
#[derive(Clone)]
pub struct SubmissionStore {
    backend: Arc<dyn StorageBackend>,
}

impl SubmissionStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn kind(&self) -> StorageKind {
        self.backend.kind()
    }

    pub async fn initialize(&self) -> Result<(), StorageError> {
        self.backend.initialize().await
    }

    /// All submissions, newest first. Records that no longer decode are skipped.
    pub async fn list(&self) -> Result<Vec<Submission>, StorageError> {
        let records = self.backend.list_all().await?;
        let mut submissions = Vec::with_capacity(records.len());
        for record in records {
            match decode(record) {
                Ok(submission) => submissions.push(submission),
                Err((id, e)) => tracing::warn!("Skipping unreadable submission {id}: {e}"),
            }
        }
        Ok(submissions)
    }

    pub async fn add_or_update(&self, submission: &Submission) -> Result<(), StorageError> {
        let record = encode(submission)?;
        self.backend.upsert(&record).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.backend.delete_by_id(id).await
    }
}

pub fn encode(submission: &Submission) -> Result<SubmissionRecord, StorageError> {
    Ok(SubmissionRecord {
        id: submission.id.clone(),
        form_data: serde_json::to_string(&submission.form_data)?,
        status: submission.status.as_str().to_string(),
        attempts: i64::from(submission.attempts),
        timestamp: submission.timestamp,
        next_attempt_at: submission.next_attempt_at,
    })
}

pub fn decode(record: SubmissionRecord) -> Result<Submission, (String, String)> {
    let form_data = serde_json::from_str(&record.form_data)
        .map_err(|e| (record.id.clone(), format!("invalid form data: {e}")))?;
    let status = SubmissionStatus::parse(&record.status)
        .ok_or_else(|| (record.id.clone(), format!("unknown status '{}'", record.status)))?;
    let attempts = u32::try_from(record.attempts)
        .map_err(|_| (record.id.clone(), format!("invalid attempts {}", record.attempts)))?;

    Ok(Submission {
        id: record.id,
        form_data,
        status,
        attempts,
        timestamp: record.timestamp,
        next_attempt_at: record.next_attempt_at,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::LocalBackend;
    use crate::models::FormData;

    fn form(location: &str) -> FormData {
        let mut form_data = FormData::new();
        form_data.insert("location".to_string(), json!(location));
        form_data.insert("issueType".to_string(), json!("plumbing"));
        form_data.insert("description".to_string(), json!("Leak under sink\nsecond line"));
        form_data.insert("floor".to_string(), json!(3));
        form_data
    }

    #[test]
    fn payload_survives_encode_and_decode() {
        let mut submission = Submission::new(form("Kitchen"), 1_700_000_000_000);
        submission.attempts = 3;
        submission.next_attempt_at = Some(1_700_000_004_000);

        let record = encode(&submission).unwrap();
        assert_eq!(record.status, "pending");
        assert_eq!(decode(record).unwrap(), submission);
    }

    #[test]
    fn decode_rejects_unknown_status() {
        let mut record = encode(&Submission::new(form("Kitchen"), 1)).unwrap();
        record.status = "queued".to_string();
        let (id, _) = decode(record.clone()).unwrap_err();
        assert_eq!(id, record.id);
    }

    #[tokio::test]
    async fn store_lists_newest_first_and_skips_unreadable_records() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalBackend::new(dir.path().join("queue.json")));
        backend.initialize().await.unwrap();

        let mut broken = encode(&Submission::new(form("Attic"), 5)).unwrap();
        broken.form_data = "not json".to_string();
        backend.upsert(&broken).await.unwrap();

        let store = SubmissionStore::new(backend);
        let older = Submission::new(form("Basement"), 1);
        let newer = Submission::new(form("Roof"), 2);
        store.add_or_update(&older).await.unwrap();
        store.add_or_update(&newer).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![newer, older]);
    }
}
