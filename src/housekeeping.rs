use crate::db::SubmissionStore;
use crate::error::StorageError;
use crate::models::SubmissionStatus;

/// Drop `sent` records created before `cutoff` (epoch ms) from storage.
///
/// Runs against storage only, before the queue is loaded; the sync engine
/// itself never deletes anything.
pub async fn purge_sent(store: &SubmissionStore, cutoff: i64) -> Result<usize, StorageError> {
    store.initialize().await?;

    let mut purged = 0;
    for item in store.list().await? {
        if item.status == SubmissionStatus::Sent && item.timestamp < cutoff {
            store.delete(&item.id).await?;
            purged += 1;
        }
    }

    if purged > 0 {
        tracing::info!("Purged {purged} delivered submission(s)");
    }
    Ok(purged)
}
