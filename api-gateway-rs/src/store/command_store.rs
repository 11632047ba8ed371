use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shared_types::{AiProcessingResult, CommandRecord, CommandStatus, COMMAND_QUEUE_KEY};
use tracing::{debug, warn};

use crate::collaborators::{KeyValueStore, StoreError};

/// Command lifecycle records and the FIFO work queue.
///
/// Records live under `command:<id>` for `ttl` after their last write; an
/// expired record reads as absent. The gateway only ever creates `queued`
/// records. The worker-side methods move them through `processing` to
/// `completed` or `failed`.
#[derive(Clone)]
pub struct AsyncCommandStore {
    kv: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl AsyncCommandStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Persists a queued record and appends its id to the work queue. If the
    /// id cannot be queued the record is removed again.
    pub async fn enqueue(&self, record: &CommandRecord) -> Result<(), StoreError> {
        let key = CommandRecord::storage_key(&record.id);
        self.save(record).await?;

        if let Err(err) = self.kv.push_tail(COMMAND_QUEUE_KEY, &record.id).await {
            if let Err(cleanup) = self.kv.delete(&key).await {
                warn!(
                    command_id = %record.id,
                    error = %cleanup,
                    "Failed to remove record of unqueued command"
                );
            }
            return Err(err);
        }

        debug!(command_id = %record.id, "Command enqueued");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<CommandRecord>, StoreError> {
        match self.kv.get(&CommandRecord::storage_key(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Ids waiting in the work queue
    pub async fn queue_len(&self) -> Result<usize, StoreError> {
        self.kv.list_len(COMMAND_QUEUE_KEY).await
    }

    /// Pops the oldest queued command and marks it `processing`. Ids whose
    /// record has already expired are discarded.
    pub async fn claim_next(&self) -> Result<Option<CommandRecord>, StoreError> {
        while let Some(id) = self.kv.pop_head(COMMAND_QUEUE_KEY).await? {
            match self.get(&id).await? {
                Some(mut record) => {
                    record.status = CommandStatus::Processing;
                    self.save(&record).await?;
                    return Ok(Some(record));
                }
                None => warn!(command_id = %id, "Queued command expired before it was claimed"),
            }
        }
        Ok(None)
    }

    /// Stores the result of a finished command
    pub async fn complete(&self, id: &str, result: AiProcessingResult) -> Result<Option<CommandRecord>, StoreError> {
        self.update(id, |record| {
            record.status = CommandStatus::Completed;
            record.result = Some(result);
            record.error = None;
        })
        .await
    }

    /// Stores the error of a failed command
    pub async fn fail(&self, id: &str, error: &str) -> Result<Option<CommandRecord>, StoreError> {
        self.update(id, |record| {
            record.status = CommandStatus::Failed;
            record.error = Some(error.to_string());
        })
        .await
    }

    async fn update<F>(&self, id: &str, apply: F) -> Result<Option<CommandRecord>, StoreError>
    where
        F: FnOnce(&mut CommandRecord),
    {
        let Some(mut record) = self.get(id).await? else {
            return Ok(None);
        };
        apply(&mut record);
        self.save(&record).await?;
        Ok(Some(record))
    }

    async fn save(&self, record: &CommandRecord) -> Result<(), StoreError> {
        let mut record = record.clone();
        record.updated_at = Utc::now();
        record.ttl = self.ttl.as_secs();
        let raw = serde_json::to_string(&record)?;
        self.kv
            .set_with_expiry(&CommandRecord::storage_key(&record.id), self.ttl, &raw)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use shared_types::{CommandRequest, TokenUsage};
    use tokio_test::{assert_err, assert_ok};

    /// Memory store whose queue pushes always fail
    struct QueueDown(MemoryStore);

    #[async_trait]
    impl KeyValueStore for QueueDown {
        async fn set_with_expiry(&self, key: &str, ttl: Duration, value: &str) -> Result<(), StoreError> {
            self.0.set_with_expiry(key, ttl, value).await
        }

        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.get(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.0.delete(key).await
        }

        async fn push_tail(&self, _list_key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Connection("queue unavailable".to_string()))
        }

        async fn pop_head(&self, list_key: &str) -> Result<Option<String>, StoreError> {
            self.0.pop_head(list_key).await
        }

        async fn list_len(&self, list_key: &str) -> Result<usize, StoreError> {
            self.0.list_len(list_key).await
        }
    }

    fn store(ttl: Duration) -> AsyncCommandStore {
        AsyncCommandStore::new(Arc::new(MemoryStore::new()), ttl)
    }

    fn result() -> AiProcessingResult {
        AiProcessingResult {
            content: "done".into(),
            model: "llama3.2".into(),
            usage: TokenUsage::default(),
            finish_reason: "stop".into(),
        }
    }

    fn record(id: &str) -> CommandRecord {
        CommandRecord::queued(id.to_string(), "u1".to_string(), CommandRequest::new("hi"), 3600)
    }

    #[tokio::test]
    async fn test_enqueue_persists_and_queues() {
        let store = store(Duration::from_secs(60));
        store.enqueue(&record("cmd_a")).await.unwrap();

        let stored = store.get("cmd_a").await.unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Queued);
        assert_eq!(stored.ttl, 60);
        assert_eq!(store.queue_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_queue_push_leaves_no_record() {
        let store = AsyncCommandStore::new(Arc::new(QueueDown(MemoryStore::new())), Duration::from_secs(60));

        let err = assert_err!(store.enqueue(&record("cmd_a")).await);
        assert!(matches!(err, StoreError::Connection(_)));
        assert!(assert_ok!(store.get("cmd_a").await).is_none());
        assert_eq!(assert_ok!(store.queue_len().await), 0);
    }

    #[tokio::test]
    async fn test_worker_lifecycle() {
        let store = store(Duration::from_secs(60));
        store.enqueue(&record("cmd_a")).await.unwrap();
        store.enqueue(&record("cmd_b")).await.unwrap();

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, "cmd_a");
        assert_eq!(store.get("cmd_a").await.unwrap().unwrap().status, CommandStatus::Processing);

        let completed = store.complete("cmd_a", result()).await.unwrap().unwrap();
        assert_eq!(completed.status, CommandStatus::Completed);
        assert_eq!(completed.result, Some(result()));

        let failed = store.fail("cmd_b", "upstream down").await.unwrap().unwrap();
        assert_eq!(failed.status, CommandStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("upstream down"));

        assert!(store.complete("cmd_missing", result()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_skips_expired_records() {
        let store = store(Duration::from_millis(20));
        store.enqueue(&record("cmd_old")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get("cmd_old").await.unwrap().is_none());
        assert!(store.claim_next().await.unwrap().is_none());
        assert_eq!(store.queue_len().await.unwrap(), 0);
    }
}
