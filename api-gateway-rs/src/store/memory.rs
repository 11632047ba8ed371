use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::collaborators::{KeyValueStore, StoreError};

/// Writes between two sweeps of expired values
const SWEEP_INTERVAL: u64 = 64;

/// Default bound on each list
pub const DEFAULT_LIST_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, (String, Instant)>,
    lists: HashMap<String, VecDeque<String>>,
    writes: u64,
}

impl Inner {
    fn sweep_expired(&mut self, now: Instant) {
        let before = self.values.len();
        self.values.retain(|_, (_, expires_at)| *expires_at > now);
        let removed = before - self.values.len();
        if removed > 0 {
            debug!(removed, remaining = self.values.len(), "Swept expired values");
        }
    }
}

/// In-process store with expiring values, for single-instance deployments
/// and tests.
///
/// Expired values read as absent and are swept out every few writes. Lists
/// are bounded: nothing in a single gateway process consumes the work queue,
/// so once a list reaches its capacity the oldest entry is dropped for each
/// new one.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    list_capacity: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_list_capacity(DEFAULT_LIST_CAPACITY)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list_capacity(list_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            list_capacity: list_capacity.max(1),
        }
    }

    /// Values currently held, expired or not
    pub fn stored_values(&self) -> usize {
        self.lock().values.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_with_expiry(&self, key: &str, ttl: Duration, value: &str) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.writes += 1;
        if inner.writes % SWEEP_INTERVAL == 0 {
            inner.sweep_expired(now);
        }
        inner.values.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.lock();
        let expired = match inner.values.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => return Ok(Some(value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.values.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock().values.remove(key);
        Ok(())
    }

    async fn push_tail(&self, list_key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let list = inner.lists.entry(list_key.to_string()).or_default();
        if list.len() >= self.list_capacity {
            if let Some(dropped) = list.pop_front() {
                warn!(list = %list_key, dropped = %dropped, capacity = self.list_capacity, "List full, dropped oldest entry");
            }
        }
        list.push_back(value.to_string());
        Ok(())
    }

    async fn pop_head(&self, list_key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().lists.get_mut(list_key).and_then(VecDeque::pop_front))
    }

    async fn list_len(&self, list_key: &str) -> Result<usize, StoreError> {
        Ok(self.lock().lists.get(list_key).map_or(0, VecDeque::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_value_expires() {
        let store = MemoryStore::new();
        store.set_with_expiry("k", Duration::from_millis(30), "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writes_sweep_expired_values() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store
                .set_with_expiry(&format!("old:{}", i), Duration::from_millis(10), "v")
                .await
                .unwrap();
        }
        assert_eq!(store.stored_values(), 10);
        tokio::time::sleep(Duration::from_millis(30)).await;

        for i in 0..SWEEP_INTERVAL {
            store
                .set_with_expiry(&format!("new:{}", i), Duration::from_secs(60), "v")
                .await
                .unwrap();
        }
        assert_eq!(store.stored_values(), SWEEP_INTERVAL as usize);
    }

    #[tokio::test]
    async fn test_delete_removes_value() {
        let store = MemoryStore::new();
        store.set_with_expiry("k", Duration::from_secs(60), "v").await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("missing").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_full_list_drops_oldest() {
        let store = MemoryStore::with_list_capacity(2);
        for id in ["a", "b", "c"] {
            store.push_tail("q", id).await.unwrap();
        }
        assert_eq!(store.list_len("q").await.unwrap(), 2);
        assert_eq!(store.pop_head("q").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_list_is_fifo() {
        let store = MemoryStore::new();
        assert_eq!(store.list_len("q").await.unwrap(), 0);
        store.push_tail("q", "a").await.unwrap();
        store.push_tail("q", "b").await.unwrap();
        assert_eq!(store.list_len("q").await.unwrap(), 2);
        assert_eq!(store.pop_head("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.pop_head("q").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.pop_head("q").await.unwrap(), None);
    }
}
