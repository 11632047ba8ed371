use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use crate::collaborators::{KeyValueStore, StoreError};

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Redis-backed store shared by every gateway instance
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        info!(url = %redis_url, "Connected to Redis");
        Ok(Self { connection })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_with_expiry(&self, key: &str, ttl: Duration, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let seconds = ttl.as_secs().max(1) as usize;
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.get(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn push_tail(&self, list_key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        conn.rpush::<_, _, ()>(list_key, value).await?;
        Ok(())
    }

    async fn pop_head(&self, list_key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.lpop(list_key, None).await?)
    }

    async fn list_len(&self, list_key: &str) -> Result<usize, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.llen(list_key).await?)
    }
}
