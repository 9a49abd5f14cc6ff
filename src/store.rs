// Capped per-key history of generated pages

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;

use crate::error::StoreError;

/// Most-recent-first list of pages per cache key.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Push `html` to the front of the list at `key`, then trim to `cap` entries.
    async fn push_capped(&self, key: &str, html: &str, cap: usize) -> Result<(), StoreError>;

    /// Entries for `key`, newest first.
    async fn history(&self, key: &str) -> Result<Vec<String>, StoreError>;
}

// Redis-backed store
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn open(redis_url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(redis::Client::open(redis_url)?))
    }
}

#[async_trait]
impl PageStore for RedisStore {
    async fn push_capped(&self, key: &str, html: &str, cap: usize) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // LPUSH + LTRIM in one MULTI so concurrent writers never see an untrimmed list
        let stop = cap.saturating_sub(1) as isize;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .lpush(key, html)
            .ignore()
            .ltrim(key, 0, stop)
            .ignore();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn history(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let entries: Vec<String> = redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(entries)
    }
}

// In-process store
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, VecDeque<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn push_capped(&self, key: &str, html: &str, cap: usize) -> Result<(), StoreError> {
        let mut list = self.entries.entry(key.to_string()).or_default();
        list.push_front(html.to_string());
        list.truncate(cap);
        Ok(())
    }

    async fn history(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }
}
