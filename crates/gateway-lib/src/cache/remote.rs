//! External cache tier client interface
//!
//! L2 (shared network cache) and L3 (durable store) are operated outside
//! this crate; deployments implement [`TierClient`] over Redis, SQL, or
//! whatever backs them. [`MemoryTier`] is the in-process reference
//! implementation used by tests and single-node setups.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// A tier outage. Always recoverable: the cache manager degrades the
/// affected tier to a miss and the request proceeds.
#[derive(Debug, Clone, Error)]
#[error("cache tier unavailable: {reason}")]
pub struct TierUnavailable {
    pub reason: String,
}

impl TierUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Client for one external cache tier
#[async_trait]
pub trait TierClient: Send + Sync {
    /// Fetch the raw bytes stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TierUnavailable>;

    /// Store `value` under `key` with the given time-to-live
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), TierUnavailable>;
}

/// In-memory [`TierClient`] with TTL enforcement on read
pub struct MemoryTier {
    entries: RwLock<HashMap<String, StoredValue>>,
}

struct StoredValue {
    bytes: Vec<u8>,
    expires_at: i64,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored keys, including expired ones not yet collected
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TierClient for MemoryTier {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TierUnavailable> {
        let now = super::now_ms();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|v| now < v.expires_at)
            .map(|v| v.bytes.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), TierUnavailable> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                expires_at: super::now_ms() + ttl.as_millis() as i64,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_tier_roundtrip() {
        let tier = MemoryTier::new();
        tier.put("k", b"value".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(tier.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert_eq!(tier.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_tier_ttl_expiry() {
        let tier = MemoryTier::new();
        tier.put("k", b"value".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(tier.get("k").await.unwrap(), None);
    }
}
