//! Tiered result cache
//!
//! Three layers consulted in order: a process-local bounded LRU (L1), a
//! shared network cache (L2), and a durable store (L3). L2/L3 sit behind
//! the [`TierClient`] trait and are provided by the deployment; an
//! in-memory implementation ships for tests and single-node use.

mod l1;
mod manager;
mod remote;

pub use l1::LocalCache;
pub use manager::{CacheConfig, CacheManager};
pub use remote::{MemoryTier, TierClient, TierUnavailable};

use crate::models::{CacheTier, PredictionResult};
use serde::{Deserialize, Serialize};

/// A cached prediction with tier provenance and freshness metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub result: PredictionResult,
    /// Tier this entry was written for
    pub tier: CacheTier,
    /// Unix milliseconds at write time
    pub created_at: i64,
    pub ttl_ms: u64,
    /// Monotonic write version, used to detect stale overwrites
    pub version: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.created_at + self.ttl_ms as i64
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
