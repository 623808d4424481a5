//! Tiered cache manager
//!
//! Read path: L1 → L2 → L3, first hit wins; a hit in an outer tier
//! re-populates L1 before returning so the next lookup stays local.
//! Write path: synchronous insert into L1, fire-and-forget background
//! writes to L2/L3. An unavailable outer tier degrades to a miss for that
//! tier and never blocks or fails the request path.

use super::{CacheEntry, LocalCache, TierClient};
use crate::fingerprint::Fingerprint;
use crate::models::{CacheTier, PredictionResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-tier TTLs and L1 sizing
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub l1_capacity: usize,
    pub l1_ttl: Duration,
    pub l2_ttl: Duration,
    pub l3_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_capacity: 1024,
            l1_ttl: Duration::from_secs(10 * 60),
            l2_ttl: Duration::from_secs(60 * 60),
            l3_ttl: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Read-through/write-through cache across all three tiers
///
/// Constructed at startup and injected into the gateway; there are no
/// ambient cache singletons. Missing outer tiers (None) simply narrow the
/// cache to the remaining layers.
pub struct CacheManager {
    l1: LocalCache,
    l2: Option<Arc<dyn TierClient>>,
    l3: Option<Arc<dyn TierClient>>,
    config: CacheConfig,
    /// Monotonic write version shared by all tiers
    version: AtomicU64,
}

impl CacheManager {
    pub fn new(
        config: CacheConfig,
        l2: Option<Arc<dyn TierClient>>,
        l3: Option<Arc<dyn TierClient>>,
    ) -> Self {
        Self {
            l1: LocalCache::new(config.l1_capacity, config.l1_ttl),
            l2,
            l3,
            config,
            version: AtomicU64::new(0),
        }
    }

    /// Look up a fingerprint across tiers, promoting outer hits into L1
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<(CacheEntry, CacheTier)> {
        if let Some(entry) = self.l1.get(fingerprint) {
            return Some((entry, CacheTier::L1));
        }

        let outer = [
            (CacheTier::L2, self.l2.as_ref()),
            (CacheTier::L3, self.l3.as_ref()),
        ];
        for (tier, client) in outer {
            let client = match client {
                Some(c) => c,
                None => continue,
            };
            match client.get(fingerprint.as_str()).await {
                Ok(Some(bytes)) => match serde_json::from_slice::<CacheEntry>(&bytes) {
                    Ok(entry) if !entry.is_expired(super::now_ms()) => {
                        // Promotion: next lookup for this key hits L1
                        self.l1.insert(fingerprint.clone(), entry.clone());
                        debug!(fingerprint = %fingerprint, tier = tier.as_str(), "Cache hit promoted to L1");
                        return Some((entry, tier));
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(fingerprint = %fingerprint, tier = tier.as_str(), error = %e, "Discarding undecodable cache entry");
                        continue;
                    }
                },
                Ok(None) => continue,
                Err(e) => {
                    warn!(tier = tier.as_str(), error = %e, "Cache tier unavailable, treating as miss");
                    continue;
                }
            }
        }
        None
    }

    /// Write a result through all tiers
    ///
    /// L1 is written synchronously; L2/L3 writes run as detached tasks
    /// whose failures are logged and never awaited by the caller.
    pub async fn put(&self, fingerprint: &Fingerprint, result: &PredictionResult) {
        let version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        let now = super::now_ms();

        self.l1.insert(
            fingerprint.clone(),
            CacheEntry {
                result: result.clone(),
                tier: CacheTier::L1,
                created_at: now,
                ttl_ms: self.config.l1_ttl.as_millis() as u64,
                version,
            },
        );

        let outer = [
            (CacheTier::L2, self.l2.clone(), self.config.l2_ttl),
            (CacheTier::L3, self.l3.clone(), self.config.l3_ttl),
        ];
        for (tier, client, ttl) in outer {
            let client = match client {
                Some(c) => c,
                None => continue,
            };
            let entry = CacheEntry {
                result: result.clone(),
                tier,
                created_at: now,
                ttl_ms: ttl.as_millis() as u64,
                version,
            };
            let bytes = match serde_json::to_vec(&entry) {
                Ok(b) => b,
                Err(e) => {
                    warn!(tier = tier.as_str(), error = %e, "Failed to encode cache entry");
                    continue;
                }
            };
            let key = fingerprint.as_str().to_string();
            tokio::spawn(async move {
                if let Err(e) = client.put(&key, bytes, ttl).await {
                    warn!(tier = tier.as_str(), error = %e, "Background cache write failed");
                }
            });
        }
    }

    /// Current write version, for observability
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// Number of entries resident in L1
    pub fn l1_len(&self) -> usize {
        self.l1.len()
    }
}
