//! Process-local L1 cache
//!
//! Bounded in-memory cache with least-recently-used eviction and TTL
//! expiry. Lookup is a single hash map access under a short-lived mutex.

use super::CacheEntry;
use crate::fingerprint::Fingerprint;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Default L1 capacity when none is configured
const DEFAULT_CAPACITY: usize = 1024;

struct Slot {
    entry: CacheEntry,
    /// Unix ms after which this slot is a miss regardless of entry TTL
    expires_at: i64,
    /// Recency tick for LRU eviction
    last_access: u64,
}

/// Bounded LRU cache for the fastest tier
pub struct LocalCache {
    capacity: usize,
    ttl: Duration,
    slots: Mutex<HashMap<Fingerprint, Slot>>,
    tick: AtomicU64,
}

impl LocalCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            slots: Mutex::new(HashMap::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            tick: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, Slot>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Look up an entry, treating expired slots as misses
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let now = super::now_ms();
        let mut slots = self.lock();

        let expired = match slots.get(fingerprint) {
            Some(slot) => now >= slot.expires_at || slot.entry.is_expired(now),
            None => return None,
        };
        if expired {
            slots.remove(fingerprint);
            return None;
        }

        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        let slot = slots.get_mut(fingerprint)?;
        slot.last_access = tick;
        Some(slot.entry.clone())
    }

    /// Insert an entry, evicting the least-recently-used slot at capacity
    ///
    /// Returns false when an existing live slot carries a higher version:
    /// the stored version must never decrease, so stale writes are
    /// rejected.
    pub fn insert(&self, fingerprint: Fingerprint, entry: CacheEntry) -> bool {
        let now = super::now_ms();
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        let mut slots = self.lock();

        if let Some(existing) = slots.get(&fingerprint) {
            if existing.entry.version > entry.version && now < existing.expires_at {
                return false;
            }
        }

        slots.insert(
            fingerprint,
            Slot {
                entry,
                expires_at: now + self.ttl.as_millis() as i64,
                last_access: tick,
            },
        );

        while slots.len() > self.capacity {
            let lru = slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_access)
                .map(|(fp, _)| fp.clone());
            match lru {
                Some(fp) => slots.remove(&fp),
                None => break,
            };
        }
        true
    }

    /// Number of live slots (including not-yet-collected expired ones)
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop expired slots eagerly
    pub fn purge_expired(&self) {
        let now = super::now_ms();
        self.lock()
            .retain(|_, slot| now < slot.expires_at && !slot.entry.is_expired(now));
    }
}
