//! In-process replay cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::replay::ReplayCache;

/// Replay cache held in process memory.
///
/// Suitable for a single IdP instance. Entries are keyed by
/// `(context, id)` and carry their own expiry instant. Expired entries are
/// treated as absent; every [`SWEEP_INTERVAL`] records they are swept out,
/// and [`purge_expired`] or [`spawn_purger`] drop them on demand.
///
/// [`purge_expired`]: InMemoryReplayCache::purge_expired
/// [`spawn_purger`]: InMemoryReplayCache::spawn_purger
#[derive(Debug, Clone, Default)]
pub struct InMemoryReplayCache {
    entries: Arc<DashMap<(String, String), Instant>>,
    records: Arc<AtomicUsize>,
}

/// Number of records between opportunistic sweeps of expired entries.
pub const SWEEP_INTERVAL: usize = 256;

impl InMemoryReplayCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "purged expired replay entries");
        }
        purged
    }

    /// Returns the number of stored entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawns a background task that purges expired entries every `interval`.
    ///
    /// The task stops once every other handle to the cache has been dropped.
    pub fn spawn_purger(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let entries = Arc::downgrade(&self.entries);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let now = Instant::now();
                entries.retain(|_, expires_at| *expires_at > now);
            }
        })
    }
}

#[async_trait]
impl ReplayCache for InMemoryReplayCache {
    async fn is_replay(&self, context: &str, id: &str) -> CacheResult<bool> {
        let key = (context.to_string(), id.to_string());
        Ok(self
            .entries
            .get(&key)
            .is_some_and(|expires_at| *expires_at > Instant::now()))
    }

    async fn record(&self, context: &str, id: &str, ttl: Duration) -> CacheResult<bool> {
        if self.records.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.purge_expired();
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Configuration(format!("replay TTL {ttl:?} out of range")))?;
        let key = (context.to_string(), id.to_string());

        // The entry guard holds the shard lock, so check and insert are one step.
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() > now {
                    return Ok(false);
                }
                occupied.insert(expires_at);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(expires_at);
                Ok(true)
            }
        }
    }
}
