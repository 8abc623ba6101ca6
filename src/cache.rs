use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tokio::time;
use tracing::{debug, info};

/// A rendered image together with the key it is addressed by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub cache_key: String,
}

impl GeneratedArtifact {
    pub fn png(bytes: Vec<u8>, cache_key: String) -> Self {
        Self {
            bytes,
            mime_type: String::from("image/png"),
            cache_key,
        }
    }
}

/// A cache entry with its insertion time and TTL
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    pub artifact: GeneratedArtifact,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl CachedArtifact {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
}

/// Time-based artifact cache. Reads check expiry themselves; `purge_expired`
/// only reclaims memory.
pub struct ArtifactCache {
    entries: RwLock<HashMap<String, CachedArtifact>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ArtifactCache {
    /// Create a new cache with the specified default TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get an artifact if it exists and hasn't expired
    pub fn get(&self, key: &str) -> Option<GeneratedArtifact> {
        let now = Instant::now();
        let found = self
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.artifact.clone());

        match &found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };

        found
    }

    /// Store an artifact with the configured TTL
    pub fn set(&self, key: &str, artifact: GeneratedArtifact) {
        self.set_with_ttl(key, artifact, self.ttl);
    }

    pub fn set_with_ttl(&self, key: &str, artifact: GeneratedArtifact, ttl: Duration) {
        self.write().insert(
            key.to_string(),
            CachedArtifact {
                artifact,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove a specific key from the cache
    pub fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.len(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CachedArtifact>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CachedArtifact>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Background housekeeping: purge expired artifacts every `period`.
pub async fn sweep_task(
    cache: Arc<ArtifactCache>,
    period: Duration,
) -> Result<(), crate::error::Error> {
    info!("Artifact cache sweeper started (period: {:?})", period);
    let mut interval = time::interval(period);
    // first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        let purged = cache.purge_expired();
        let stats = cache.stats();
        debug!(
            "Artifact cache sweep: purged {}, {} live keys, {} hits, {} misses",
            purged, stats.keys, stats.hits, stats.misses
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(key: &str) -> GeneratedArtifact {
        GeneratedArtifact::png(vec![1, 2, 3], key.to_string())
    }

    #[test]
    fn get_returns_stored_artifact() {
        let cache = ArtifactCache::new(Duration::from_secs(60));
        cache.set("map:a", artifact("map:a"));

        assert_eq!(cache.get("map:a"), Some(artifact("map:a")));
        assert_eq!(cache.get("map:b"), None);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                keys: 1
            }
        );
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned_before_sweep() {
        let cache = ArtifactCache::new(Duration::from_millis(20));
        cache.set("map:a", artifact("map:a"));

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("map:a"), None);
        // still stored until the sweeper runs
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn purge_keeps_live_entries() {
        let cache = ArtifactCache::new(Duration::from_secs(60));
        cache.set_with_ttl("short", artifact("short"), Duration::from_millis(10));
        cache.set("long", artifact("long"));

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.get("long").is_some());
    }

    #[tokio::test]
    async fn sweep_task_purges_in_background() {
        let cache = Arc::new(ArtifactCache::new(Duration::from_millis(10)));
        cache.set("map:a", artifact("map:a"));

        let handle = tokio::spawn(sweep_task(cache.clone(), Duration::from_millis(25)));
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        assert!(cache.is_empty());
    }

    #[test]
    fn delete_and_clear() {
        let cache = ArtifactCache::new(Duration::from_secs(60));
        cache.set("a", artifact("a"));
        cache.set("b", artifact("b"));

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.get("b").is_none());
    }
}
