//! Shared page cache with versioned invalidation
//!
//! Pages are stored as JSON in a bounded moka cache with a TTL. Each resource
//! kind has a version counter: an entry is stamped with the version that was
//! current when its fetch was issued and is only served while that version is
//! still current. Invalidating a kind bumps its version and broadcasts an
//! [`Invalidation`] so other open views know to reload.

use moka::sync::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::Result;

const DEFAULT_MAX_PAGES: u64 = 512;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Images,
    People,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Images, ResourceKind::People];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Images => "images",
            ResourceKind::People => "people",
        }
    }

    fn index(&self) -> usize {
        match self {
            ResourceKind::Images => 0,
            ResourceKind::People => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidation {
    pub kind: ResourceKind,
    pub version: u64,
}

#[derive(Clone)]
struct CachedPage {
    version: u64,
    data: Arc<String>,
}

pub struct PageCache {
    pages: Cache<String, CachedPage>,
    versions: [AtomicU64; 2],
    events: broadcast::Sender<Invalidation>,
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("entry_count", &self.pages.entry_count())
            .field("images_version", &self.version(ResourceKind::Images))
            .field("people_version", &self.version(ResourceKind::People))
            .finish()
    }
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_PAGES, ttl)
    }

    pub fn with_capacity_and_ttl(max_capacity: u64, ttl: Duration) -> Self {
        let pages = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            pages,
            versions: [AtomicU64::new(0), AtomicU64::new(0)],
            events,
        }
    }

    pub fn version(&self, kind: ResourceKind) -> u64 {
        self.versions[kind.index()].load(Ordering::SeqCst)
    }

    /// Cached page for `key`, if it was fetched under the current version
    pub fn get<V: DeserializeOwned>(&self, kind: ResourceKind, key: &str) -> Option<V> {
        let full_key = Self::full_key(kind, key);
        let entry = self.pages.get(&full_key)?;

        if entry.version != self.version(kind) {
            self.pages.invalidate(&full_key);
            return None;
        }

        match serde_json::from_str(&entry.data) {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::warn!("Dropping unreadable cached page {}: {}", full_key, e);
                self.pages.invalidate(&full_key);
                None
            }
        }
    }

    /// Store a page fetched under `version`; pages from an outdated version are skipped
    pub fn insert<V: Serialize>(
        &self,
        kind: ResourceKind,
        key: &str,
        version: u64,
        page: &V,
    ) -> Result<bool> {
        if version != self.version(kind) {
            tracing::debug!("Not caching {} page {}: fetched before invalidation", kind.as_str(), key);
            return Ok(false);
        }

        let data = serde_json::to_string(page)?;
        self.pages.insert(
            Self::full_key(kind, key),
            CachedPage {
                version,
                data: Arc::new(data),
            },
        );
        Ok(true)
    }

    /// Mark every cached page of `kind` stale and tell subscribers
    pub fn invalidate(&self, kind: ResourceKind) -> u64 {
        let version = self.versions[kind.index()].fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Invalidated {} pages (version {})", kind.as_str(), version);

        // No subscribers is fine
        let _ = self.events.send(Invalidation { kind, version });
        version
    }

    pub fn subscribe(&self, kinds: &[ResourceKind]) -> CacheSubscription {
        CacheSubscription {
            receiver: self.events.subscribe(),
            kinds: kinds.to_vec(),
        }
    }

    /// Serve `key` from the cache or fetch it and remember the result
    pub async fn fetch_through<V, F, Fut>(&self, kind: ResourceKind, key: &str, fetch: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(page) = self.get(kind, key) {
            tracing::debug!("Cache hit for {} {}", kind.as_str(), key);
            return Ok(page);
        }

        let version = self.version(kind);
        let page = fetch().await?;
        if let Err(e) = self.insert(kind, key, version, &page) {
            tracing::warn!("Failed to cache {} page {}: {}", kind.as_str(), key, e);
        }
        Ok(page)
    }

    fn full_key(kind: ResourceKind, key: &str) -> String {
        format!("{}:{}", kind.as_str(), key)
    }
}

/// Receiver side of cache invalidations, filtered to some resource kinds
pub struct CacheSubscription {
    receiver: broadcast::Receiver<Invalidation>,
    kinds: Vec<ResourceKind>,
}

impl CacheSubscription {
    /// Drain pending events; true if any concerned a watched kind
    pub fn take_stale(&mut self) -> bool {
        let mut stale = false;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => stale |= self.kinds.contains(&event.kind),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::debug!("Missed {} cache invalidations", missed);
                    stale = true;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::PageResult;
    use crate::error::FolioError;

    fn page(values: &[u32]) -> PageResult<u32> {
        PageResult {
            items: values.to_vec(),
            total_count: values.len() as u64,
            total_pages: 1,
        }
    }

    #[test]
    fn test_get_after_insert() {
        let cache = PageCache::new(Duration::from_secs(60));
        let version = cache.version(ResourceKind::Images);
        assert!(cache
            .insert(ResourceKind::Images, "page=1", version, &page(&[1, 2]))
            .unwrap());

        let cached: PageResult<u32> = cache.get(ResourceKind::Images, "page=1").unwrap();
        assert_eq!(cached.items, vec![1, 2]);
        assert!(cache.get::<PageResult<u32>>(ResourceKind::People, "page=1").is_none());
    }

    #[test]
    fn test_invalidated_pages_are_not_served() {
        let cache = PageCache::new(Duration::from_secs(60));
        cache
            .insert(ResourceKind::People, "k", 0, &page(&[1]))
            .unwrap();

        cache.invalidate(ResourceKind::People);

        assert!(cache.get::<PageResult<u32>>(ResourceKind::People, "k").is_none());
    }

    #[test]
    fn test_insert_from_outdated_fetch_is_skipped() {
        let cache = PageCache::new(Duration::from_secs(60));
        let version = cache.version(ResourceKind::Images);
        cache.invalidate(ResourceKind::Images);

        assert!(!cache
            .insert(ResourceKind::Images, "k", version, &page(&[9]))
            .unwrap());
        assert!(cache.get::<PageResult<u32>>(ResourceKind::Images, "k").is_none());
    }

    #[test]
    fn test_subscription_filters_kinds() {
        let cache = PageCache::new(Duration::from_secs(60));
        let mut images = cache.subscribe(&[ResourceKind::Images]);
        let mut people = cache.subscribe(&[ResourceKind::People]);

        cache.invalidate(ResourceKind::Images);

        assert!(images.take_stale());
        assert!(!images.take_stale());
        assert!(!people.take_stale());
    }

    #[tokio::test]
    async fn test_fetch_through_hits_cache() {
        let cache = PageCache::new(Duration::from_secs(60));
        let calls = AtomicU64::new(0);

        for _ in 0..2 {
            let result = cache
                .fetch_through(ResourceKind::Images, "k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(page(&[4]))
                })
                .await
                .unwrap();
            assert_eq!(result.items, vec![4]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_through_does_not_cache_errors() {
        let cache = PageCache::new(Duration::from_secs(60));
        let err = cache
            .fetch_through::<PageResult<u32>, _, _>(ResourceKind::Images, "k", || async {
                Err(FolioError::network("down"))
            })
            .await
            .unwrap_err();
        assert!(err.is_network_error());
        assert!(cache.get::<PageResult<u32>>(ResourceKind::Images, "k").is_none());
    }
}
