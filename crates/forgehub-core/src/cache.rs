//! Content caches used by forges to memoize expensive lookups.
//!
//! A cache is handed a key and a computation; it either returns a stored
//! value or runs the computation. Failed computations are never stored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::buffer::ModuleBuffer;
use crate::error::{ForgeError, Result};

/// Keyed get-or-compute store
#[async_trait]
pub trait ContentCache<V: Send + 'static>: Send + Sync {
    /// Return the value stored under `key`, or run `compute` and store its
    /// result if it succeeds.
    async fn get_or_compute<'a>(
        &'a self,
        key: &'a str,
        compute: BoxFuture<'a, Result<V>>,
    ) -> Result<V>;

    /// Drop every stored value.
    async fn clear(&self);
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

type Slot<V> = Arc<OnceCell<CacheEntry<V>>>;

/// Time-limited in-memory cache.
///
/// Concurrent callers asking for the same missing key share one
/// computation: the first caller computes while the others wait on the
/// same slot. Entries expire `ttl` after insertion and are replaced on the
/// next lookup.
pub struct InMemoryCache<V> {
    ttl: Duration,
    slots: Mutex<HashMap<String, Slot<V>>>,
}

impl<V> InMemoryCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch the live slot for `key`, replacing it if its entry expired.
    ///
    /// Creating a slot also drops every other expired entry, along with
    /// empty slots no caller is still computing.
    fn slot(&self, key: &str) -> Slot<V> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            match slot.get() {
                Some(entry) if entry.is_expired(self.ttl) => {}
                _ => return Arc::clone(slot),
            }
        }

        let ttl = self.ttl;
        slots.retain(|_, slot| match slot.get() {
            Some(entry) => !entry.is_expired(ttl),
            None => Arc::strong_count(slot) > 1,
        });

        let slot = Arc::new(OnceCell::new());
        slots.insert(key.to_string(), Arc::clone(&slot));
        slot
    }
}

#[async_trait]
impl<V> ContentCache<V> for InMemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get_or_compute<'a>(
        &'a self,
        key: &'a str,
        compute: BoxFuture<'a, Result<V>>,
    ) -> Result<V> {
        let slot = self.slot(key);
        let entry = slot
            .get_or_try_init(move || async move {
                debug!(key = %key, "Cache miss");
                compute.await.map(CacheEntry::new)
            })
            .await?;
        Ok(entry.value.clone())
    }

    async fn clear(&self) {
        self.slots.lock().clear();
    }
}

/// Cache that stores nothing; every lookup runs the computation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCache;

#[async_trait]
impl<V: Send + 'static> ContentCache<V> for NoOpCache {
    async fn get_or_compute<'a>(
        &'a self,
        _key: &'a str,
        compute: BoxFuture<'a, Result<V>>,
    ) -> Result<V> {
        compute.await
    }

    async fn clear(&self) {}
}

/// Download cache that reads packages fully into memory so they can be
/// served again without another upstream request.
pub struct BufferingCache {
    inner: InMemoryCache<Bytes>,
}

impl BufferingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: InMemoryCache::new(ttl),
        }
    }
}

#[async_trait]
impl ContentCache<ModuleBuffer> for BufferingCache {
    async fn get_or_compute<'a>(
        &'a self,
        key: &'a str,
        compute: BoxFuture<'a, Result<ModuleBuffer>>,
    ) -> Result<ModuleBuffer> {
        let bytes = self
            .inner
            .get_or_compute(
                key,
                Box::pin(async move {
                    let buffer = compute.await?;
                    let bytes = buffer.into_bytes().await?;
                    Ok::<Bytes, ForgeError>(bytes)
                }),
            )
            .await?;
        Ok(ModuleBuffer::from_bytes(bytes))
    }

    async fn clear(&self) {
        self.inner.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>, value: &str) -> BoxFuture<'static, Result<String>> {
        let counter = Arc::clone(counter);
        let value = value.to_string();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        })
    }

    #[tokio::test]
    async fn test_in_memory_cache_reuses_value() {
        let cache = InMemoryCache::<String>::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get_or_compute("k", counting(&calls, "a")).await.unwrap();
        let second = cache.get_or_compute("k", counting(&calls, "b")).await.unwrap();

        assert_eq!(first, "a");
        assert_eq!(second, "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_in_memory_cache_expires() {
        let cache = InMemoryCache::<String>::new(Duration::from_millis(20));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_compute("k", counting(&calls, "a")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let refreshed = cache.get_or_compute("k", counting(&calls, "b")).await.unwrap();

        assert_eq!(refreshed, "b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_in_memory_cache_does_not_store_failures() {
        let cache: InMemoryCache<String> = InMemoryCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let failed = cache
            .get_or_compute(
                "k",
                Box::pin(async { Err::<String, _>(ForgeError::Transport("upstream down".into())) }),
            )
            .await;
        assert!(failed.is_err());

        let value = cache.get_or_compute("k", counting(&calls, "ok")).await.unwrap();
        assert_eq!(value, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_in_memory_cache_single_flight() {
        let cache = Arc::new(InMemoryCache::<String>::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_compute(
                            "shared",
                            Box::pin(async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(30)).await;
                                Ok("value".to_string())
                            }),
                        )
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "value");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_keys_are_pruned_on_insert() {
        let cache = InMemoryCache::<String>::new(Duration::from_millis(200));
        let calls = Arc::new(AtomicUsize::new(0));

        for key in ["/v3/modules?query=a", "/v3/modules?query=b", "/v3/modules?query=c"] {
            cache.get_or_compute(key, counting(&calls, "page")).await.unwrap();
        }
        let _ = cache
            .get_or_compute(
                "/v3/modules?query=failed",
                Box::pin(async { Err::<String, _>(ForgeError::Transport("upstream down".into())) }),
            )
            .await;
        assert_eq!(cache.slots.lock().len(), 4);

        tokio::time::sleep(Duration::from_millis(300)).await;
        cache
            .get_or_compute("/v3/modules?query=d", counting(&calls, "page"))
            .await
            .unwrap();

        let slots = cache.slots.lock();
        assert_eq!(slots.len(), 1);
        assert!(slots.contains_key("/v3/modules?query=d"));
    }

    #[tokio::test]
    async fn test_clear_forces_recompute() {
        let cache = InMemoryCache::<String>::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_compute("k", counting(&calls, "a")).await.unwrap();
        cache.clear().await;
        cache.get_or_compute("k", counting(&calls, "a")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_noop_cache_always_computes() {
        let cache = NoOpCache;
        let calls = Arc::new(AtomicUsize::new(0));

        ContentCache::<String>::get_or_compute(&cache, "k", counting(&calls, "a"))
            .await
            .unwrap();
        ContentCache::<String>::get_or_compute(&cache, "k", counting(&calls, "a"))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_buffering_cache_replays_package() {
        let cache = BufferingCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let buffer = cache
                .get_or_compute(
                    "alice-foo-1.0.0.tar.gz",
                    Box::pin(async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(ModuleBuffer::from_reader(&b"package"[..], None))
                    }),
                )
                .await
                .unwrap();
            assert_eq!(buffer.into_bytes().await.unwrap(), Bytes::from_static(b"package"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
