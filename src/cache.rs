//! Deduplicating image cache with request coalescing.
//!
//! Each key owns a [`tokio::sync::OnceCell`]. The map lock is held only long
//! enough to find or insert that cell; the fetch itself runs inside
//! `OnceCell::get_or_init`, which lets exactly one caller compute while every
//! other caller for the same key waits for the published outcome. Failures
//! are stored too, so concurrent duplicates of a failing reference fail
//! together without issuing a second request.
//!
//! ## Lifecycle
//!
//! A cache is an ordinary value. Construct one per process (or per session)
//! and hand it to [`crate::Bundler::with_cache`] to share fetched images across
//! bundling calls; call [`ImageCache::clear`] to start over. There is no
//! eviction beyond that.

use crate::error::FetchError;
use crate::pipeline::encode::ResolvedImage;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

/// Cached result of resolving one reference.
pub type FetchOutcome = Result<Arc<ResolvedImage>, FetchError>;

type Slot = Arc<OnceCell<FetchOutcome>>;

/// Concurrency-safe map from reference key to [`FetchOutcome`].
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: Mutex<HashMap<String, Slot>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the outcome for `key`, running `compute` if nobody has yet.
    ///
    /// `compute` runs at most once per key for the lifetime of the entry, no
    /// matter how many callers race on it. If the computing caller is
    /// dropped mid-flight, the next waiter takes over.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> FetchOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        let slot = self.slot(key);
        let outcome = slot.get_or_init(compute).await;
        outcome.clone()
    }

    /// The published outcome for `key`, if one exists.
    pub fn get(&self, key: &str) -> Option<FetchOutcome> {
        self.lock().get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of keys with a published outcome.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop entries whose published outcome is an error, so they are
    /// fetched again next time. Entries still being computed are kept.
    pub fn evict_failures(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, slot| !matches!(slot.get(), Some(Err(_))));
        before - entries.len()
    }

    fn slot(&self, key: &str) -> Slot {
        let mut entries = self.lock();
        Arc::clone(entries.entry(key.to_string()).or_default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn image(tag: &str) -> FetchOutcome {
        Ok(Arc::new(ResolvedImage {
            media_type: "image/png".into(),
            data_uri: format!("data:image/png;base64,{tag}"),
        }))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_coalesce() {
        let cache = Arc::new(ImageCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_compute("https://example.com/a.png", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            image("AAAA")
                        })
                        .await
                })
            })
            .collect();

        let mut uris = Vec::new();
        for task in tasks {
            uris.push(task.await.unwrap().unwrap().data_uri.clone());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(uris.iter().all(|u| u == &uris[0]));
    }

    #[tokio::test]
    async fn distinct_keys_compute_independently() {
        let cache = ImageCache::new();
        let a = cache.get_or_compute("a", || async { image("A") }).await;
        let b = cache.get_or_compute("b", || async { image("B") }).await;
        assert_ne!(a.unwrap().data_uri, b.unwrap().data_uri);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn failures_are_cached_until_evicted() {
        let cache = ImageCache::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fail = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::RemoteStatus {
                url: "https://example.com/a.png".into(),
                status: 500,
            })
        };

        assert!(cache.get_or_compute("a", fail).await.is_err());
        assert!(cache.get_or_compute("a", fail).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let _ = cache.get_or_compute("ok", || async { image("OK") }).await;
        assert_eq!(cache.evict_failures(), 1);
        assert!(cache.get("a").is_none());
        assert!(cache.get("ok").is_some());

        assert!(cache.get_or_compute("a", fail).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let cache = ImageCache::new();
        let _ = cache.get_or_compute("a", || async { image("A") }).await;
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[tokio::test]
    async fn dropped_computation_lets_next_caller_compute() {
        let cache = ImageCache::new();
        let pending = cache.get_or_compute("a", || std::future::pending::<FetchOutcome>());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());

        let outcome = cache.get_or_compute("a", || async { image("A") }).await;
        assert!(outcome.is_ok());
    }
}
