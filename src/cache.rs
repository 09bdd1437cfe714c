use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

struct Slot<V> {
    value: Option<V>,
    expires_at: Option<Instant>,
}

/// Key → (value, expiry) cache with lazy recompute.
///
/// Each key owns an async mutex, so during a miss exactly one caller runs the
/// compute while concurrent callers for the same key wait on the slot and
/// reuse the stored result. Different keys never contend.
pub struct TtlCache<K, V> {
    ttl: Duration,
    slots: Mutex<HashMap<K, Arc<tokio::sync::Mutex<Slot<V>>>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &K) -> Arc<tokio::sync::Mutex<Slot<V>>> {
        let mut slots = self.slots.lock().unwrap();
        slots
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(Slot {
                    value: None,
                    expires_at: None,
                }))
            })
            .clone()
    }

    /// Return the cached value for `key`, or run `compute` to fill it.
    /// A compute error is returned to the caller and leaves the slot empty, so
    /// the next caller retries.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(&key);
        let mut guard = slot.lock().await;

        if let (Some(value), Some(expires_at)) = (&guard.value, guard.expires_at) {
            if Instant::now() < expires_at {
                return Ok(value.clone());
            }
        }

        let value = compute().await?;
        guard.value = Some(value.clone());
        guard.expires_at = Some(Instant::now() + self.ttl);
        Ok(value)
    }

    /// Drop the cached value for `key`; the next read recomputes.
    pub async fn invalidate(&self, key: &K) {
        let slot = {
            let slots = self.slots.lock().unwrap();
            slots.get(key).cloned()
        };
        if let Some(slot) = slot {
            let mut guard = slot.lock().await;
            guard.value = None;
            guard.expires_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_miss_computes_once() {
        let cache = Arc::new(TtlCache::<&str, u32>::new(Duration::from_secs(60)));
        let computes = Arc::new(AtomicUsize::new(0));

        let run = |cache: Arc<TtlCache<&'static str, u32>>, computes: Arc<AtomicUsize>| async move {
            cache
                .get_or_compute("current", || async {
                    computes.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, ()>(7)
                })
                .await
                .unwrap()
        };

        let (a, b) = tokio::join!(
            run(cache.clone(), computes.clone()),
            run(cache.clone(), computes.clone())
        );
        assert_eq!((a, b), (7, 7));
        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_recomputes() {
        let cache = TtlCache::<&str, u32>::new(Duration::from_millis(50));
        let computes = AtomicUsize::new(0);

        cache
            .get_or_compute("k", || async {
                computes.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(1)
            })
            .await
            .unwrap();
        // Within the TTL the cached value answers.
        let v = cache
            .get_or_compute("k", || async {
                computes.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(99)
            })
            .await
            .unwrap();
        assert_eq!(v, 1);
        assert_eq!(computes.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let v = cache
            .get_or_compute("k", || async {
                computes.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(2)
            })
            .await
            .unwrap();
        assert_eq!(v, 2);
        assert_eq!(computes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let cache = TtlCache::<&str, u32>::new(Duration::from_secs(60));
        cache
            .get_or_compute("k", || async { Ok::<_, ()>(1) })
            .await
            .unwrap();
        cache.invalidate(&"k").await;
        let v = cache
            .get_or_compute("k", || async { Ok::<_, ()>(2) })
            .await
            .unwrap();
        assert_eq!(v, 2);
    }

    #[tokio::test]
    async fn failed_compute_leaves_slot_empty() {
        let cache = TtlCache::<&str, u32>::new(Duration::from_secs(60));
        let err: Result<u32, &str> = cache
            .get_or_compute("k", || async { Err("backing store down") })
            .await;
        assert!(err.is_err());
        let v = cache
            .get_or_compute("k", || async { Ok::<_, &str>(3) })
            .await
            .unwrap();
        assert_eq!(v, 3);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_share_values() {
        let cache = TtlCache::<String, u32>::new(Duration::from_secs(60));
        let a = cache
            .get_or_compute("a".into(), || async { Ok::<_, ()>(1) })
            .await
            .unwrap();
        let b = cache
            .get_or_compute("b".into(), || async { Ok::<_, ()>(2) })
            .await
            .unwrap();
        assert_eq!((a, b), (1, 2));
    }
}
