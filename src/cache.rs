// src/cache.rs — keyed memoization with optional TTL and single-flight fills
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use tracing::debug;

type Slot<V> = Arc<OnceCell<(Instant, V)>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Maps a call signature to its result.
///
/// * Entries live for the process lifetime, or `ttl` when one is set.
/// * At most one computation per key is in flight; concurrent callers for the
///   same key wait for it, other keys proceed.
/// * Failed computations are not stored, so the next call retries.
/// * Invalidation drops finished entries only. A fill still in flight keeps
///   its slot, so callers arriving after `clear` join it instead of starting
///   a second one.
pub struct MemoCache<K, V> {
    name: &'static str,
    slots: Mutex<HashMap<K, Slot<V>>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str, ttl: Option<Duration>) -> Self {
        Self {
            name,
            slots: Mutex::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, stored_at: Instant) -> bool {
        self.ttl.is_some_and(|ttl| stored_at.elapsed() >= ttl)
    }

    /// Return the cached value for `key`, computing it with `fill` on a miss.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, fill: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = {
            let mut slots = self.lock();
            let slot = slots
                .entry(key)
                .or_insert_with(|| Arc::new(OnceCell::new()));
            if slot.get().is_some_and(|(at, _)| self.is_expired(*at)) {
                debug!(cache = self.name, "entry expired");
                *slot = Arc::new(OnceCell::new());
            }
            Arc::clone(slot)
        };

        if let Some((_, v)) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(cache = self.name, "hit");
            return Ok(v.clone());
        }

        slot.get_or_try_init(|| {
            self.misses.fetch_add(1, Ordering::Relaxed);
            fill().map(|v| (Instant::now(), v))
        })
        .map(|(_, v)| v.clone())
    }

    /// Peek without computing. Expired entries read as absent.
    pub fn get(&self, key: &K) -> Option<V> {
        let slots = self.lock();
        let (at, v) = slots.get(key)?.get()?;
        if self.is_expired(*at) {
            None
        } else {
            Some(v.clone())
        }
    }

    pub fn invalidate(&self, key: &K) {
        let mut slots = self.lock();
        if slots.get(key).is_some_and(|slot| slot.get().is_some()) {
            slots.remove(key);
        }
    }

    pub fn clear(&self) {
        self.lock().retain(|_, slot| slot.get().is_none());
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock().values().filter(|s| s.get().is_some()).count();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}

/// Short stable digest for composite keys.
pub fn digest_key(raw: &str) -> String {
    format!("{:x}", md5::compute(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn second_call_is_a_hit() {
        let cache: MemoCache<String, u32> = MemoCache::new("t", None);
        let calls = AtomicUsize::new(0);
        let fill = || -> Result<u32, ()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };
        assert_eq!(cache.get_or_try_insert_with("a".into(), fill), Ok(7));
        assert_eq!(cache.get_or_try_insert_with("a".into(), fill), Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache: MemoCache<u8, u8> = MemoCache::new("t", None);
        let r: Result<u8, &str> = cache.get_or_try_insert_with(1, || Err("boom"));
        assert_eq!(r, Err("boom"));
        assert_eq!(cache.get(&1), None);

        let r: Result<u8, &str> = cache.get_or_try_insert_with(1, || Ok(3));
        assert_eq!(r, Ok(3));
        assert_eq!(cache.get(&1), Some(3));
    }

    #[test]
    fn zero_ttl_always_recomputes() {
        let cache: MemoCache<u8, usize> = MemoCache::new("t", Some(Duration::ZERO));
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let _ = cache.get_or_try_insert_with(0, || -> Result<usize, ()> {
                Ok(calls.fetch_add(1, Ordering::SeqCst))
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.get(&0), None);
    }

    #[test]
    fn invalidate_forces_refill() {
        let cache: MemoCache<&'static str, i32> = MemoCache::new("t", None);
        let _ = cache.get_or_try_insert_with("k", || -> Result<i32, ()> { Ok(1) });
        cache.invalidate(&"k");
        let v = cache.get_or_try_insert_with("k", || -> Result<i32, ()> { Ok(2) });
        assert_eq!(v, Ok(2));

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn one_fill_in_flight_per_key() {
        let cache: MemoCache<u8, u8> = MemoCache::new("t", None);
        let calls = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let v = cache.get_or_try_insert_with(9, || -> Result<u8, ()> {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(50));
                        Ok(42)
                    });
                    assert_eq!(v, Ok(42));
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_leaves_in_flight_fill_alone() {
        use std::sync::mpsc;

        let cache: MemoCache<u8, u8> = MemoCache::new("t", None);
        let calls = AtomicUsize::new(0);
        let (cache, calls) = (&cache, &calls);
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (go_tx, go_rx) = mpsc::channel::<()>();

        std::thread::scope(|s| {
            let first = s.spawn(move || {
                cache.get_or_try_insert_with(1, || -> Result<u8, ()> {
                    calls.fetch_add(1, Ordering::SeqCst);
                    started_tx.send(()).unwrap();
                    go_rx.recv().unwrap();
                    Ok(10)
                })
            });
            started_rx.recv().unwrap();
            cache.clear();
            cache.invalidate(&1);

            let second = s.spawn(move || {
                cache.get_or_try_insert_with(1, || -> Result<u8, ()> {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(20)
                })
            });
            go_tx.send(()).unwrap();
            assert_eq!(first.join().unwrap(), Ok(10));
            assert_eq!(second.join().unwrap(), Ok(10));
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // once finished, clear drops it as usual
        cache.clear();
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn digest_is_stable_hex() {
        let a = digest_key("toy|drama");
        assert_eq!(a, digest_key("toy|drama"));
        assert_ne!(a, digest_key("toy|comedy"));
        assert_eq!(a.len(), 32);
    }
}
