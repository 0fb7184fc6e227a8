//! Bounded read-through cache for descriptors.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use moka::sync::Cache;

/// Entry limit used when a caller does not pick one.
pub const DEFAULT_CAPACITY: u64 = 200;

/// Descriptors keyed by id, loaded on first use.
///
/// Entries are shared as `Arc<V>`. The cache is `Send + Sync` and is meant
/// to be injected into the factories that need it.
#[derive(Clone)]
pub struct DescriptorCache<K, V> {
    name: String,
    inner: Cache<K, Arc<V>>,
}

impl<K, V> DescriptorCache<K, V>
where
    K: Hash + Eq + Send + Sync + fmt::Debug + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, capacity: u64) -> Self {
        DescriptorCache {
            name: name.into(),
            inner: Cache::new(capacity),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.get(key)
    }

    /// Return the cached entry, or run `loader` and cache its result.
    /// Loader errors are returned and nothing is cached.
    pub fn get_or_load<E>(
        &self,
        key: K,
        loader: impl FnOnce(&K) -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(cached) = self.inner.get(&key) {
            return Ok(cached);
        }
        let value = Arc::new(loader(&key)?);
        tracing::debug!(cache = %self.name, key = ?key, "descriptor loaded");
        self.inner.insert(key, Arc::clone(&value));
        Ok(value)
    }

    /// Reload `key`, trying `loader` up to `attempts` times.
    ///
    /// When every attempt fails and an older entry is cached, the older
    /// entry is returned with a consistency warning instead of the error.
    pub fn refresh<E: fmt::Display>(
        &self,
        key: K,
        attempts: usize,
        mut loader: impl FnMut(&K) -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match loader(&key) {
                Ok(value) => {
                    let value = Arc::new(value);
                    self.inner.insert(key, Arc::clone(&value));
                    return Ok(value);
                }
                Err(e) if attempt < attempts => {
                    tracing::debug!(cache = %self.name, key = ?key, attempt, error = %e, "reload failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    return match self.inner.get(&key) {
                        Some(stale) => {
                            tracing::warn!(
                                cache = %self.name,
                                key = ?key,
                                attempts,
                                error = %e,
                                "could not load the latest version; using the cached one"
                            );
                            Ok(stale)
                        }
                        None => Err(e),
                    };
                }
            }
        }
    }

    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

impl<K, V> fmt::Debug for DescriptorCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn loads_once_then_serves_cached() {
        let cache: DescriptorCache<i64, String> = DescriptorCache::new("test", 10);
        let calls = Cell::new(0);
        let load = |k: &i64| {
            calls.set(calls.get() + 1);
            Ok::<_, String>(format!("descriptor {}", k))
        };
        assert_eq!(*cache.get_or_load(1, load).unwrap(), "descriptor 1");
        assert_eq!(*cache.get_or_load(1, load).unwrap(), "descriptor 1");
        assert_eq!(calls.get(), 1);

        cache.invalidate(&1);
        assert!(cache.get(&1).is_none());
        cache.get_or_load(1, load).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn loader_errors_are_not_cached() {
        let cache: DescriptorCache<i64, String> = DescriptorCache::new("test", 10);
        let err = cache
            .get_or_load(5, |_| Err::<String, _>("offline".to_string()))
            .unwrap_err();
        assert_eq!(err, "offline");
        assert!(cache.get(&5).is_none());
    }

    #[test]
    fn refresh_retries_then_falls_back_to_stale_entry() {
        let cache: DescriptorCache<i64, String> = DescriptorCache::new("test", 10);
        cache
            .get_or_load(1, |_| Ok::<_, String>("v1".to_string()))
            .unwrap();

        let attempts = Cell::new(0);
        let value = cache
            .refresh(1, 3, |_| {
                attempts.set(attempts.get() + 1);
                Err::<String, _>("version conflict".to_string())
            })
            .unwrap();
        assert_eq!(*value, "v1");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn refresh_without_cached_entry_reports_the_error() {
        let cache: DescriptorCache<i64, String> = DescriptorCache::new("test", 10);
        let err = cache
            .refresh(1, 2, |_| Err::<String, _>("version conflict".to_string()))
            .unwrap_err();
        assert_eq!(err, "version conflict");
    }

    #[test]
    fn refresh_replaces_the_entry_on_success() {
        let cache: DescriptorCache<i64, String> = DescriptorCache::new("test", 10);
        cache
            .get_or_load(1, |_| Ok::<_, String>("v1".to_string()))
            .unwrap();
        let attempt = Cell::new(0);
        let value = cache
            .refresh(1, 2, |_| {
                attempt.set(attempt.get() + 1);
                if attempt.get() == 1 {
                    Err("busy".to_string())
                } else {
                    Ok("v2".to_string())
                }
            })
            .unwrap();
        assert_eq!(*value, "v2");
        assert_eq!(*cache.get(&1).unwrap(), "v2");
    }
}
