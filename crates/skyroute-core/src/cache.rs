use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Memo table for one derived-view category.
///
/// Holds at most `capacity` entries between selection changes. When
/// [`BoundedCache::enforce_bound`] finds more than that, the whole table is
/// dropped rather than evicting single entries.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    category: &'static str,
    capacity: usize,
    entries: HashMap<K, Arc<V>>,
    clears: u64,
}

impl<K: Eq + Hash, V> BoundedCache<K, V> {
    pub fn new(category: &'static str, capacity: usize) -> Self {
        Self {
            category,
            capacity,
            entries: HashMap::new(),
            clears: 0,
        }
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of wholesale clears so far.
    pub fn clears(&self) -> u64 {
        self.clears
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_or_insert_with<F>(&mut self, key: K, compute: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        Arc::clone(
            self.entries
                .entry(key)
                .or_insert_with(|| Arc::new(compute())),
        )
    }

    /// Clears the table if it holds more than `capacity` entries.
    /// Returns true when a clear happened.
    pub fn enforce_bound(&mut self) -> bool {
        if self.entries.len() <= self.capacity {
            return false;
        }
        log::debug!(
            "Clearing derived-view cache category={} size={} capacity={}",
            self.category,
            self.entries.len(),
            self.capacity
        );
        self.entries.clear();
        self.clears += 1;
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memoizes() {
        let mut cache: BoundedCache<u32, String> = BoundedCache::new("test", 2);
        let mut calls = 0;
        let a = cache.get_or_insert_with(1, || {
            calls += 1;
            "one".to_string()
        });
        let b = cache.get_or_insert_with(1, || {
            calls += 1;
            "uno".to_string()
        });
        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_wholesale_clear_above_capacity() {
        let mut cache: BoundedCache<u32, u32> = BoundedCache::new("test", 2);
        cache.get_or_insert_with(1, || 1);
        cache.get_or_insert_with(2, || 2);
        assert!(!cache.enforce_bound());
        assert_eq!(cache.len(), 2);

        cache.get_or_insert_with(3, || 3);
        assert!(cache.enforce_bound());
        assert!(cache.is_empty());
        assert_eq!(cache.clears(), 1);
    }
}
