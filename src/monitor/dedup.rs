//! Bounded set of seen transaction hashes.

use std::num::NonZeroUsize;

use lru::LruCache;

/// Remembers the most recent `capacity` hashes; older ones are forgotten.
pub struct DedupSet {
    seen: LruCache<String, ()>,
}

impl DedupSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: LruCache::new(capacity),
        }
    }

    /// Record `hash`. Returns `true` if it was not already present.
    pub fn insert(&mut self, hash: &str) -> bool {
        if self.seen.get(hash).is_some() {
            return false;
        }
        self.seen.put(hash.to_string(), ());
        true
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.seen.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl std::fmt::Debug for DedupSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupSet")
            .field("len", &self.seen.len())
            .field("capacity", &self.seen.cap())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_first_sighting() {
        let mut set = DedupSet::new(4);
        assert!(set.insert("aa"));
        assert!(!set.insert("aa"));
        assert!(set.contains("aa"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_oldest_hash_evicted_at_capacity() {
        let mut set = DedupSet::new(2);
        set.insert("a");
        set.insert("b");
        set.insert("c");
        assert!(!set.contains("a"));
        assert!(set.contains("b"));
        assert!(set.contains("c"));
    }

    #[test]
    fn test_zero_capacity_still_dedups_latest() {
        let mut set = DedupSet::new(0);
        assert!(set.insert("a"));
        assert!(!set.insert("a"));
    }
}
