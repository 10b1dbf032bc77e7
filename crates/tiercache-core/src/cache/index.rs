//! Reverse-lookup index from a label (dependency or tag) to cache keys.
//!
//! The manager keeps one `KeyIndex` for dependencies and one for tags. Both
//! must agree with the entry store: a key sits in a label's bucket exactly when
//! the entry declares that label. Empty buckets are pruned.

use rustc_hash::{FxHashMap, FxHashSet};

/// Label → keys map with bucket pruning.
#[derive(Debug, Default, Clone)]
pub struct KeyIndex {
    buckets: FxHashMap<String, FxHashSet<String>>,
}

impl KeyIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key` under every label.
    pub fn insert_all<'a, I>(&mut self, key: &str, labels: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for label in labels {
            self.buckets
                .entry(label.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    /// Removes `key` from every listed label, pruning buckets left empty.
    pub fn remove_all<'a, I>(&mut self, key: &str, labels: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for label in labels {
            if let Some(bucket) = self.buckets.get_mut(label) {
                bucket.remove(key);
                if bucket.is_empty() {
                    self.buckets.remove(label);
                }
            }
        }
    }

    /// Keys currently under `label`, sorted.
    #[must_use]
    pub fn keys(&self, label: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .buckets
            .get(label)
            .map(|bucket| bucket.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    /// Drops a bucket outright, returning what it held.
    pub fn remove_bucket(&mut self, label: &str) -> Option<FxHashSet<String>> {
        self.buckets.remove(label)
    }

    /// Whether a bucket exists for `label`.
    #[must_use]
    pub fn contains_label(&self, label: &str) -> bool {
        self.buckets.contains_key(label)
    }

    /// Whether `key` is listed under `label`.
    #[must_use]
    pub fn contains(&self, label: &str, key: &str) -> bool {
        self.buckets
            .get(label)
            .is_some_and(|bucket| bucket.contains(key))
    }

    /// Number of non-empty buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the index has no buckets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Iterates over `(label, keys)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FxHashSet<String>)> {
        self.buckets.iter()
    }

    /// Removes every bucket.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut index = KeyIndex::new();
        index.insert_all("a", &labels(&["user:1", "user:2"]));
        index.insert_all("b", &labels(&["user:1"]));

        assert_eq!(index.keys("user:1"), vec!["a", "b"]);
        assert_eq!(index.keys("user:2"), vec!["a"]);
        assert!(index.keys("user:3").is_empty());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_remove_prunes_empty_buckets() {
        let mut index = KeyIndex::new();
        index.insert_all("a", &labels(&["t1", "t2"]));
        index.insert_all("b", &labels(&["t1"]));

        index.remove_all("a", &labels(&["t1", "t2"]));

        assert!(index.contains("t1", "b"));
        assert!(!index.contains("t1", "a"));
        assert!(!index.contains_label("t2"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_unknown_label_is_noop() {
        let mut index = KeyIndex::new();
        index.insert_all("a", &labels(&["t1"]));

        index.remove_all("a", &labels(&["missing"]));

        assert!(index.contains("t1", "a"));
    }

    #[test]
    fn test_remove_bucket_returns_members() {
        let mut index = KeyIndex::new();
        index.insert_all("a", &labels(&["dep"]));
        index.insert_all("b", &labels(&["dep"]));

        let removed = index.remove_bucket("dep").expect("bucket exists");

        assert_eq!(removed.len(), 2);
        assert!(index.is_empty());
        assert!(index.remove_bucket("dep").is_none());
    }
}
