//! Provides the generic backend which runs on top of plain key-value store primitives.
//!
//! Most cache stores offer multi-key get, set and delete but no native set operations.
//! [GenericBackend] adapts any such store (abstracted as [KeyValueStore]) into a
//! [FlushBackend] by implementing merge as a read-modify-write cycle: fetch the current
//! lists, union in the additions, write everything back. The cycle is not atomic - if a
//! concurrent merge write-completes between our read and our write, its members are lost.
//! See the [module documentation](crate::backend) for why this tradeoff is acceptable.
//!
//! [MemoryStore] is a mutex-guarded in-process implementation of [KeyValueStore]. It backs
//! the test suite and is handy for single-process embedders which only need invalidation
//! semantics without an external store.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::backend::FlushBackend;

/// The primitives the generic backend requires from the underlying store.
///
/// This is the seam towards the actual storage engine (memory, disk, network), which is
/// outside the engine's scope. Implementations only have to provide batched access -
/// per-key atomicity or cross-key transactions are explicitly not required.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetches the stored value sets for all given keys.
    ///
    /// Keys without a value are simply absent from the result.
    async fn get_many(
        &self,
        keys: &[String],
    ) -> anyhow::Result<HashMap<String, HashSet<String>>>;

    /// Stores all given entries, replacing any previous values.
    async fn set_many(&self, entries: HashMap<String, HashSet<String>>) -> anyhow::Result<()>;

    /// Removes all given keys. Removing an absent key is a no-op.
    async fn delete_many(&self, keys: &[String]) -> anyhow::Result<()>;
}

/// A mutex-guarded in-process [KeyValueStore].
///
/// Cloning is cheap and yields a handle onto the same underlying map, so a store can be
/// handed to a backend while the embedder (or a test) keeps a handle for inspection.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, HashSet<String>>>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Returns the number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Determines if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Determines if a value is stored for the given key.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Returns the value set stored for the given key, if any.
    pub fn get(&self, key: &str) -> Option<HashSet<String>> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_many(
        &self,
        keys: &[String],
    ) -> anyhow::Result<HashMap<String, HashSet<String>>> {
        let entries = self.entries.lock().unwrap();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    async fn set_many(&self, entries: HashMap<String, HashSet<String>>) -> anyhow::Result<()> {
        let mut stored = self.entries.lock().unwrap();
        for (key, value) in entries {
            let _ = stored.insert(key, value);
        }

        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> anyhow::Result<()> {
        let mut stored = self.entries.lock().unwrap();
        for key in keys {
            let _ = stored.remove(key);
        }

        Ok(())
    }
}

/// Adapts a [KeyValueStore] into a [FlushBackend] via read-modify-write merges.
pub struct GenericBackend<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> GenericBackend<S> {
    /// Creates a new backend on top of the given store.
    pub fn new(store: S) -> Self {
        GenericBackend { store }
    }
}

#[async_trait]
impl<S: KeyValueStore> FlushBackend for GenericBackend<S> {
    async fn read_many(
        &self,
        keys: &[String],
    ) -> anyhow::Result<HashMap<String, HashSet<String>>> {
        self.store.get_many(keys).await
    }

    async fn merge(&self, additions: HashMap<String, HashSet<String>>) -> anyhow::Result<()> {
        if additions.is_empty() {
            return Ok(());
        }

        // Not atomic: a concurrent merge completing between this read and the write
        // below is overwritten. See the module documentation.
        let keys: Vec<String> = additions.keys().cloned().collect();
        let mut lists = self.store.get_many(&keys).await?;
        for (key, members) in additions {
            lists.entry(key).or_default().extend(members);
        }

        self.store.set_many(lists).await
    }

    async fn delete_many(&self, keys: &[String]) -> anyhow::Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        self.store.delete_many(keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_async;

    fn members(values: &[&str]) -> HashSet<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn merge_creates_and_extends_lists() {
        test_async(async {
            let store = MemoryStore::new();
            let backend = GenericBackend::new(store.clone());

            let mut additions = HashMap::new();
            let _ = additions.insert("flush:a".to_owned(), members(&["q1"]));
            backend.merge(additions).await.unwrap();

            let mut additions = HashMap::new();
            let _ = additions.insert("flush:a".to_owned(), members(&["q2"]));
            backend.merge(additions).await.unwrap();

            assert_eq!(store.get("flush:a").unwrap(), members(&["q1", "q2"]));
        });
    }

    #[test]
    fn read_many_omits_missing_keys() {
        test_async(async {
            let store = MemoryStore::new();
            let backend = GenericBackend::new(store);

            let mut additions = HashMap::new();
            let _ = additions.insert("flush:a".to_owned(), members(&["q1"]));
            backend.merge(additions).await.unwrap();

            let lists = backend
                .read_many(&["flush:a".to_owned(), "flush:missing".to_owned()])
                .await
                .unwrap();

            assert_eq!(lists.len(), 1);
            assert_eq!(lists["flush:a"], members(&["q1"]));
        });
    }

    #[test]
    fn read_union_flattens_all_lists() {
        test_async(async {
            let store = MemoryStore::new();
            let backend = GenericBackend::new(store);

            let mut additions = HashMap::new();
            let _ = additions.insert("flush:a".to_owned(), members(&["q1", "q2"]));
            let _ = additions.insert("flush:b".to_owned(), members(&["q2", "q3"]));
            backend.merge(additions).await.unwrap();

            let union = backend
                .read_union(&["flush:a".to_owned(), "flush:b".to_owned()])
                .await
                .unwrap();

            assert_eq!(union, members(&["q1", "q2", "q3"]));
        });
    }

    #[test]
    fn delete_many_is_idempotent() {
        test_async(async {
            let store = MemoryStore::new();
            let backend = GenericBackend::new(store.clone());

            let mut additions = HashMap::new();
            let _ = additions.insert("flush:a".to_owned(), members(&["q1"]));
            backend.merge(additions).await.unwrap();

            let keys = vec!["flush:a".to_owned(), "flush:absent".to_owned()];
            backend.delete_many(&keys).await.unwrap();
            backend.delete_many(&keys).await.unwrap();

            assert!(store.is_empty());
        });
    }

    #[test]
    fn safe_key_accepts_everything() {
        let backend = GenericBackend::new(MemoryStore::new());

        assert_eq!(backend.safe_key("spaced key"), "spaced key");
        assert_eq!(backend.safe_key("multi\nline"), "multi\nline");
    }
}
