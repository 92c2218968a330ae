//! Provides the backend used when invalidation is intentionally disabled.
//!
//! Some deployments bypass invalidation entirely (e.g. a full cache bypass mode or an
//! environment without a shared store worth maintaining). In this mode the write path
//! must still be callable without error - registrations are simply dropped, so the
//! dependency graph never grows and invalidation never cascades beyond the directly
//! supplied object keys. Reads and deletes keep working like the generic backend, so
//! deleting a record still removes its own cached entries.
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::backend::generic::{GenericBackend, KeyValueStore};
use crate::backend::FlushBackend;

/// A [FlushBackend] which drops all flush-list registrations.
pub struct NoopBackend<S: KeyValueStore> {
    inner: GenericBackend<S>,
}

impl<S: KeyValueStore> NoopBackend<S> {
    /// Creates a new backend on top of the given store.
    pub fn new(store: S) -> Self {
        NoopBackend {
            inner: GenericBackend::new(store),
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> FlushBackend for NoopBackend<S> {
    async fn read_many(
        &self,
        keys: &[String],
    ) -> anyhow::Result<HashMap<String, HashSet<String>>> {
        self.inner.read_many(keys).await
    }

    async fn merge(&self, additions: HashMap<String, HashSet<String>>) -> anyhow::Result<()> {
        log::debug!(
            "Invalidation is disabled - dropping registrations for {} flush lists.",
            additions.len()
        );

        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> anyhow::Result<()> {
        self.inner.delete_many(keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;
    use crate::testing::test_async;

    #[test]
    fn merges_are_dropped_but_reads_and_deletes_work() {
        test_async(async {
            let store = MemoryStore::new();
            let backend = NoopBackend::new(store.clone());

            let mut additions = HashMap::new();
            let _ = additions.insert(
                "flush:a".to_owned(),
                ["q1".to_owned()].into_iter().collect::<HashSet<_>>(),
            );
            backend.merge(additions).await.unwrap();

            assert!(store.is_empty());
            assert!(backend
                .read_many(&["flush:a".to_owned()])
                .await
                .unwrap()
                .is_empty());

            // Deletes still reach the store...
            backend.delete_many(&["flush:a".to_owned()]).await.unwrap();
            assert!(store.is_empty());
        });
    }
}
