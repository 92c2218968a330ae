//! Provides the pluggable stores which persist the reverse-dependency graph.
//!
//! A flush-list backend maintains the mapping `flush key -> set of member keys` on which
//! the whole engine operates. The interface is deliberately tiny - three batch operations
//! suffice to register dependencies and to walk and clear the graph:
//! * [read_many](FlushBackend::read_many) fetches a batch of flush lists.
//! * [merge](FlushBackend::merge) adds members to a batch of flush lists (union
//!   semantics, lists are created on demand).
//! * [delete_many](FlushBackend::delete_many) removes a batch of keys - both terminal
//!   object keys and entire flush lists.
//!
//! # Variants
//! * [GenericBackend] runs on top of any store offering plain multi-key get/set/delete
//!   (see [KeyValueStore]). Its merge is a read-modify-write cycle and therefore not
//!   atomic: two concurrent merges into the same key can lose one writer's members. This
//!   is an accepted tradeoff for stores without native set operations - over-invalidation
//!   is harmless, and a lost registration is healed by the next write cycle.
//! * [RedisBackend] uses native set operations (`SADD`, `SUNION`, `DEL`). Each member is
//!   added by one atomic command inside a non-transactional pipeline, so concurrent
//!   merges never lose members.
//! * [NoopBackend] drops all registrations. Used when invalidation is intentionally
//!   disabled: reads and deletes still work, but the graph simply never grows.
//!
//! # Failure semantics
//! Backend operations surface every I/O failure to the caller - nothing is swallowed and
//! nothing is retried here. Retries, if desired at all, belong to the store's transport
//! layer. Since clearing flush lists is idempotent and over-invalidation is safe, a
//! partially applied batch is acceptable; silently *missing* an invalidation is the only
//! real risk, which is exactly why errors must propagate.
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

pub mod generic;
pub mod noop;
pub mod redis;

pub use self::generic::{GenericBackend, KeyValueStore, MemoryStore};
pub use self::noop::NoopBackend;
pub use self::redis::RedisBackend;

/// A store which persists and mutates flush lists.
///
/// All operations treat their key batches as sets: no ordering is guaranteed between
/// independent keys within one call.
#[async_trait]
pub trait FlushBackend: Send + Sync {
    /// Reads the current members of each of the given flush lists.
    ///
    /// Keys without a list are simply absent from the result - this is not an error.
    async fn read_many(
        &self,
        keys: &[String],
    ) -> anyhow::Result<HashMap<String, HashSet<String>>>;

    /// Adds the given members to each key's flush list, creating lists as needed.
    ///
    /// Whether members contributed by a concurrent caller can be lost depends on the
    /// variant - see the module documentation.
    async fn merge(&self, additions: HashMap<String, HashSet<String>>) -> anyhow::Result<()>;

    /// Removes the given keys (and thereby their lists) entirely.
    ///
    /// Deleting an absent key is a no-op, not an error.
    async fn delete_many(&self, keys: &[String]) -> anyhow::Result<()>;

    /// Reads the union of all members across the given flush lists.
    ///
    /// This is what the expansion algorithm consumes. Backends with a native union query
    /// override this - the default simply flattens [read_many](FlushBackend::read_many).
    async fn read_union(&self, keys: &[String]) -> anyhow::Result<HashSet<String>> {
        let mut members = HashSet::new();
        for list in self.read_many(keys).await?.into_values() {
            members.extend(list);
        }

        Ok(members)
    }

    /// Sanitizes a key for transports which forbid certain characters.
    ///
    /// The default accepts every key unchanged. A backend with a restricted transport
    /// returns an empty string for an unacceptable key (and emits a warning) - callers
    /// must skip such empty sentinels instead of sending them to the store.
    fn safe_key(&self, key: &str) -> String {
        key.to_owned()
    }
}
