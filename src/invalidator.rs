//! Provides the orchestrator which maintains and walks the reverse-dependency graph.
//!
//! The engine keeps one *flush list* per record (and optionally per record family): the
//! set of keys which must be invalidated once that record changes. Members can be cached
//! query results, cached object representations or other flush keys - the latter is what
//! makes invalidation cascade across relations.
//!
//! Two operations cover the whole lifecycle:
//! * [cache_objects](Invalidator::cache_objects) is invoked once per cached query result,
//!   at the moment it is computed and stored. It registers the query (and the objects it
//!   contains) in all affected flush lists with a single batched merge.
//! * [invalidate_objects](Invalidator::invalidate_objects) is invoked once per write to
//!   the record store. It computes the transitive closure of everything depending on the
//!   changed records via [expand_flush_lists](Invalidator::expand_flush_lists) and then
//!   deletes the affected object keys and clears the affected flush lists.
//!
//! The orchestrator holds no state between calls - all durable state lives in the
//! [backend](crate::backend). It is constructed once at startup (see
//! [Builder](crate::builder::Builder)) and shared as an `Arc` with every call site that
//! caches or invalidates.
use std::collections::{HashMap, HashSet};

use crate::backend::FlushBackend;
use crate::config::{CacheSettings, CreateMode};
use crate::keys::KeyFactory;

/// The surface the engine consumes from the model layer.
///
/// Implementations derive their keys through the same [KeyFactory] the engine was built
/// with - the graph only stays consistent if identical records always map to identical
/// key strings.
pub trait Cacheable {
    /// Returns the stable identity of this record (e.g. `user:42`).
    ///
    /// Used to derive the secondary by-id key when fetch-by-id is enabled.
    fn cache_key(&self) -> String;

    /// Returns this record's own flush key.
    fn flush_key(&self) -> String;

    /// Returns all object keys under which this record is cached (e.g. one per locale).
    fn cache_keys(&self) -> Vec<String>;

    /// Returns all flush keys this record participates in: its own and those of all
    /// related records whose changes must cascade to this record.
    fn flush_keys(&self) -> Vec<String>;
}

/// Names a record family (a model) for whole-model invalidation.
#[derive(Clone, Debug)]
pub struct ModelFamily {
    name: String,
}

impl ModelFamily {
    /// Creates a family handle for the given stable name (e.g. `app.user`).
    pub fn new(name: impl Into<String>) -> Self {
        ModelFamily { name: name.into() }
    }

    /// Returns the stable name of this family.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the identity from which the family's flush key is derived.
    fn identity(&self) -> String {
        format!("m:{}", self.name)
    }
}

/// Registers cached queries in the dependency graph and cascades invalidations.
pub struct Invalidator {
    backend: Box<dyn FlushBackend>,
    keys: KeyFactory,
    create_mode: CreateMode,
    fetch_by_id: bool,
}

impl Invalidator {
    /// Creates a new invalidator from the given settings and backend.
    ///
    /// Fails with a configuration error if the key namespaces in the settings are
    /// inconsistent (see [KeyFactory::new]).
    pub fn new(settings: &CacheSettings, backend: Box<dyn FlushBackend>) -> anyhow::Result<Self> {
        let keys = KeyFactory::new(
            &settings.key_prefix,
            &settings.flush_prefix,
            settings.hash_keys,
        )?;

        Ok(Invalidator {
            backend,
            keys,
            create_mode: settings.create_mode,
            fetch_by_id: settings.fetch_by_id,
        })
    }

    /// Returns the key factory the engine derives its keys with.
    ///
    /// The model layer uses the same factory so that both sides agree on key strings.
    pub fn keys(&self) -> &KeyFactory {
        &self.keys
    }

    /// Derives the whole-model flush key for the given family.
    pub fn model_flush_key(&self, model: &ModelFamily) -> anyhow::Result<String> {
        self.keys.flush_key(&model.identity())
    }

    /// Registers a freshly cached query result in the dependency graph.
    ///
    /// `query_key` identifies the cached result itself, `query_flush` is the query's own
    /// flush bucket. Every object in the result set learns about the query, the query's
    /// bucket lists the query's cache entry, and each object is registered in the flush
    /// lists of its relations so that a change to a related record cascades here. All
    /// registrations are submitted as one batched merge.
    pub async fn cache_objects<T: Cacheable>(
        &self,
        model: &ModelFamily,
        objects: &[T],
        query_key: &str,
        query_flush: &str,
    ) -> anyhow::Result<()> {
        let mut flush_lists: HashMap<String, HashSet<String>> = HashMap::new();

        // Add this query to the flush list of each object. We include query_flush so
        // that other things can be cached against the query and still participate in
        // invalidation.
        for obj in objects {
            let key = obj.flush_key();
            log::debug!("Adding {} to {}.", query_flush, key);
            let _ = flush_lists
                .entry(key)
                .or_default()
                .insert(query_flush.to_owned());
        }
        let _ = flush_lists
            .entry(query_flush.to_owned())
            .or_default()
            .insert(query_key.to_owned());

        // Add this query to the flush list of the entire family, if enabled.
        let model_flush = self.model_flush_key(model)?;
        if self.create_mode == CreateMode::WholeModel {
            let _ = flush_lists
                .entry(model_flush.clone())
                .or_default()
                .insert(query_key.to_owned());
        }

        // Add each object to the flush lists of its relations.
        for obj in objects {
            let obj_flush = obj.flush_key();
            let by_id = if self.fetch_by_id {
                Some(self.keys.by_id_key(&obj.cache_key())?)
            } else {
                None
            };

            for key in obj.flush_keys() {
                if key == obj_flush || key == model_flush {
                    continue;
                }

                log::debug!("Related: adding {} to {}.", obj_flush, key);
                let entry = flush_lists.entry(key).or_default();
                let _ = entry.insert(obj_flush.clone());
                if let Some(by_id) = &by_id {
                    let _ = entry.insert(by_id.clone());
                }
            }
        }

        self.backend.merge(flush_lists).await
    }

    /// Invalidates everything depending on the given changed records.
    ///
    /// Computes the transitive closure over the flush-key graph and then deletes the
    /// affected object keys and clears the affected flush lists. Empty inputs are a
    /// normal no-op which never touches the backend. A cleared flush list simply ceases
    /// to exist until the next [cache_objects](Invalidator::cache_objects) re-populates
    /// it.
    pub async fn invalidate_objects<T: Cacheable>(
        &self,
        objects: &[T],
        is_new_instance: bool,
        model: Option<&ModelFamily>,
    ) -> anyhow::Result<()> {
        let obj_keys: HashSet<String> = objects.iter().flat_map(|obj| obj.cache_keys()).collect();
        let mut flush_keys: HashSet<String> =
            objects.iter().flat_map(|obj| obj.flush_keys()).collect();

        // A new record is not yet a member of any per-record flush list, but family-wide
        // queries are registered under the family's bucket - include it so they are
        // cleared as well.
        if self.create_mode == CreateMode::WholeModel && is_new_instance {
            if let Some(model) = model {
                let _ = flush_keys.insert(self.model_flush_key(model)?);
            }
        }

        if obj_keys.is_empty() || flush_keys.is_empty() {
            return Ok(());
        }

        let (obj_keys, flush_keys) = self.expand_flush_lists(obj_keys, flush_keys).await?;

        if !obj_keys.is_empty() {
            log::debug!("Deleting object keys: {:?}", obj_keys);
            let obj_keys: Vec<String> = obj_keys.into_iter().collect();
            self.backend.delete_many(&obj_keys).await?;
        }
        if !flush_keys.is_empty() {
            log::debug!("Clearing flush lists: {:?}", flush_keys);
            let flush_keys: Vec<String> = flush_keys.into_iter().collect();
            self.backend.delete_many(&flush_keys).await?;
        }

        Ok(())
    }

    /// Computes the transitive closure of keys affected by the given seeds.
    ///
    /// Breadth-first traversal over the flush-key graph: every member discovered in a
    /// flush list is either another flush key (kept for further expansion) or a terminal
    /// object/query key. Each round only re-reads the *newly* discovered flush keys, so
    /// cycles resolve to already visited keys and the traversal terminates.
    ///
    /// Returns the object keys to delete and the flush keys to clear.
    pub async fn expand_flush_lists(
        &self,
        obj_keys: HashSet<String>,
        flush_keys: HashSet<String>,
    ) -> anyhow::Result<(HashSet<String>, HashSet<String>)> {
        let mut obj_keys = obj_keys;
        let mut flush_keys = flush_keys;
        let mut frontier: Vec<String> = flush_keys.iter().cloned().collect();

        while !frontier.is_empty() {
            let mut discovered = HashSet::new();
            for member in self.backend.read_union(&frontier).await? {
                if !self.keys.is_flush_key(&member) {
                    let _ = obj_keys.insert(member);
                } else if !flush_keys.contains(&member) {
                    let _ = discovered.insert(member);
                }
            }

            if discovered.is_empty() {
                break;
            }

            log::debug!("Expansion of {:?} found {:?}.", frontier, discovered);
            frontier = discovered.iter().cloned().collect();
            flush_keys.extend(discovered);
        }

        Ok((obj_keys, flush_keys))
    }
}
