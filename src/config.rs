//! Provides the settings consumed by the engine.
//!
//! The engine does not own a configuration facility of its own - loading settings from
//! files, environment variables or a framework is left to the embedding process. This
//! module merely defines the typed surface such a process has to fill in and hand over
//! to the [Builder](crate::builder::Builder) once at startup.

/// Determines how invalidation treats the creation of new records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateMode {
    /// Only per-record flush lists participate in invalidation. Creating a new record
    /// cannot invalidate any cached query (a new record is not yet a member of any flush
    /// list), so queries spanning the whole record family may serve stale results until
    /// their entries expire.
    RecordOnly,
    /// Additionally maintains one flush bucket per record family. Every cached query is
    /// registered under its family's bucket and creating a new record clears that bucket,
    /// so family-wide queries never miss newly created records.
    WholeModel,
}

impl Default for CreateMode {
    fn default() -> Self {
        CreateMode::RecordOnly
    }
}

/// The settings consumed (but not owned) by the engine.
///
/// The defaults yield readable, unhashed keys under the `cache` prefix with per-record
/// invalidation only - a sensible starting point for development. Production setups
/// typically enable [hash_keys](CacheSettings::hash_keys) to obtain fixed-length keys
/// which are safe for every store transport.
#[derive(Clone, Debug)]
pub struct CacheSettings {
    /// Global prefix folded into every derived key. Permits several applications (or
    /// several environments of one application) to share a store without key collisions.
    pub key_prefix: String,
    /// Reserved namespace prefix marking flush keys. Must not be empty - see
    /// [KeyFactory::new](crate::keys::KeyFactory::new).
    pub flush_prefix: String,
    /// If enabled, derived keys are passed through a fixed-length one-way hash.
    pub hash_keys: bool,
    /// Determines whether whole-model flush buckets are maintained.
    pub create_mode: CreateMode,
    /// If enabled, a secondary by-id object key is registered alongside each record's own
    /// key, so that lookups keyed purely by record identity are invalidated as well.
    pub fetch_by_id: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            key_prefix: "cache".to_owned(),
            flush_prefix: "flush:".to_owned(),
            hash_keys: false,
            create_mode: CreateMode::default(),
            fetch_by_id: false,
        }
    }
}
