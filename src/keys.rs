//! Derives the key namespaces used throughout the engine.
//!
//! All keys handed to a flush-list backend come from one of three namespaces:
//! * **Object keys** identify one cached representation of a single record (e.g. "this
//!   record, this locale"). They are derived from a stable record identity.
//! * **Query keys** identify one cached query result. They are opaque to the engine and
//!   only ever stored as members of flush lists - most callers simply derive them like
//!   object keys from a stable query identity.
//! * **Flush keys** identify a dependency bucket: the set of things which must be
//!   invalidated once the record (or model) they represent changes. They live in a
//!   reserved namespace so that the expansion algorithm can tell a nested flush list
//!   apart from a terminal object key.
//!
//! The namespace distinction is load-bearing: [KeyFactory::new] therefore rejects
//! configurations in which the two namespaces could collapse into each other.
//!
//! Derivation is deterministic and free of I/O. When key hashing is enabled, derived keys
//! are passed through SHA-256 and rendered as hex. This yields fixed-length keys which are
//! safe for transports imposing length or character restrictions (e.g. memcached limits
//! keys to 250 bytes without whitespace). Disabling hashing keeps keys readable, which is
//! nice during development and in tests.
use sha2::{Digest, Sha256};

/// Derives object keys, flush keys and by-id keys from stable identities.
///
/// A factory is a small value object which is cheap to clone. The same factory (or at
/// least one with identical settings) has to be used by the engine and by the model layer
/// producing keys, as the graph only stays consistent if identical identities always map
/// to identical keys.
///
/// # Examples
/// ```
/// # use cachevine::keys::KeyFactory;
/// let keys = KeyFactory::new("cache", "flush:", false).unwrap();
///
/// assert_eq!(keys.object_key("user:42", None).unwrap(), "cache:user:42");
/// assert_eq!(keys.object_key("user:42", Some("de")).unwrap(), "cache:user:42de");
/// assert_eq!(keys.flush_key("user:42").unwrap(), "flush:cache:user:42");
/// assert_eq!(keys.by_id_key("user:42").unwrap(), "cache:byid:user:42");
/// ```
#[derive(Clone, Debug)]
pub struct KeyFactory {
    prefix: String,
    flush_prefix: String,
    hash_keys: bool,
}

impl KeyFactory {
    /// Creates a new factory using the given global prefix and flush namespace prefix.
    ///
    /// Fails with a configuration error if the flush prefix is empty or if the global
    /// prefix itself starts with the flush prefix, as either would make object keys and
    /// flush keys indistinguishable.
    pub fn new(prefix: &str, flush_prefix: &str, hash_keys: bool) -> anyhow::Result<Self> {
        if flush_prefix.is_empty() {
            return Err(anyhow::anyhow!(
                "The flush namespace prefix must not be empty - \
                 flush keys would be indistinguishable from object keys."
            ));
        }
        if prefix.starts_with(flush_prefix) {
            return Err(anyhow::anyhow!(
                "The global key prefix '{}' lies within the flush namespace '{}'.",
                prefix,
                flush_prefix
            ));
        }

        Ok(KeyFactory {
            prefix: prefix.to_owned(),
            flush_prefix: flush_prefix.to_owned(),
            hash_keys,
        })
    }

    /// Derives the object key for the given record or query identity.
    ///
    /// If a locale is given, it is folded into the key so that each locale variant of a
    /// cached record obtains its own cache entry.
    pub fn object_key(&self, identity: &str, locale: Option<&str>) -> anyhow::Result<String> {
        self.derive(identity, locale)
    }

    /// Derives the flush key for the given record identity.
    ///
    /// This uses the same derivation as [object_key](KeyFactory::object_key) but wraps the
    /// result in the reserved flush namespace. A locale is never folded in, as a flush
    /// bucket covers all locale variants of a record at once.
    pub fn flush_key(&self, identity: &str) -> anyhow::Result<String> {
        Ok(format!(
            "{}{}",
            self.flush_prefix,
            self.derive(identity, None)?
        ))
    }

    /// Derives the secondary by-id object key for the given record identity.
    ///
    /// This key lives in a `byid:` sub-namespace of the object-key space, so it can never
    /// be mistaken for a flush key during expansion. It backs up lookups keyed purely by
    /// record identity and is therefore locale independent.
    pub fn by_id_key(&self, identity: &str) -> anyhow::Result<String> {
        if identity.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Cannot derive a by-id key from an empty identity."
            ));
        }

        self.derive(&format!("byid:{}", identity), None)
    }

    /// Determines if the given key lies within the flush namespace.
    ///
    /// This is the test the expansion algorithm uses to decide whether a discovered member
    /// is a nested flush list to keep expanding or a terminal object key to delete.
    pub fn is_flush_key(&self, key: &str) -> bool {
        key.starts_with(&self.flush_prefix)
    }

    /// Returns the reserved flush namespace prefix.
    pub fn flush_prefix(&self) -> &str {
        &self.flush_prefix
    }

    /// Computes the prefixed (and, if enabled, hashed) key for the given identity.
    fn derive(&self, identity: &str, locale: Option<&str>) -> anyhow::Result<String> {
        if identity.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Cannot derive a cache key from an empty identity."
            ));
        }

        let mut key = format!("{}:{}", self.prefix, identity);
        if let Some(locale) = locale {
            key.push_str(locale);
        }

        if self.hash_keys {
            Ok(hash(&key))
        } else {
            Ok(key)
        }
    }
}

/// Computes a fixed length one-way digest of the given key.
fn hash(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory(hash_keys: bool) -> KeyFactory {
        KeyFactory::new("cache", "flush:", hash_keys).unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let keys = factory(true);

        assert_eq!(
            keys.object_key("user:42", None).unwrap(),
            keys.object_key("user:42", None).unwrap()
        );
        assert_eq!(
            keys.flush_key("user:42").unwrap(),
            keys.flush_key("user:42").unwrap()
        );
        assert_ne!(
            keys.object_key("user:42", None).unwrap(),
            keys.object_key("user:43", None).unwrap()
        );
    }

    #[test]
    fn flush_keys_and_object_keys_never_collide() {
        for hash_keys in [false, true] {
            let keys = factory(hash_keys);

            for identity in ["user:42", "flush:user:42", "x", "byid:user:42"] {
                let object_key = keys.object_key(identity, None).unwrap();
                let flush_key = keys.flush_key(identity).unwrap();

                assert_ne!(object_key, flush_key);
                assert!(!keys.is_flush_key(&object_key));
                assert!(keys.is_flush_key(&flush_key));
                assert!(flush_key.starts_with(keys.flush_prefix()));
            }
        }
    }

    #[test]
    fn by_id_keys_stay_in_the_object_namespace() {
        for hash_keys in [false, true] {
            let keys = factory(hash_keys);
            let by_id = keys.by_id_key("user:42").unwrap();

            assert!(!keys.is_flush_key(&by_id));
            assert_ne!(by_id, keys.object_key("user:42", None).unwrap());
        }
    }

    #[test]
    fn locale_yields_distinct_object_keys_but_one_flush_key() {
        let keys = factory(true);

        assert_ne!(
            keys.object_key("user:42", Some("de")).unwrap(),
            keys.object_key("user:42", Some("en")).unwrap()
        );
        // Flush buckets are locale independent by contract...
        assert_eq!(
            keys.flush_key("user:42").unwrap(),
            keys.flush_key("user:42").unwrap()
        );
    }

    #[test]
    fn hashed_keys_have_a_fixed_length() {
        let keys = factory(true);

        let short = keys.object_key("u", None).unwrap();
        let long = keys
            .object_key("a rather long identity with spaces and\nnewlines", None)
            .unwrap();

        assert_eq!(short.len(), long.len());
        assert!(short.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn empty_identities_are_rejected() {
        let keys = factory(false);

        assert!(keys.object_key("", None).is_err());
        assert!(keys.object_key("   ", None).is_err());
        assert!(keys.flush_key("").is_err());
        assert!(keys.by_id_key(" ").is_err());
    }

    #[test]
    fn misconfigured_namespaces_are_rejected() {
        assert!(KeyFactory::new("cache", "", false).is_err());
        assert!(KeyFactory::new("flush:cache", "flush:", false).is_err());
    }
}
