//! Provides a builder which assembles the engine once at process startup.
//!
//! The builder replaces two patterns which are easy to get wrong: a module-level
//! singleton invalidator selected by hidden configuration, and runtime discovery of a
//! low-level store client by probing a configured cache object. Instead, the embedding
//! process supplies its settings and the concrete backend explicitly and receives an
//! `Arc<Invalidator>` which it passes to every call site that caches or invalidates.
//! Misconfiguration surfaces here, at startup, as an error - never later as a silently
//! missing invalidation.
//!
//! # Example
//! ```
//! use cachevine::backend::MemoryStore;
//! use cachevine::builder::Builder;
//! use cachevine::config::CacheSettings;
//!
//! # fn main() -> anyhow::Result<()> {
//! let invalidator = Builder::new()
//!     .settings(CacheSettings::default())
//!     .generic_backend(MemoryStore::new())
//!     .build()?;
//! # Ok(())
//! # }
//! ```
use std::sync::Arc;

use crate::backend::{FlushBackend, GenericBackend, KeyValueStore, NoopBackend, RedisBackend};
use crate::config::CacheSettings;
use crate::init_logging;
use crate::invalidator::Invalidator;

/// Assembles an [Invalidator] from settings and an explicitly chosen backend.
#[derive(Default)]
pub struct Builder {
    setup_logging: bool,
    settings: CacheSettings,
    backend: Option<Box<dyn FlushBackend>>,
}

impl Builder {
    /// Creates a new builder with default settings and no backend selected.
    pub fn new() -> Self {
        Builder::default()
    }

    /// Enables the automatic setup of the logging system.
    ///
    /// Using this, we properly initialize **simplelog** to log to stdout, which is all
    /// that is needed when running in a container.
    pub fn enable_logging(mut self) -> Self {
        self.setup_logging = true;
        self
    }

    /// Uses the given settings instead of the defaults.
    pub fn settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Selects the generic backend on top of the given store.
    pub fn generic_backend<S: KeyValueStore + 'static>(mut self, store: S) -> Self {
        self.backend = Some(Box::new(GenericBackend::new(store)));
        self
    }

    /// Selects the no-op backend on top of the given store - invalidation is disabled.
    pub fn noop_backend<S: KeyValueStore + 'static>(mut self, store: S) -> Self {
        self.backend = Some(Box::new(NoopBackend::new(store)));
        self
    }

    /// Selects the set-union-native backend using the given redis client.
    ///
    /// Fails with a configuration error if no connection can be established.
    pub async fn redis_backend(mut self, client: redis::Client) -> anyhow::Result<Self> {
        self.backend = Some(Box::new(RedisBackend::connect(client).await?));
        Ok(self)
    }

    /// Selects a custom backend implementation.
    pub fn custom_backend(mut self, backend: Box<dyn FlushBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Builds the invalidator.
    ///
    /// Fails with a configuration error if no backend was selected or if the key
    /// namespaces in the settings are inconsistent.
    pub fn build(self) -> anyhow::Result<Arc<Invalidator>> {
        if self.setup_logging {
            init_logging();
        }

        let backend = self.backend.ok_or_else(|| {
            anyhow::anyhow!(
                "No flush-list backend was configured. Select one via generic_backend, \
                 redis_backend or noop_backend."
            )
        })?;

        Ok(Arc::new(Invalidator::new(&self.settings, backend)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;

    #[test]
    fn building_without_a_backend_fails() {
        assert!(Builder::new().build().is_err());
    }

    #[test]
    fn building_with_inconsistent_namespaces_fails() {
        let mut settings = CacheSettings::default();
        settings.flush_prefix = String::new();

        assert!(Builder::new()
            .settings(settings)
            .generic_backend(MemoryStore::new())
            .build()
            .is_err());
    }

    #[test]
    fn building_with_a_backend_succeeds() {
        let invalidator = Builder::new()
            .generic_backend(MemoryStore::new())
            .build()
            .unwrap();

        assert!(invalidator.keys().is_flush_key("flush:cache:x"));
    }
}
