//! Cachevine keeps cached query results consistent with the records they were computed from.
//!
//! # Introduction
//! **Cachevine** is a flush-list based cache invalidation engine. Every cached query result
//! registers itself against the *flush keys* of every record it depends on. Once a record
//! changes, the engine walks this reverse-dependency graph and deletes every cached artifact
//! which is transitively reachable from the changed record - without ever flushing the cache
//! wholesale.
//!
//! The engine itself is deliberately small and only consists of three parts:
//! * **Key derivation** which turns stable record identities into the three key namespaces
//!   being used (object keys, query keys and flush keys). See [keys](crate::keys).
//! * **Flush-list store backends** which persist and mutate the reverse-dependency graph.
//!   A generic backend can run on top of any store offering multi-key get/set/delete. A
//!   Redis based backend uses native set operations for conflict-free merges. A no-op
//!   backend drops all registrations in case invalidation is intentionally disabled.
//!   See [backend](crate::backend).
//! * **The invalidation orchestrator** which implements the write path
//!   ([cache_objects](crate::invalidator::Invalidator::cache_objects)) and the cascading
//!   read path ([invalidate_objects](crate::invalidator::Invalidator::invalidate_objects)).
//!   See [invalidator](crate::invalidator).
//!
//! # Features
//! * **100% Async/Await** - all backend interactions build upon [tokio](https://tokio.rs/)
//!   and async/await primitives as provided by Rust. The engine performs no locking of its
//!   own and keeps no state between calls - all durable state lives in the backing store.
//! * **Batched graph updates** - each registration or invalidation results in a minimal
//!   number of round trips to the store (one batched merge on the write path, one batched
//!   read per expansion level and two batched deletes on the invalidation path).
//! * **Pluggable backends** - the store is hidden behind a small trait with three batch
//!   operations, so anything from an in-process map to a Redis cluster can carry the graph.
//! * **Explicit wiring** - the engine is assembled once at startup via a
//!   [Builder](builder::Builder) and passed around as an `Arc`. There is no global mutable
//!   singleton and no runtime discovery of client handles.
//!
//! # Example
//! ```
//! use cachevine::backend::MemoryStore;
//! use cachevine::builder::Builder;
//! use cachevine::invalidator::{Cacheable, ModelFamily};
//! use cachevine::keys::KeyFactory;
//!
//! struct User {
//!     id: u32,
//!     keys: KeyFactory,
//! }
//!
//! impl Cacheable for User {
//!     fn cache_key(&self) -> String {
//!         format!("user:{}", self.id)
//!     }
//!
//!     fn flush_key(&self) -> String {
//!         self.keys.flush_key(&self.cache_key()).unwrap()
//!     }
//!
//!     fn cache_keys(&self) -> Vec<String> {
//!         vec![self.keys.object_key(&self.cache_key(), None).unwrap()]
//!     }
//!
//!     fn flush_keys(&self) -> Vec<String> {
//!         vec![self.flush_key()]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let invalidator = Builder::new().generic_backend(MemoryStore::new()).build()?;
//!
//!     let model = ModelFamily::new("app.user");
//!     let users = [User {
//!         id: 42,
//!         keys: invalidator.keys().clone(),
//!     }];
//!
//!     // Once a query has been computed and cached, register its dependencies...
//!     let query_key = invalidator.keys().object_key("q:recent-users", None)?;
//!     let query_flush = invalidator.keys().flush_key("q:recent-users")?;
//!     invalidator
//!         .cache_objects(&model, &users, &query_key, &query_flush)
//!         .await?;
//!
//!     // ...and once a record changes, everything depending on it is invalidated.
//!     invalidator.invalidate_objects(&users, false, Some(&model)).await?;
//!     Ok(())
//! }
//! ```
#![deny(
    warnings,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
use simplelog::{format_description, ConfigBuilder, LevelFilter, SimpleLogger};
use std::sync::Once;

pub mod backend;
pub mod builder;
pub mod config;
pub mod invalidator;
pub mod keys;

/// Initializes the logging system.
///
/// Note that most probably the simplest way is to use a [Builder](builder::Builder) to set up the
/// engine, which will also set up logging if enabled.
pub fn init_logging() {
    static INIT_LOGGING: Once = Once::new();

    // We need to do this as otherwise the integration tests might crash as the logging system
    // is initialized several times...
    INIT_LOGGING.call_once(|| {
        if let Err(error) = SimpleLogger::init(
            LevelFilter::Debug,
            ConfigBuilder::new()
                .set_time_format_custom(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
                ))
                .set_thread_level(LevelFilter::Trace)
                .set_target_level(LevelFilter::Error)
                .set_location_level(LevelFilter::Trace)
                .build(),
        ) {
            panic!("Failed to initialize logging system: {}", error);
        }
    });
}

#[cfg(test)]
mod tests {
    // The logging setup is Once-guarded, so repeated initialization must not panic
    // even when several tests touch it.
    #[test]
    fn logging_can_be_initialized_repeatedly() {
        super::init_logging();
        super::init_logging();
    }
}

#[cfg(test)]
mod testing {
    /// Executes async code within a single threaded tokio runtime.
    pub fn test_async<F: std::future::Future>(future: F) {
        use tokio::runtime;

        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let _ = rt.block_on(future);
    }
}
