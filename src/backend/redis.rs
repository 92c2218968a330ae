//! Provides the set-union-native backend built on Redis.
//!
//! Redis offers exactly the primitives a flush-list store wants: `SADD` atomically adds a
//! member to a set, `SUNION` computes the union across many sets in one round trip and
//! `DEL` removes a batch of keys. Merges therefore never race: each member is added by
//! one atomic command inside a single non-transactional pipeline, so concurrently merging
//! writers can interleave freely without losing members.
//!
//! The connection is handed over explicitly at construction time. There is no discovery
//! of client handles hidden inside some configured cache object - if the connection
//! cannot be established, [RedisBackend::connect] fails immediately with a configuration
//! error.
use std::collections::{HashMap, HashSet};

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::backend::FlushBackend;

/// A [FlushBackend] storing each flush list as a native Redis set.
pub struct RedisBackend {
    connection: MultiplexedConnection,
}

impl RedisBackend {
    /// Connects the backend using the given client.
    ///
    /// Fails fast if no connection can be established - a broken store configuration
    /// should surface at startup, not during the first invalidation.
    pub async fn connect(client: redis::Client) -> anyhow::Result<Self> {
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .context("Failed to connect to redis for the flush-list store.")?;

        Ok(RedisBackend { connection })
    }

    /// Connects the backend using a redis URL like `redis://127.0.0.1:6379/0`.
    pub async fn connect_url(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)
            .with_context(|| format!("Invalid redis URL for the flush-list store: {}", url))?;

        RedisBackend::connect(client).await
    }
}

#[async_trait]
impl FlushBackend for RedisBackend {
    async fn read_many(
        &self,
        keys: &[String],
    ) -> anyhow::Result<HashMap<String, HashSet<String>>> {
        let keys = sanitize_batch(keys);
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut pipe = redis::pipe();
        for key in &keys {
            let _ = pipe.smembers(key);
        }

        let mut connection = self.connection.clone();
        let lists: Vec<Vec<String>> = pipe
            .query_async(&mut connection)
            .await
            .context("Failed to read flush lists from redis.")?;

        let mut result = HashMap::new();
        for (key, members) in keys.into_iter().zip(lists) {
            if !members.is_empty() {
                let _ = result.insert(key, members.into_iter().collect());
            }
        }

        Ok(result)
    }

    async fn merge(&self, additions: HashMap<String, HashSet<String>>) -> anyhow::Result<()> {
        let mut pipe = redis::pipe();
        let mut commands = 0;
        for (key, members) in additions {
            let key = sanitize_key(&key);
            if key.is_empty() {
                continue;
            }

            for member in members {
                let _ = pipe.sadd(&key, member).ignore();
                commands += 1;
            }
        }

        if commands == 0 {
            return Ok(());
        }

        let mut connection = self.connection.clone();
        pipe.query_async::<_, ()>(&mut connection)
            .await
            .context("Failed to merge members into flush lists in redis.")?;

        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> anyhow::Result<()> {
        let keys = sanitize_batch(keys);
        if keys.is_empty() {
            return Ok(());
        }

        let mut connection = self.connection.clone();
        connection
            .del::<_, ()>(keys)
            .await
            .context("Failed to delete keys from redis.")?;

        Ok(())
    }

    async fn read_union(&self, keys: &[String]) -> anyhow::Result<HashSet<String>> {
        let keys = sanitize_batch(keys);
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let mut connection = self.connection.clone();
        let members: Vec<String> = connection
            .sunion(keys)
            .await
            .context("Failed to compute the union of flush lists in redis.")?;

        Ok(members.into_iter().collect())
    }

    fn safe_key(&self, key: &str) -> String {
        sanitize_key(key)
    }
}

/// Sanitizes a single key for the redis transport.
///
/// A key the transport would reject (whitespace or control characters) becomes the empty
/// sentinel and a warning is emitted - it must never reach the wire.
fn sanitize_key(key: &str) -> String {
    if key.contains(char::is_whitespace) || key.contains(char::is_control) {
        log::warn!("BAD KEY: {:?}", key);
        String::new()
    } else {
        key.to_owned()
    }
}

/// Sanitizes a batch of keys, skipping every key the transport would reject.
fn sanitize_batch(keys: &[String]) -> Vec<String> {
    keys.iter()
        .map(|key| sanitize_key(key))
        .filter(|key| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_keys_pass_unchanged() {
        assert_eq!(sanitize_key("clean-key"), "clean-key");
        assert_eq!(sanitize_key("flush:cache:user:42"), "flush:cache:user:42");
    }

    #[test]
    fn unsafe_keys_become_the_empty_sentinel() {
        assert_eq!(sanitize_key("spaced key"), "");
        assert_eq!(sanitize_key("multi\nline"), "");
        assert_eq!(sanitize_key("tabbed\tkey"), "");
        assert_eq!(sanitize_key("null\u{0}byte"), "");
    }

    #[test]
    fn sanitizing_a_batch_skips_unsafe_keys() {
        let keys = vec![
            "clean-key".to_owned(),
            "spaced key".to_owned(),
            "flush:cache:user:42".to_owned(),
            "multi\nline".to_owned(),
        ];

        assert_eq!(
            sanitize_batch(&keys),
            vec!["clean-key".to_owned(), "flush:cache:user:42".to_owned()]
        );
    }
}
