//! Caching layer: key-value backends and the read-through wrapper.
//!
//! ## Pieces
//!
//! - [`CacheStore`]: the remote key-value capability (`GET`, `SET [EX]`,
//!   `EXISTS`, `DEL`, `FLUSHDB`), implemented by [`MemoryStore`] and [`RedisStore`].
//! - [`KeyNamespace`]: composes physical keys as `{prefix}:{version}:{key}` so
//!   deployments and schema versions sharing one server do not collide.
//! - [`Cache`]: namespace + store + default expiry, with JSON encoding and
//!   per-request [`CacheLog`] recording.
//! - [`ReadThrough`]: single-flight get-or-compute over a [`Cache`].
//!
//! Expiry and eviction under memory pressure belong to the backend.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

mod log;
mod memory;
mod read_through;
mod redis;

pub use log::{CacheLog, CacheOp, CacheOpKind, Outcome};
pub use memory::MemoryStore;
pub use read_through::ReadThrough;
pub use redis::RedisStore;

/// Errors produced by the caching layer.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Redis pool setup failed: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),

    #[error("cache {op} timed out")]
    Timeout { op: &'static str },

    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode cached value for {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Boxed future returned by [`CacheStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// A remote key-value store holding opaque byte values.
///
/// Keys passed to a store are already physical (namespaced). Implementations
/// must be `Send + Sync`; one store is shared by every request.
pub trait CacheStore: Send + Sync {
    /// Returns the value under `key`, or `None` if absent or expired.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>>;

    /// Stores `value` under `key`, expiring after `ttl` when given.
    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Option<Duration>)
    -> StoreFuture<'a, ()>;

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    /// Removes `key`; returns `true` if a live entry was removed.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    /// Removes every key in the store's logical database.
    fn clear(&self) -> StoreFuture<'_, ()>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Physical key composition: `{prefix}:{version}:{key}`.
///
/// # Examples
///
/// ```
/// use larder::cache::KeyNamespace;
///
/// assert_eq!(KeyNamespace::default().make_key("recipes"), ":1:recipes");
/// assert_eq!(KeyNamespace::new("cookbook", 2).make_key("recipes"), "cookbook:2:recipes");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: String,
    version: u32,
}

impl KeyNamespace {
    pub fn new(prefix: impl Into<String>, version: u32) -> Self {
        Self {
            prefix: prefix.into(),
            version,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn make_key(&self, key: &str) -> String {
        format!("{}:{}:{}", self.prefix, self.version, key)
    }
}

impl Default for KeyNamespace {
    fn default() -> Self {
        Self::new("", 1)
    }
}

/// A namespaced, JSON-encoding view over a [`CacheStore`].
///
/// Every call records the operation and its physical key into the given
/// [`CacheLog`]. Cloning is cheap; clones share the store.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    namespace: KeyNamespace,
    ttl: Option<Duration>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.store.backend())
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Cache {
    /// `ttl` is the expiry applied to every [`set`](Self::set); `None` keeps
    /// entries until they are cleared.
    pub fn new(store: Arc<dyn CacheStore>, namespace: KeyNamespace, ttl: Option<Duration>) -> Self {
        Self {
            store,
            namespace,
            ttl,
        }
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Reads and decodes the value under the logical `key`.
    ///
    /// # Errors
    ///
    /// [`CacheError::Decode`] if a value is present but is not a valid `T`;
    /// any backend error otherwise.
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        log: &CacheLog,
    ) -> Result<Option<T>, CacheError> {
        let physical = self.namespace.make_key(key);
        log.record(CacheOpKind::Get, physical.as_str());
        let Some(bytes) = self.store.get(&physical).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Decode {
                key: physical,
                source,
            })
    }

    /// Encodes `value` and stores it under the logical `key` with the default expiry.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        log: &CacheLog,
    ) -> Result<(), CacheError> {
        let physical = self.namespace.make_key(key);
        let bytes = serde_json::to_vec(value).map_err(|source| CacheError::Encode {
            key: physical.clone(),
            source,
        })?;
        log.record(CacheOpKind::Set, physical.as_str());
        self.store.set(&physical, bytes, self.ttl).await
    }

    pub async fn contains(&self, key: &str, log: &CacheLog) -> Result<bool, CacheError> {
        let physical = self.namespace.make_key(key);
        log.record(CacheOpKind::Exists, physical.as_str());
        self.store.exists(&physical).await
    }

    pub async fn delete(&self, key: &str, log: &CacheLog) -> Result<bool, CacheError> {
        let physical = self.namespace.make_key(key);
        log.record(CacheOpKind::Delete, physical.as_str());
        self.store.delete(&physical).await
    }

    /// Clears the whole backing store, not just this namespace.
    pub async fn clear(&self, log: &CacheLog) -> Result<(), CacheError> {
        log.record(CacheOpKind::Clear, "*");
        self.store.clear().await?;
        tracing::info!(backend = self.store.backend(), "cache cleared");
        Ok(())
    }
}
