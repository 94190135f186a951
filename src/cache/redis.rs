//! Redis cache backend.

use std::time::Duration;

use deadpool_redis::{Config, Pool, PoolConfig, Runtime, Timeouts};
use redis::{Cmd, FromRedisValue};

use super::{CacheError, CacheStore, StoreFuture};

const POOL_SIZE: usize = 16;

/// Upper bound on one command, including waiting for a connection.
const OP_TIMEOUT: Duration = Duration::from_secs(2);

/// A [`CacheStore`] backed by a Redis server.
///
/// The logical database is chosen by the connection URL, e.g.
/// `redis://127.0.0.1:6379/1` selects database 1.
///
/// Connections come from a pool that checks them before reuse and dials a
/// new one when the server went away, so a Redis restart costs the commands
/// in flight at that moment and nothing after.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Builds a store for `url` without contacting the server.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let mut timeouts = Timeouts::default();
        timeouts.wait = Some(OP_TIMEOUT);
        timeouts.create = Some(OP_TIMEOUT);
        timeouts.recycle = Some(OP_TIMEOUT);
        let mut pool_config = PoolConfig::new(POOL_SIZE);
        pool_config.timeouts = timeouts;

        let mut config = Config::from_url(url);
        config.pool = Some(pool_config);
        let pool = config.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }

    /// Builds a store for `url` and checks that the server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let store = Self::new(url)?;
        let _: String = store.run("PING", redis::cmd("PING")).await?;
        tracing::info!(url = %url, "connected to redis");
        Ok(store)
    }

    async fn run<T: FromRedisValue>(&self, op: &'static str, cmd: Cmd) -> Result<T, CacheError> {
        let attempt = async {
            let mut conn = self.pool.get().await?;
            let value: T = cmd.query_async(&mut conn).await?;
            Ok::<T, CacheError>(value)
        };
        tokio::time::timeout(OP_TIMEOUT, attempt)
            .await
            .map_err(|_| CacheError::Timeout { op })?
    }
}

// `EX` takes whole seconds and rejects zero; partial seconds round up.
fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs()
        .saturating_add(u64::from(ttl.subsec_nanos() > 0))
        .max(1)
}

impl CacheStore for RedisStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
        Box::pin(self.run("GET", Cmd::get(key)))
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StoreFuture<'a, ()> {
        let cmd = match ttl {
            Some(ttl) => Cmd::set_ex(key, value, expiry_secs(ttl)),
            None => Cmd::set(key, value),
        };
        Box::pin(self.run("SET", cmd))
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(self.run("EXISTS", Cmd::exists(key)))
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let removed: u64 = self.run("DEL", Cmd::del(key)).await?;
            Ok(removed > 0)
        })
    }

    fn clear(&self) -> StoreFuture<'_, ()> {
        Box::pin(self.run("FLUSHDB", redis::cmd("FLUSHDB")))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
