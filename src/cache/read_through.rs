//! Single-flight read-through wrapper.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{Cache, CacheError, CacheLog, Outcome};

/// Read-through access to a [`Cache`].
///
/// [`get_or_compute`](Self::get_or_compute) returns the cached value on a hit.
/// On a miss it runs the computation, stores the result and returns it. At most
/// one computation per key is in flight inside this process: concurrent callers
/// that miss on the same key wait for it and then read its result from the cache.
/// When that result did not make it into the cache (the computation failed, or
/// the write was skipped while failing open) the waiters compute for themselves.
///
/// Failed computations are never cached. A stored value that no longer decodes
/// counts as a miss and is overwritten.
///
/// With `fail_open` set, cache read and write failures are logged and the call
/// behaves as if the cache were absent: a failed read computes straight away,
/// without waiting on other callers. Without it they are returned to the caller.
pub struct ReadThrough {
    cache: Cache,
    fail_open: bool,
    inflight: Mutex<HashMap<String, Arc<watch::Sender<Landing>>>>,
}

// Where an in-flight computation's result ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Landing {
    Pending,
    Cached,
    Uncached,
}

enum Lookup<T> {
    Hit(T),
    Miss,
    Unavailable,
}

enum Role<'a> {
    Leader(Flight<'a>),
    Follower(watch::Receiver<Landing>),
}

// Leadership of one in-flight computation. Dropping it unregisters the key
// and releases waiters; a flight dropped before landing counts as uncached.
struct Flight<'a> {
    owner: &'a ReadThrough,
    key: String,
    landing: Arc<watch::Sender<Landing>>,
}

impl Flight<'_> {
    fn land(&self, landing: Landing) {
        self.landing.send_replace(landing);
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        {
            let mut inflight = self.owner.lock_inflight();
            if inflight
                .get(&self.key)
                .is_some_and(|landing| Arc::ptr_eq(landing, &self.landing))
            {
                inflight.remove(&self.key);
            }
        }
        self.landing.send_if_modified(|landing| {
            let pending = *landing == Landing::Pending;
            if pending {
                *landing = Landing::Uncached;
            }
            pending
        });
    }
}

impl ReadThrough {
    pub fn new(cache: Cache, fail_open: bool) -> Self {
        Self {
            cache,
            fail_open,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn fail_open(&self) -> bool {
        self.fail_open
    }

    /// Returns the value under `key`, computing and caching it on a miss.
    ///
    /// The outcome (hit or miss) is marked on `log` together with every cache
    /// operation issued.
    ///
    /// # Errors
    ///
    /// Errors from `compute` are returned unchanged. Cache errors are returned
    /// only when the wrapper is not failing open.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        log: &CacheLog,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.lookup(key, log).await? {
            Lookup::Hit(value) => {
                debug!(key = %key, "cache hit");
                log.mark(Outcome::Hit);
                return Ok(value);
            }
            Lookup::Unavailable => {
                return self.fill(key, log, compute).await.map(|(value, _)| value);
            }
            Lookup::Miss => {}
        }

        let flight = match self.join(key) {
            Role::Leader(flight) => flight,
            Role::Follower(mut landing) => {
                debug!(key = %key, "waiting for in-flight computation");
                let landed = landing
                    .wait_for(|landing| *landing != Landing::Pending)
                    .await
                    .map(|landing| *landing);
                if matches!(landed, Ok(Landing::Cached)) {
                    if let Lookup::Hit(value) = self.lookup(key, log).await? {
                        debug!(key = %key, "cache hit after waiting");
                        log.mark(Outcome::Hit);
                        return Ok(value);
                    }
                }
                return self.fill(key, log, compute).await.map(|(value, _)| value);
            }
        };

        let (value, cached) = self.fill(key, log, compute).await?;
        flight.land(if cached {
            Landing::Cached
        } else {
            Landing::Uncached
        });
        Ok(value)
    }

    // Computes the value and writes it back; the flag says whether it landed
    // in the cache.
    async fn fill<T, E, F, Fut>(
        &self,
        key: &str,
        log: &CacheLog,
        compute: F,
    ) -> Result<(T, bool), E>
    where
        T: Serialize,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        debug!(key = %key, "cache miss, computing");
        log.mark(Outcome::Miss);
        let value = compute().await?;
        let cached = self.store(key, &value, log).await?;
        Ok((value, cached))
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        key: &str,
        log: &CacheLog,
    ) -> Result<Lookup<T>, CacheError> {
        match self.cache.get(key, log).await {
            Ok(Some(value)) => Ok(Lookup::Hit(value)),
            Ok(None) => Ok(Lookup::Miss),
            Err(err @ CacheError::Decode { .. }) => {
                warn!(error = %err, "discarding undecodable cache entry");
                Ok(Lookup::Miss)
            }
            Err(err) if self.fail_open => {
                warn!(key = %key, error = %err, "cache read failed, using the data source");
                Ok(Lookup::Unavailable)
            }
            Err(err) => Err(err),
        }
    }

    async fn store<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        log: &CacheLog,
    ) -> Result<bool, CacheError> {
        match self.cache.set(key, value, log).await {
            Ok(()) => Ok(true),
            Err(err) if self.fail_open => {
                warn!(key = %key, error = %err, "cache write failed, value not cached");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn join(&self, key: &str) -> Role<'_> {
        let mut inflight = self.lock_inflight();
        if let Some(landing) = inflight.get(key) {
            return Role::Follower(landing.subscribe());
        }
        let landing = Arc::new(watch::Sender::new(Landing::Pending));
        inflight.insert(key.to_owned(), Arc::clone(&landing));
        Role::Leader(Flight {
            owner: self,
            key: key.to_owned(),
            landing,
        })
    }

    fn lock_inflight(&self) -> MutexGuard<'_, HashMap<String, Arc<watch::Sender<Landing>>>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
