//! Per-request record of cache operations.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Kind of operation sent to the cache backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOpKind {
    Get,
    Set,
    Exists,
    Delete,
    Clear,
}

impl CacheOpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Set => "SET",
            Self::Exists => "EXISTS",
            Self::Delete => "DEL",
            Self::Clear => "FLUSHDB",
        }
    }
}

impl fmt::Display for CacheOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation against the backend, keyed by its physical (namespaced) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOp {
    pub kind: CacheOpKind,
    pub key: String,
}

/// How a read-through lookup was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Hit,
    Miss,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    ops: Vec<CacheOp>,
    outcome: Option<Outcome>,
}

/// Operations issued to the cache during one unit of work, plus the outcome
/// of the last read-through lookup.
#[derive(Debug, Default)]
pub struct CacheLog {
    inner: Mutex<Inner>,
}

impl CacheLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: CacheOpKind, key: impl Into<String>) {
        let key = key.into();
        tracing::trace!(op = %kind, key = %key, "cache operation");
        self.lock().ops.push(CacheOp { kind, key });
    }

    pub fn mark(&self, outcome: Outcome) {
        self.lock().outcome = Some(outcome);
    }

    pub fn count(&self) -> usize {
        self.lock().ops.len()
    }

    pub fn ops(&self) -> Vec<CacheOp> {
        self.lock().ops.clone()
    }

    /// Outcome of the most recent read-through lookup, if any happened.
    pub fn outcome(&self) -> Option<Outcome> {
        self.lock().outcome
    }

    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.ops.clear();
        inner.outcome = None;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
