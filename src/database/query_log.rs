//! Per-unit-of-work record of the statements sent to the relational store.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counts database round-trips and keeps their SQL text.
///
/// A `QueryLog` belongs to one logical unit of work (a request, a test step).
/// It is passed explicitly to the data-access layer; nothing in the crate keeps
/// a process-wide counter. Call [`reset`](Self::reset) to start a new measurement.
///
/// # Examples
///
/// ```
/// use larder::database::QueryLog;
///
/// let log = QueryLog::new();
/// log.record("SELECT 1");
/// assert_eq!(log.count(), 1);
/// log.reset();
/// assert_eq!(log.count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct QueryLog {
    statements: Mutex<Vec<String>>,
}

impl QueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one executed statement.
    pub fn record(&self, sql: impl Into<String>) {
        let sql = sql.into();
        tracing::debug!(sql = %sql, "database round-trip");
        self.lock().push(sql);
    }

    /// Number of round-trips recorded since creation or the last reset.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Snapshot of the recorded statements, in execution order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    // Recording never leaves the vector half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let log = QueryLog::new();
        log.record("SELECT a");
        log.record(String::from("SELECT b"));
        assert_eq!(log.count(), 2);
        assert_eq!(log.statements(), vec!["SELECT a", "SELECT b"]);
    }

    #[test]
    fn logs_are_independent() {
        let first = QueryLog::new();
        let second = QueryLog::new();
        first.record("SELECT 1");
        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 0);
    }

    #[test]
    fn reset_starts_a_new_measurement() {
        let log = QueryLog::new();
        log.record("SELECT 1");
        log.reset();
        assert_eq!(log.count(), 0);
        assert!(log.statements().is_empty());
    }
}
