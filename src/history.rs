//! Rolling transaction history used by the behavioral checks

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Maximum number of records kept per history
pub const MAX_HISTORY: usize = 10;

/// Session key used when a request carries no session identifier
pub const SHARED_SESSION: &str = "shared";

/// Default limit on concurrently tracked session histories
pub const DEFAULT_MAX_SESSIONS: usize = 1_000;

/// A committed transaction as seen by the behavioral checks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub amount: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_unix: f64,
}

impl TransactionRecord {
    pub fn new(amount: f64, latitude: f64, longitude: f64, timestamp_unix: f64) -> Self {
        Self {
            amount,
            latitude,
            longitude,
            timestamp_unix,
        }
    }
}

/// Bounded FIFO of recent transactions, oldest first
#[derive(Debug, Clone)]
pub struct HistoryStore {
    records: VecDeque<TransactionRecord>,
    capacity: usize,
}

impl HistoryStore {
    /// Create an empty store holding at most [`MAX_HISTORY`] records
    pub fn new() -> Self {
        Self::with_capacity_limit(MAX_HISTORY)
    }

    /// Create an empty store with a custom bound (at least one record)
    pub fn with_capacity_limit(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a record, evicting the oldest one when the bound is exceeded
    pub fn append(&mut self, record: TransactionRecord) {
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// Most recently appended record
    pub fn last_record(&self) -> Option<&TransactionRecord> {
        self.records.back()
    }

    /// Records strictly younger than `window_seconds` relative to `reference_timestamp`
    pub fn records_within(
        &self,
        window_seconds: f64,
        reference_timestamp: f64,
    ) -> Vec<&TransactionRecord> {
        self.records
            .iter()
            .filter(|r| reference_timestamp - r.timestamp_unix < window_seconds)
            .collect()
    }

    /// Mean amount over the whole history, 0 when empty
    pub fn average_amount(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.records.iter().map(|r| r.amount).sum::<f64>() / self.records.len() as f64
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Histories keyed by session, each guarded by its own lock.
///
/// Callers that need analyze-then-append atomicity lock the store returned
/// by [`SessionHistories::store`] once and do both steps under that guard.
/// At most `max_sessions` keys are kept; opening a new one past the limit
/// evicts the least recently used session.
pub struct SessionHistories {
    sessions: Mutex<SessionMap>,
    capacity: usize,
    max_sessions: usize,
}

#[derive(Default)]
struct SessionMap {
    entries: HashMap<String, SessionEntry>,
    clock: u64,
}

struct SessionEntry {
    store: Arc<Mutex<HistoryStore>>,
    last_used: u64,
}

impl SessionHistories {
    pub fn new() -> Self {
        Self::with_limits(MAX_HISTORY, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self::with_limits(capacity, DEFAULT_MAX_SESSIONS)
    }

    /// Custom per-history bound and session count (each at least one)
    pub fn with_limits(capacity: usize, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(SessionMap::default()),
            capacity,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Get or create the store for a session; `None` maps to the shared timeline
    pub fn store(&self, session_id: Option<&str>) -> Arc<Mutex<HistoryStore>> {
        let key = session_id.unwrap_or(SHARED_SESSION);
        let mut sessions = self.sessions.lock();
        sessions.clock += 1;
        let now = sessions.clock;

        if let Some(entry) = sessions.entries.get_mut(key) {
            entry.last_used = now;
            return Arc::clone(&entry.store);
        }

        if sessions.entries.len() >= self.max_sessions {
            let stale = sessions
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(stale) = stale {
                sessions.entries.remove(&stale);
                debug!(session = %stale, "Evicted least recently used session history");
            }
        }

        let store = Arc::new(Mutex::new(HistoryStore::with_capacity_limit(self.capacity)));
        sessions.entries.insert(
            key.to_string(),
            SessionEntry {
                store: Arc::clone(&store),
                last_used: now,
            },
        );
        store
    }

    /// Copy of a session's history, if the session exists
    pub fn snapshot(&self, session_id: Option<&str>) -> Option<HistoryStore> {
        let key = session_id.unwrap_or(SHARED_SESSION);
        let store = self
            .sessions
            .lock()
            .entries
            .get(key)
            .map(|e| Arc::clone(&e.store))?;
        let snapshot = store.lock().clone();
        Some(snapshot)
    }

    /// Number of sessions with a history
    pub fn session_count(&self) -> usize {
        self.sessions.lock().entries.len()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

impl Default for SessionHistories {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(amount: f64, ts: f64) -> TransactionRecord {
        TransactionRecord::new(amount, 22.5726, 88.3639, ts)
    }

    #[test]
    fn test_empty_store() {
        let store = HistoryStore::new();
        assert!(store.is_empty());
        assert!(store.last_record().is_none());
        assert_eq!(store.average_amount(), 0.0);
        assert!(store.records_within(300.0, 1_000.0).is_empty());
    }

    #[test]
    fn test_append_keeps_order() {
        let mut store = HistoryStore::new();
        store.append(record(1.0, 10.0));
        store.append(record(2.0, 20.0));

        assert_eq!(store.len(), 2);
        assert_eq!(store.last_record().unwrap().amount, 2.0);
        let amounts: Vec<f64> = store.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![1.0, 2.0]);
    }

    #[test]
    fn test_eviction_after_eleven_appends() {
        let mut store = HistoryStore::new();
        for i in 0..11 {
            store.append(record(i as f64, i as f64));
        }

        assert_eq!(store.len(), MAX_HISTORY);
        let amounts: Vec<f64> = store.iter().map(|r| r.amount).collect();
        let expected: Vec<f64> = (1..11).map(|i| i as f64).collect();
        assert_eq!(amounts, expected);
    }

    #[test]
    fn test_bound_never_exceeded() {
        let mut store = HistoryStore::new();
        for i in 0..57 {
            store.append(record(1.0, i as f64));
            assert!(store.len() <= MAX_HISTORY);
        }
        assert_eq!(store.last_record().unwrap().timestamp_unix, 56.0);
    }

    #[test]
    fn test_records_within_boundary_is_exclusive() {
        let mut store = HistoryStore::new();
        store.append(record(1.0, 700.0)); // exactly 300s old
        store.append(record(2.0, 701.0)); // 299s old
        store.append(record(3.0, 999.0));

        let recent = store.records_within(300.0, 1_000.0);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].amount, 2.0);
    }

    #[test]
    fn test_average_amount() {
        let mut store = HistoryStore::new();
        store.append(record(100.0, 1.0));
        store.append(record(200.0, 2.0));
        assert_eq!(store.average_amount(), 150.0);
    }

    #[test]
    fn test_custom_capacity() {
        let mut store = HistoryStore::with_capacity_limit(3);
        for i in 0..5 {
            store.append(record(i as f64, i as f64));
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.iter().next().unwrap().amount, 2.0);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let sessions = SessionHistories::new();
        sessions.store(Some("alice")).lock().append(record(1.0, 1.0));
        sessions.store(None).lock().append(record(2.0, 2.0));
        sessions.store(None).lock().append(record(3.0, 3.0));

        assert_eq!(sessions.snapshot(Some("alice")).unwrap().len(), 1);
        assert_eq!(sessions.snapshot(None).unwrap().len(), 2);
        assert!(sessions.snapshot(Some("bob")).is_none());
        assert_eq!(sessions.session_count(), 2);
    }

    #[test]
    fn test_same_session_shares_store() {
        let sessions = SessionHistories::new();
        let a = sessions.store(Some("s1"));
        let b = sessions.store(Some("s1"));
        a.lock().append(record(5.0, 1.0));
        assert_eq!(b.lock().len(), 1);
    }

    #[test]
    fn test_session_count_is_capped() {
        let sessions = SessionHistories::with_limits(MAX_HISTORY, 50);
        for i in 0..5_000 {
            let id = format!("s{i}");
            sessions.store(Some(id.as_str())).lock().append(record(1.0, i as f64));
            assert!(sessions.session_count() <= 50);
        }
        assert_eq!(sessions.session_count(), 50);
        assert!(sessions.snapshot(Some("s0")).is_none());
        assert_eq!(sessions.snapshot(Some("s4999")).unwrap().len(), 1);
    }

    #[test]
    fn test_least_recently_used_session_is_evicted() {
        let sessions = SessionHistories::with_limits(MAX_HISTORY, 2);
        sessions.store(Some("a")).lock().append(record(1.0, 1.0));
        sessions.store(Some("b")).lock().append(record(2.0, 2.0));
        // touching "a" leaves "b" as the stalest
        sessions.store(Some("a"));
        sessions.store(Some("c"));

        assert!(sessions.snapshot(Some("a")).is_some());
        assert!(sessions.snapshot(Some("b")).is_none());
        assert!(sessions.snapshot(Some("c")).unwrap().is_empty());
    }
}
