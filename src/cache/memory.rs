//! In-memory results cache
//!
//! Entries expire lazily: an entry older than the TTL reads as a miss but
//! stays in the map until eviction or an explicit purge. After every write,
//! if the map holds more than `max_entries`, the oldest fifth is evicted.
//!
//! # Thread Safety
//!
//! The map sits behind a `parking_lot::RwLock`; no lock is held across an
//! `.await`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::parse::ParseResult;

use super::fingerprint::Fingerprint;

/// Storage seam for parse results, injected into the application state
pub trait ResultCache: Send + Sync {
    /// Live entry for `key`, or `None` when absent or expired
    fn get(&self, key: &Fingerprint) -> Option<ParseResult>;

    /// Insert or replace the entry for `key`, then enforce the size ceiling
    fn put(&self, key: Fingerprint, value: ParseResult);

    /// Number of stored entries, expired ones included
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    fn purge_expired(&self) -> usize;

    fn stats(&self) -> CacheStats;
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: Fingerprint,
    pub result: ParseResult,
    pub created_at: DateTime<Utc>,
    /// Length of the JSON encoding, used for reporting only
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub approx_bytes: usize,
    pub ttl_secs: u64,
}

pub struct MemoryCache {
    entries: RwLock<HashMap<Fingerprint, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now.signed_duration_since(entry.created_at) > ttl,
            // A TTL too large for chrono never expires
            Err(_) => false,
        }
    }

    pub fn get_at(&self, key: &Fingerprint, now: DateTime<Utc>) -> Option<ParseResult> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if self.is_expired(entry, now) {
            tracing::debug!(key = %key, "Cache entry expired");
            return None;
        }
        Some(entry.result.clone())
    }

    pub fn put_at(&self, key: Fingerprint, value: ParseResult, now: DateTime<Utc>) {
        let size_bytes = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
        let entry = CacheEntry {
            key: key.clone(),
            result: value,
            created_at: now,
            size_bytes,
        };

        let mut entries = self.entries.write();
        entries.insert(key, entry);

        if entries.len() > self.max_entries {
            let evicted = evict_oldest(&mut entries);
            tracing::debug!(
                evicted,
                remaining = entries.len(),
                max_entries = self.max_entries,
                "Evicted oldest cache entries"
            );
        }
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }
}

/// Remove the oldest 20% (at least one) ordered by creation time, then key
fn evict_oldest(entries: &mut HashMap<Fingerprint, CacheEntry>) -> usize {
    let count = (entries.len() / 5).max(1);

    let mut by_age: Vec<(DateTime<Utc>, Fingerprint)> = entries
        .values()
        .map(|e| (e.created_at, e.key.clone()))
        .collect();
    by_age.sort();

    for (_, key) in by_age.into_iter().take(count) {
        entries.remove(&key);
    }
    count
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &Fingerprint) -> Option<ParseResult> {
        self.get_at(key, Utc::now())
    }

    fn put(&self, key: Fingerprint, value: ParseResult) {
        self.put_at(key, value, Utc::now())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        CacheStats {
            entries: entries.len(),
            max_entries: self.max_entries,
            approx_bytes: entries.values().map(|e| e.size_bytes).sum(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
