//! Short-lived nonce state for pending logins.
//!
//! Login initiation records the nonce it sent to the provider under the
//! client's remote address. The callback later consumes that entry and
//! compares it with the nonce inside the verified ID token. Entries older
//! than the freshness window are treated as absent; expiry is checked
//! lazily, so no background sweep is needed.

use crate::config::NonceStoreConfig;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// A recorded nonce.
#[derive(Debug, Clone)]
struct NonceEntry {
    nonce: String,
    created_at: DateTime<Utc>,
}

impl NonceEntry {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at < ttl
    }
}

/// Process-wide, time-bounded map of client key to expected nonce.
///
/// Clones share the same underlying state. Writes for the same key are
/// last-writer-wins.
#[derive(Debug, Clone)]
pub struct NonceStore {
    ttl: Duration,
    max_entries: usize,
    entries: Arc<RwLock<HashMap<String, NonceEntry>>>,
}

impl NonceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(config: &NonceStoreConfig) -> Self {
        Self {
            ttl: config.ttl(),
            max_entries: config.max_entries.max(1),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Records `nonce` for `client_key`, replacing any earlier entry and
    /// restarting its freshness window.
    pub fn put(&self, client_key: &str, nonce: impl Into<String>) {
        self.put_at(client_key, nonce.into(), Utc::now());
    }

    fn put_at(&self, client_key: &str, nonce: String, created_at: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if !entries.contains_key(client_key) && entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.is_fresh(created_at, ttl));

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    debug!("nonce store full, evicting oldest pending login");
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(client_key.to_string(), NonceEntry { nonce, created_at });
    }

    /// Returns the nonce for `client_key` if one is recorded and still fresh.
    ///
    /// The entry is left in place. Use [`take`](Self::take) when the nonce
    /// is about to be checked.
    #[must_use]
    pub fn get(&self, client_key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        entries
            .get(client_key)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.nonce.clone())
    }

    /// Removes the entry for `client_key`, returning its nonce if it was fresh.
    ///
    /// A nonce returned here can never be returned again, whether or not the
    /// caller's comparison succeeds.
    #[must_use]
    pub fn take(&self, client_key: &str) -> Option<String> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        entries
            .remove(client_key)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.nonce)
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, self.ttl));
        before - entries.len()
    }

    /// Returns the number of entries held, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the freshness window.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::new(&NonceStoreConfig::default())
    }
}
