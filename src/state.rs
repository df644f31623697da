//! Opaque state carried across the redirect to the 403 page.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use base64ct::Encoding;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde_json::Value;

/// Namespace for denial state handed to the forbidden page.
pub const DENIAL_NAMESPACE: &str = "authorize:Authorize";
/// Namespace for state handed to the re-authentication endpoint.
pub const REAUTH_NAMESPACE: &str = "authorize:Reauthenticate";

/// Save/load of opaque state keyed by a caller-chosen namespace.
///
/// Implementations must hand each token's data to at most one reader.
pub trait StateStore: Send + Sync {
    fn save(&self, namespace: &str, data: Value) -> String;
    fn load(&self, namespace: &str, token: &str) -> Option<Value>;
}

struct Entry {
    namespace: String,
    data: Value,
    created_at: DateTime<Utc>,
    seq: u64,
}

/// Process-local store. Entries are removed on first load, once older than
/// the configured lifetime, or oldest-first when the store is full.
pub struct MemoryStateStore {
    ttl: Duration,
    max_entries: usize,
    next_seq: AtomicU64,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStateStore {
    pub fn new(ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000)),
            max_entries: max_entries.max(1),
            next_seq: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now - entry.created_at > self.ttl
    }
}

impl StateStore for MemoryStateStore {
    fn save(&self, namespace: &str, data: Value) -> String {
        let token = random_id();
        let now = Utc::now();
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.retain(|_, e| !self.is_expired(e, now));

        let mut evicted = 0usize;
        while entries.len() >= self.max_entries {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.seq)
                .map(|(token, _)| token.clone())
            else {
                break;
            };
            entries.remove(&oldest);
            evicted += 1;
        }
        if evicted > 0 {
            tracing::warn!(
                evicted,
                max_entries = self.max_entries,
                "State store full; dropped oldest entries"
            );
        }

        entries.insert(
            token.clone(),
            Entry {
                namespace: namespace.to_string(),
                data,
                created_at: now,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            },
        );
        token
    }

    fn load(&self, namespace: &str, token: &str) -> Option<Value> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = entries.remove(token)?;
        if entry.namespace != namespace {
            tracing::warn!(
                expected = namespace,
                found = %entry.namespace,
                "State loaded under the wrong namespace"
            );
            return None;
        }
        if self.is_expired(&entry, Utc::now()) {
            tracing::warn!(namespace, "State expired before it was loaded");
            return None;
        }
        Some(entry.data)
    }
}

/// 24 random bytes, base64url without padding.
pub fn random_id() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}
