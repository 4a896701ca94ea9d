//! Process-local caches owned by the router and the bridge.
//!
//! Neither set is authoritative. The open-channel set is rebuilt from the
//! store on startup; the forwarded set starts empty and entries age out.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use gatehouse_core::bridge::FORWARDED_TTL_SECS;

/// Message ids the router has already handled or produced.
///
/// Anything the router sends is inserted here so the platform echoing it back
/// as an inbound event is ignored.
pub struct ForwardedSet {
    entries: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl ForwardedSet {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Mark an id. Returns `false` if it was already marked and not expired.
    pub fn insert(&self, message_id: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(message_id) {
            Some(marked) if now.duration_since(*marked) < self.ttl => false,
            _ => {
                entries.insert(message_id.to_string(), now);
                true
            }
        }
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.lock()
            .get(message_id)
            .is_some_and(|marked| marked.elapsed() < self.ttl)
    }

    /// Drop expired entries, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, marked| marked.elapsed() < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ForwardedSet {
    fn default() -> Self {
        Self::new(Duration::from_secs(FORWARDED_TTL_SECS))
    }
}

/// Relay channel ids with an open bridge.
#[derive(Default)]
pub struct OpenChannelSet {
    channels: RwLock<HashSet<String>>,
}

impl OpenChannelSet {
    pub fn insert(&self, channel_id: &str) {
        self.write().insert(channel_id.to_string());
    }

    pub fn remove(&self, channel_id: &str) -> bool {
        self.write().remove(channel_id)
    }

    pub fn contains(&self, channel_id: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(channel_id)
    }

    /// Replace the whole set, e.g. after reading open tickets on startup.
    pub fn replace(&self, channel_ids: impl IntoIterator<Item = String>) {
        *self.write() = channel_ids.into_iter().collect();
    }

    pub fn len(&self) -> usize {
        self.channels.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashSet<String>> {
        self.channels.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_duplicates() {
        let set = ForwardedSet::default();
        assert!(set.insert("m1"));
        assert!(!set.insert("m1"));
        assert!(set.contains("m1"));
        assert!(!set.contains("m2"));
    }

    #[test]
    fn expired_entries_are_swept_and_reinsertable() {
        let set = ForwardedSet::new(Duration::from_millis(0));
        assert!(set.insert("m1"));
        assert!(!set.contains("m1"));
        assert!(set.insert("m1"));
        assert_eq!(set.sweep(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn open_set_replace() {
        let set = OpenChannelSet::default();
        set.insert("stale");
        set.replace(vec!["a".to_string(), "b".to_string()]);
        assert!(!set.contains("stale"));
        assert!(set.contains("a"));
        assert!(set.remove("b"));
        assert_eq!(set.len(), 1);
    }
}
