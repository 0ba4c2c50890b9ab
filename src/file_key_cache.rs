//! # FileKey Cache
//!
//! The one optional in-process cache spec.md allows (§4.5, §9): a short-TTL
//! `{projectId, accessKey} -> FileKey` lookaside in front of the
//! control-plane, bounded so a long-lived warm isolate can't grow it
//! without limit. Control-plane responses are always authoritative on a
//! miss — this never substitutes for the RPC, only skips it briefly.

use crate::constants::{FILE_KEY_CACHE_CAPACITY, FILE_KEY_CACHE_TTL_SECS};
use crate::models::FileKey;
use std::collections::HashMap;
use std::sync::Mutex;

struct Entry {
    file_key: FileKey,
    cached_at: i64,
}

/// Bounded, TTL-expiring cache keyed by `(project_id, access_key)`. Safe to
/// share across requests handled by the same warm isolate; each Worker
/// isolate is single-threaded, so the `Mutex` only ever guards against
/// re-entrancy within one request's async execution, not real contention.
pub struct FileKeyCache {
    entries: Mutex<HashMap<(String, String), Entry>>,
}

impl FileKeyCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, project_id: &str, access_key: &str, now_unix: i64) -> Option<FileKey> {
        let mut entries = self.entries.lock().unwrap();
        let key = (project_id.to_string(), access_key.to_string());

        match entries.get(&key) {
            Some(entry) if now_unix - entry.cached_at < FILE_KEY_CACHE_TTL_SECS => {
                Some(entry.file_key.clone())
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, project_id: &str, access_key: &str, file_key: FileKey, now_unix: i64) {
        let mut entries = self.entries.lock().unwrap();

        if entries.len() >= FILE_KEY_CACHE_CAPACITY && !entries.contains_key(&(project_id.to_string(), access_key.to_string())) {
            // Cheap bound: drop anything already expired before making room.
            // A small, bounded cache doesn't need a real LRU policy.
            entries.retain(|_, entry| now_unix - entry.cached_at < FILE_KEY_CACHE_TTL_SECS);
            if entries.len() >= FILE_KEY_CACHE_CAPACITY {
                entries.clear();
            }
        }

        entries.insert(
            (project_id.to_string(), access_key.to_string()),
            Entry { file_key, cached_at: now_unix },
        );
    }
}

impl Default for FileKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key(access_key: &str) -> FileKey {
        FileKey {
            id: "fk_1".to_string(),
            file_name: "f.bin".to_string(),
            access_key: access_key.to_string(),
            project_id: "proj".to_string(),
            environment_id: "env".to_string(),
            is_public: false,
            file: None,
        }
    }

    #[test]
    fn returns_none_on_miss() {
        let cache = FileKeyCache::new();
        assert!(cache.get("proj", "ak", 1000).is_none());
    }

    #[test]
    fn returns_cached_value_within_ttl() {
        let cache = FileKeyCache::new();
        cache.insert("proj", "ak", sample_key("ak"), 1000);
        assert!(cache.get("proj", "ak", 1000 + FILE_KEY_CACHE_TTL_SECS - 1).is_some());
    }

    #[test]
    fn expires_entries_past_ttl() {
        let cache = FileKeyCache::new();
        cache.insert("proj", "ak", sample_key("ak"), 1000);
        assert!(cache.get("proj", "ak", 1000 + FILE_KEY_CACHE_TTL_SECS + 1).is_none());
    }

    #[test]
    fn distinguishes_by_project_and_access_key() {
        let cache = FileKeyCache::new();
        cache.insert("proj-a", "ak", sample_key("ak"), 1000);
        assert!(cache.get("proj-b", "ak", 1000).is_none());
    }
}
