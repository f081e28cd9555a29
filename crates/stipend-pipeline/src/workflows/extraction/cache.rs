use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Retention policy for resolved locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Entries live until the cache is cleared.
    #[default]
    Unbounded,
    /// Keeps at most this many entries, evicting the oldest insertion first.
    Capacity(usize),
}

/// Memo of raw location text to resolved region key, shared by every
/// extraction running in the process.
#[derive(Debug, Default)]
pub struct LocationCache {
    policy: CachePolicy,
    state: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, String>,
    insertion_order: VecDeque<String>,
}

/// Point-in-time view of the cache contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    pub size: usize,
    pub entries: BTreeMap<String, String>,
}

impl LocationCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn get(&self, raw: &str) -> Option<String> {
        self.read().entries.get(raw).cloned()
    }

    /// Stores a resolution; a later insert for the same key replaces the
    /// earlier value.
    pub fn insert(&self, raw: impl Into<String>, region: impl Into<String>) {
        if self.policy == CachePolicy::Capacity(0) {
            return;
        }

        let raw = raw.into();
        let mut state = self.write();
        if state.entries.insert(raw.clone(), region.into()).is_none() {
            state.insertion_order.push_back(raw);
        }

        if let CachePolicy::Capacity(capacity) = self.policy {
            while state.entries.len() > capacity {
                let Some(oldest) = state.insertion_order.pop_front() else {
                    break;
                };
                state.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut state = self.write();
        let removed = state.entries.len();
        state.entries.clear();
        state.insertion_order.clear();
        removed
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let state = self.read();
        CacheSnapshot {
            size: state.entries.len(),
            entries: state
                .entries
                .iter()
                .map(|(raw, region)| (raw.clone(), region.clone()))
                .collect(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn last_write_wins_for_a_key() {
        let cache = LocationCache::new(CachePolicy::Unbounded);
        cache.insert("Austin, TX", "Texas");
        cache.insert("Austin, TX", "Tejas");

        assert_eq!(cache.get("Austin, TX").as_deref(), Some("Tejas"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_reports_removed_entries() {
        let cache = LocationCache::default();
        cache.insert("Austin, TX", "Texas");
        cache.insert("Boston, MA", "Massachusetts");

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.get("Austin, TX"), None);
    }

    #[test]
    fn capacity_evicts_oldest_insertions() {
        let cache = LocationCache::new(CachePolicy::Capacity(2));
        cache.insert("a", "A");
        cache.insert("b", "B");
        cache.insert("a", "A2");
        cache.insert("c", "C");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b").as_deref(), Some("B"));
        assert_eq!(cache.get("c").as_deref(), Some("C"));
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = LocationCache::new(CachePolicy::Capacity(0));
        cache.insert("a", "A");
        assert!(cache.is_empty());
    }

    #[test]
    fn snapshot_lists_sorted_entries() {
        let cache = LocationCache::default();
        cache.insert("Seattle, WA", "Washington");
        cache.insert("Austin, TX", "Texas");

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.size, 2);
        let keys: Vec<_> = snapshot.entries.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Austin, TX", "Seattle, WA"]);
    }

    #[test]
    fn concurrent_inserts_are_visible_to_all_threads() {
        let cache = Arc::new(LocationCache::default());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for item in 0..25 {
                        cache.insert(format!("{worker}-{item}"), "Region");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker finished");
        }

        assert_eq!(cache.len(), 200);
    }
}
