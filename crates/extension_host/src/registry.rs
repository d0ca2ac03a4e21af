//! Keyed store shared by the command, panel and inspector registries

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

struct Slot<T> {
    seq: u64,
    value: Arc<T>,
}

/// Flat id → value map with overwrite-with-warning semantics.
///
/// Every entry remembers when its id was first inserted; overwriting an id
/// keeps that position, so listings stay stable across re-registration.
pub(crate) struct KeyedStore<T> {
    kind: &'static str,
    entries: DashMap<String, Slot<T>>,
    next_seq: AtomicU64,
}

impl<T> KeyedStore<T> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Insert or overwrite. Returns true when an existing entry was replaced.
    pub(crate) fn insert(&self, id: &str, value: T) -> bool {
        let value = Arc::new(value);
        match self.entries.entry(id.to_string()) {
            Entry::Occupied(mut occupied) => {
                warn!("{} '{}' is already registered, overwriting", self.kind, id);
                occupied.get_mut().value = value;
                true
            }
            Entry::Vacant(vacant) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                vacant.insert(Slot { seq, value });
                debug!("Registered {} '{}'", self.kind, id);
                false
            }
        }
    }

    /// Tolerant delete. Returns true when something was removed.
    pub(crate) fn remove(&self, id: &str) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            debug!("Unregistered {} '{}'", self.kind, id);
        }
        removed
    }

    pub(crate) fn get(&self, id: &str) -> Option<Arc<T>> {
        self.entries.get(id).map(|slot| slot.value.clone())
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Snapshot of all values in insertion order
    pub(crate) fn values(&self) -> Vec<Arc<T>> {
        let mut slots: Vec<(u64, Arc<T>)> = self
            .entries
            .iter()
            .map(|entry| (entry.seq, entry.value.clone()))
            .collect();
        slots.sort_by_key(|(seq, _)| *seq);
        slots.into_iter().map(|(_, value)| value).collect()
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }
}
