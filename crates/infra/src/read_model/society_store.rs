use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use society_core::SocietyId;

/// Keyed records partitioned by society. Read models only: everything here
/// can be rebuilt from the event store.
pub trait SocietyStore<K, V>: Send + Sync {
    fn get(&self, society_id: SocietyId, key: &K) -> Option<V>;

    /// Write a batch of one society's records; readers see all or none.
    fn upsert_all(&self, society_id: SocietyId, records: Vec<(K, V)>);

    fn upsert(&self, society_id: SocietyId, key: K, value: V) {
        self.upsert_all(society_id, vec![(key, value)]);
    }

    fn list(&self, society_id: SocietyId) -> Vec<V>;

    fn clear_society(&self, society_id: SocietyId);
}

impl<K, V, S> SocietyStore<K, V> for Arc<S>
where
    S: SocietyStore<K, V> + ?Sized,
{
    fn get(&self, society_id: SocietyId, key: &K) -> Option<V> {
        S::get(self, society_id, key)
    }

    fn upsert_all(&self, society_id: SocietyId, records: Vec<(K, V)>) {
        S::upsert_all(self, society_id, records)
    }

    fn list(&self, society_id: SocietyId) -> Vec<V> {
        S::list(self, society_id)
    }

    fn clear_society(&self, society_id: SocietyId) {
        S::clear_society(self, society_id)
    }
}

/// One map per society behind a single lock.
///
/// A poisoned lock is recovered rather than refused: the maps only ever hold
/// whole records, and a stale read model is repaired by a rebuild.
#[derive(Debug)]
pub struct InMemorySocietyStore<K, V> {
    societies: RwLock<HashMap<SocietyId, HashMap<K, V>>>,
}

impl<K, V> InMemorySocietyStore<K, V> {
    pub fn new() -> Self {
        Self {
            societies: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SocietyId, HashMap<K, V>>> {
        self.societies.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SocietyId, HashMap<K, V>>> {
        self.societies.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K, V> Default for InMemorySocietyStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SocietyStore<K, V> for InMemorySocietyStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, society_id: SocietyId, key: &K) -> Option<V> {
        self.read().get(&society_id)?.get(key).cloned()
    }

    fn upsert_all(&self, society_id: SocietyId, records: Vec<(K, V)>) {
        if records.is_empty() {
            return;
        }
        self.write().entry(society_id).or_default().extend(records);
    }

    fn list(&self, society_id: SocietyId) -> Vec<V> {
        self.read()
            .get(&society_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_society(&self, society_id: SocietyId) {
        self.write().remove(&society_id);
    }
}
