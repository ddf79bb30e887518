//! Insertion-Ordered Map
//!
//! The measurement hierarchy needs deterministic iteration order over keyed
//! levels (instances, trials, forks, iterations). This pairs an id list with a
//! backing hash map and only mutates both through one API, so the two can
//! never drift apart. A missing backing entry for a listed id is a fatal
//! invariant violation.

use fxhash::FxHashMap;
use std::hash::Hash;

/// A map that iterates its entries in insertion order.
#[derive(Debug, Clone, Default)]
pub struct OrderedMap<K, V> {
    ids: Vec<K>,
    entries: FxHashMap<K, V>,
}

impl<K, V> OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            entries: FxHashMap::default(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> &[K] {
        &self.ids
    }

    /// Look up an entry by id.
    pub fn get(&self, id: &K) -> Option<&V> {
        self.entries.get(id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: &K) -> Option<&mut V> {
        self.entries.get_mut(id)
    }

    /// The entry at position `idx` of the insertion order.
    ///
    /// Panics if the id list and the backing map are out of sync.
    pub fn value_at(&self, idx: usize) -> &V {
        let id = &self.ids[idx];
        self.entries
            .get(id)
            .unwrap_or_else(|| panic!("ordered map out of sync: listed id has no entry"))
    }

    /// Get the entry for `id`, inserting `default()` first if absent.
    pub fn get_or_insert_with(&mut self, id: K, default: impl FnOnce() -> V) -> &mut V {
        if !self.entries.contains_key(&id) {
            self.ids.push(id.clone());
            self.entries.insert(id.clone(), default());
        }
        self.entries
            .get_mut(&id)
            .unwrap_or_else(|| panic!("ordered map out of sync: inserted id has no entry"))
    }

    /// Insert an entry, appending the id to the order if new.
    /// Returns the previous value for `id`, if any.
    pub fn insert(&mut self, id: K, value: V) -> Option<V> {
        if !self.entries.contains_key(&id) {
            self.ids.push(id.clone());
        }
        self.entries.insert(id, value)
    }

    /// Iterate `(id, value)` pairs in insertion order.
    ///
    /// Panics if the id list and the backing map are out of sync.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.ids.iter().map(move |id| {
            let v = self
                .entries
                .get(id)
                .unwrap_or_else(|| panic!("ordered map out of sync: listed id has no entry"));
            (id, v)
        })
    }

    /// Iterate values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    /// Consume the map, yielding `(id, value)` pairs in insertion order.
    ///
    /// Panics if the id list and the backing map are out of sync.
    pub fn into_entries(mut self) -> impl Iterator<Item = (K, V)> {
        self.ids.into_iter().map(move |id| {
            let v = self
                .entries
                .remove(&id)
                .unwrap_or_else(|| panic!("ordered map out of sync: listed id has no entry"));
            (id, v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut m = OrderedMap::new();
        m.insert(3u32, "c");
        m.insert(1, "a");
        m.insert(2, "b");

        let ids: Vec<u32> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(*m.value_at(0), "c");
        assert_eq!(*m.value_at(2), "b");
    }

    #[test]
    fn test_insert_existing_keeps_position() {
        let mut m = OrderedMap::new();
        m.insert("x", 1);
        m.insert("y", 2);
        let old = m.insert("x", 10);

        assert_eq!(old, Some(1));
        assert_eq!(m.len(), 2);
        assert_eq!(m.ids(), &["x", "y"]);
        assert_eq!(m.get(&"x"), Some(&10));
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut m: OrderedMap<u32, Vec<u32>> = OrderedMap::new();
        m.get_or_insert_with(7, Vec::new).push(1);
        m.get_or_insert_with(7, Vec::new).push(2);

        assert_eq!(m.len(), 1);
        assert_eq!(m.get(&7), Some(&vec![1, 2]));
    }

    #[test]
    fn test_into_entries_order() {
        let mut m = OrderedMap::new();
        m.insert(5u32, "e");
        m.insert(4, "d");

        let entries: Vec<(u32, &str)> = m.into_entries().collect();
        assert_eq!(entries, vec![(5, "e"), (4, "d")]);
    }
}
