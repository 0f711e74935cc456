use std::collections::{hash_map, HashMap};
use std::hash::Hash;

/// Id map that refuses to silently overwrite a binding.
/// Used for every id -> entity binding, where a collision means an id was
/// assigned twice.
#[derive(Debug)]
pub struct CheckedMap<K: Eq + Hash, V> {
    inner: HashMap<K, V>,
}

impl<K: Eq + Hash, V> Default for CheckedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + std::fmt::Debug, V> CheckedMap<K, V> {
    pub fn insert(&mut self, key: K, value: V) {
        if self.inner.contains_key(&key) {
            panic!("Cannot insert and replace value for key {:?}. Check first.", key)
        }

        self.inner.insert(key, value);
    }
}

impl<K: Eq + Hash, V> CheckedMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// Removes the key if present; for teardown paths where the binding may
    /// already be gone.
    pub fn discard(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key)
    }

    pub fn iter(&self) -> hash_map::Iter<'_, K, V> {
        self.inner.iter()
    }

    pub fn keys(&self) -> hash_map::Keys<'_, K, V> {
        self.inner.keys()
    }

    pub fn values(&self) -> hash_map::Values<'_, K, V> {
        self.inner.values()
    }

    pub fn drain(&mut self) -> hash_map::Drain<'_, K, V> {
        self.inner.drain()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
