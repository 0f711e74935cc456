use std::collections::{btree_map, BTreeMap, VecDeque};

use scenesync_shared::CustomType;

use crate::world::keys::NodeKey;

/// Nodes created by this client that the server has not confirmed yet.
///
/// A client may speculatively create several nodes of one type before the
/// first confirmation arrives, so each type keeps a FIFO queue: confirmations
/// are matched in the order the create requests were issued.
#[derive(Default)]
pub struct PendingNodes {
    queues: BTreeMap<CustomType, VecDeque<NodeKey>>,
}

impl PendingNodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, custom_type: CustomType, key: NodeKey) {
        self.queues.entry(custom_type).or_default().push_back(key);
    }

    /// Oldest pending node of the given type.
    pub fn pop_front(&mut self, custom_type: CustomType) -> Option<NodeKey> {
        let queue = self.queues.get_mut(&custom_type)?;
        let key = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(&custom_type);
        }
        key
    }

    pub fn remove(&mut self, custom_type: CustomType, key: &NodeKey) -> bool {
        let Some(queue) = self.queues.get_mut(&custom_type) else {
            return false;
        };
        let Some(position) = queue.iter().position(|pending| pending == key) else {
            return false;
        };
        queue.remove(position);
        if queue.is_empty() {
            self.queues.remove(&custom_type);
        }
        true
    }

    pub fn len(&self, custom_type: CustomType) -> usize {
        self.queues.get(&custom_type).map_or(0, VecDeque::len)
    }

    pub fn queue(&self, custom_type: CustomType) -> Vec<NodeKey> {
        self.queues
            .get(&custom_type)
            .map(|queue| queue.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every pending node, by type key, then issue order.
    pub fn keys(&self) -> Vec<NodeKey> {
        self.queues.values().flatten().copied().collect()
    }
}

/// One pending slot per type key under an owner: tag groups under a node,
/// tags under a tag group, layers under a node.
#[derive(Debug)]
pub struct PendingSlots<K: Copy + Eq> {
    slots: BTreeMap<CustomType, K>,
}

impl<K: Copy + Eq> Default for PendingSlots<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq> PendingSlots<K> {
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    pub fn contains(&self, custom_type: CustomType) -> bool {
        self.slots.contains_key(&custom_type)
    }

    pub fn get(&self, custom_type: CustomType) -> Option<K> {
        self.slots.get(&custom_type).copied()
    }

    pub fn insert(&mut self, custom_type: CustomType, key: K) {
        if self.slots.contains_key(&custom_type) {
            panic!(
                "Pending slot for custom type {} is already taken. Check first.",
                custom_type
            );
        }
        self.slots.insert(custom_type, key);
    }

    pub fn take(&mut self, custom_type: CustomType) -> Option<K> {
        self.slots.remove(&custom_type)
    }

    /// Frees the slot only if it still holds `key`.
    pub fn release(&mut self, custom_type: CustomType, key: &K) {
        if self.slots.get(&custom_type) == Some(key) {
            self.slots.remove(&custom_type);
        }
    }

    pub fn values(&self) -> btree_map::Values<'_, CustomType, K> {
        self.slots.values()
    }

    pub fn keys(&self) -> Vec<K> {
        self.slots.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
