use scenesync_shared::BigMapKey;

// NodeKey

/// Local handle of a node, valid for the lifetime of the session. Unlike a
/// [`NodeId`](scenesync_shared::NodeId) it exists before the server has
/// confirmed the node.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct NodeKey(u64);

impl BigMapKey for NodeKey {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        NodeKey(value)
    }
}

// TagGroupKey

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct TagGroupKey(u64);

impl BigMapKey for TagGroupKey {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        TagGroupKey(value)
    }
}

// TagKey

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct TagKey(u64);

impl BigMapKey for TagKey {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        TagKey(value)
    }
}

// LayerKey

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct LayerKey(u64);

impl BigMapKey for LayerKey {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        LayerKey(value)
    }
}
