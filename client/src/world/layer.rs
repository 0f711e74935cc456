use std::{collections::BTreeMap, fmt, sync::Arc};

use log::{debug, warn};

use scenesync_shared::{
    BigMap, CheckedMap, ConstructionError, CustomType, EntityKind, EntityLifecycle, EntityState,
    ItemId, LayerId, NodeId, Request, Value, ValueType, MAX_VALUE_COUNT,
};

use crate::{
    error::SessionError,
    registry::LayerClass,
    session::Session,
    world::{
        entity_kind::SessionEntity,
        keys::{LayerKey, NodeKey},
        node::check_declared_type,
    },
};

#[derive(Clone)]
pub struct LayerInit {
    pub custom_type: CustomType,
    pub value_type: ValueType,
    pub count: u8,
    pub parent_layer: Option<LayerKey>,
    pub class: Option<Arc<dyn LayerClass>>,
    pub layer_id: Option<LayerId>,
}

impl LayerInit {
    pub fn new(custom_type: CustomType, value_type: ValueType) -> Self {
        Self {
            custom_type,
            value_type,
            count: 1,
            parent_layer: None,
            class: None,
            layer_id: None,
        }
    }

    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self
    }

    pub fn with_parent(mut self, parent_layer: LayerKey) -> Self {
        self.parent_layer = Some(parent_layer);
        self
    }

    pub fn with_class(mut self, class: Arc<dyn LayerClass>) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_id(mut self, layer_id: LayerId) -> Self {
        self.layer_id = Some(layer_id);
        self
    }
}

/// A sparse array of values of one shape, keyed by item id.
pub struct Layer {
    pub(crate) id: Option<LayerId>,
    pub(crate) lifecycle: EntityLifecycle,
    pub(crate) custom_type: CustomType,
    pub(crate) class: Arc<dyn LayerClass>,
    pub(crate) node: NodeKey,
    pub(crate) parent_layer: Option<LayerKey>,
    pub(crate) child_layers: CheckedMap<LayerId, LayerKey>,
    pub(crate) value_type: ValueType,
    pub(crate) count: u8,
    pub(crate) items: BTreeMap<ItemId, Value>,
}

impl Layer {
    pub fn id(&self) -> Option<LayerId> {
        self.id
    }

    pub fn state(&self) -> EntityState {
        self.lifecycle.state()
    }

    pub fn is_subscribed(&self) -> bool {
        self.lifecycle.is_subscribed()
    }

    pub fn custom_type(&self) -> CustomType {
        self.custom_type
    }

    pub fn class_name(&self) -> &'static str {
        self.class.name()
    }

    pub fn node(&self) -> NodeKey {
        self.node
    }

    pub fn parent_layer(&self) -> Option<LayerKey> {
        self.parent_layer
    }

    pub fn child_layer(&self, layer_id: LayerId) -> Option<LayerKey> {
        self.child_layers.get(&layer_id).copied()
    }

    pub fn child_layer_count(&self) -> usize {
        self.child_layers.len()
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn item(&self, item_id: ItemId) -> Option<&Value> {
        self.items.get(&item_id)
    }

    /// Items in ascending id order.
    pub fn items(&self) -> impl Iterator<Item = (ItemId, &Value)> {
        self.items.iter().map(|(item_id, value)| (*item_id, value))
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("state", &self.lifecycle.state())
            .field("custom_type", &self.custom_type)
            .field("class", &self.class.name())
            .field("value_type", &self.value_type)
            .field("count", &self.count)
            .field("items", &self.items.len())
            .finish()
    }
}

impl SessionEntity for Layer {
    type Key = LayerKey;
    const KIND: EntityKind = EntityKind::Layer;

    fn arena(session: &Session) -> &BigMap<LayerKey, Self> {
        &session.layers
    }

    fn arena_mut(session: &mut Session) -> &mut BigMap<LayerKey, Self> {
        &mut session.layers
    }

    fn lifecycle(&self) -> &EntityLifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut EntityLifecycle {
        &mut self.lifecycle
    }

    fn class_auto_subscribe(&self) -> bool {
        self.class.auto_subscribe()
    }

    fn create_request(session: &Session, key: &LayerKey) -> Option<Request> {
        let layer = session.layers.get(key)?;
        let node_id = session.nodes.get(&layer.node)?.id?;
        let parent_layer_id = match layer.parent_layer {
            Some(parent_layer) => Some(session.layers.get(&parent_layer)?.id?),
            None => None,
        };
        Some(Request::LayerCreate {
            node_id,
            parent_layer_id,
            value_type: layer.value_type,
            count: layer.count,
            custom_type: layer.custom_type,
        })
    }

    fn destroy_request(session: &Session, key: &LayerKey) -> Option<Request> {
        let (node_id, layer_id) = session.layer_address(key)?;
        Some(Request::LayerDestroy { node_id, layer_id })
    }

    fn subscribe_request(session: &Session, key: &LayerKey) -> Option<Request> {
        let (node_id, layer_id) = session.layer_address(key)?;
        let lifecycle = &session.layers.get(key)?.lifecycle;
        Some(Request::LayerSubscribe {
            node_id,
            layer_id,
            version: lifecycle.version(),
            crc32: lifecycle.crc32(),
        })
    }

    fn unsubscribe_request(session: &Session, key: &LayerKey) -> Option<Request> {
        let (node_id, layer_id) = session.layer_address(key)?;
        let lifecycle = &session.layers.get(key)?.lifecycle;
        Some(Request::LayerUnsubscribe {
            node_id,
            layer_id,
            version: lifecycle.version(),
            crc32: lifecycle.crc32(),
        })
    }

    fn teardown(session: &mut Session, key: &LayerKey, cascade: bool) -> Option<Self> {
        let mut layer = session.layers.remove(key)?;

        if let Some(node) = session.nodes.get_mut(&layer.node) {
            if let Some(layer_id) = layer.id {
                node.layers.discard(&layer_id);
            }
            node.layer_queue.release(layer.custom_type, key);
        }
        if let (Some(layer_id), Some(parent_layer)) = (
            layer.id,
            layer
                .parent_layer
                .and_then(|parent_layer| session.layers.get_mut(&parent_layer)),
        ) {
            parent_layer.child_layers.discard(&layer_id);
        }

        let mut child_keys: Vec<LayerKey> = layer
            .child_layers
            .drain()
            .map(|(_, child_key)| child_key)
            .collect();
        // unconfirmed children only know their parent
        if let Some(node) = session.nodes.get(&layer.node) {
            child_keys.extend(node.layer_queue.keys().into_iter().filter(|pending_key| {
                session
                    .layers
                    .get(pending_key)
                    .is_some_and(|pending| pending.parent_layer == Some(*key))
            }));
        }
        for child_key in child_keys {
            if cascade {
                Layer::teardown(session, &child_key, true);
            } else if let Some(child) = session.layers.get_mut(&child_key) {
                child.parent_layer = None;
            }
        }
        layer.items.clear();

        debug!("Removed layer {:?} ({:?})", layer.id, key);
        Some(layer)
    }
}

impl Session {
    pub(crate) fn layer_address(&self, key: &LayerKey) -> Option<(NodeId, LayerId)> {
        let layer = self.layers.get(key)?;
        let node_id = self.nodes.get(&layer.node)?.id?;
        Some((node_id, layer.id?))
    }

    /// Constructs a layer under `node`, optionally nested in a parent layer of
    /// the same node. Only one unconfirmed layer per type key may exist under
    /// a node.
    pub fn create_layer(
        &mut self,
        node: &NodeKey,
        init: LayerInit,
    ) -> Result<LayerKey, SessionError> {
        let LayerInit {
            custom_type,
            value_type,
            count,
            parent_layer,
            class,
            layer_id,
        } = init;

        let Some(owner) = self.nodes.get(node) else {
            return Err(ConstructionError::UnknownOwner {
                kind: EntityKind::Layer,
                context: "create_layer node",
            }
            .into());
        };
        if let Some(parent_layer) = &parent_layer {
            let Some(parent) = self.layers.get(parent_layer) else {
                return Err(ConstructionError::UnknownOwner {
                    kind: EntityKind::Layer,
                    context: "create_layer parent layer",
                }
                .into());
            };
            if parent.node != *node {
                return Err(ConstructionError::ForeignParentLayer.into());
            }
        }
        match layer_id {
            Some(layer_id) if owner.layers.contains_key(&layer_id) => {
                return Err(ConstructionError::DuplicateId {
                    kind: EntityKind::Layer,
                    id: layer_id.into(),
                }
                .into());
            }
            None if owner.layer_queue.contains(custom_type) => {
                return Err(ConstructionError::DuplicatePending {
                    kind: EntityKind::Layer,
                    custom_type,
                }
                .into());
            }
            _ => {}
        }
        if count == 0 || count > MAX_VALUE_COUNT {
            return Err(ConstructionError::InvalidCount { count }.into());
        }

        let node_custom_type = owner.custom_type;
        let class = match class {
            Some(class) => {
                check_declared_type(class.name(), class.custom_type(), custom_type)?;
                class
            }
            None => self.registry.resolve_layer(node_custom_type, custom_type),
        };

        let key = self.layers.insert(Layer {
            id: layer_id,
            lifecycle: EntityLifecycle::new(),
            custom_type,
            class: class.clone(),
            node: *node,
            parent_layer,
            child_layers: CheckedMap::new(),
            value_type,
            count,
            items: BTreeMap::new(),
        });
        if let Some(owner) = self.nodes.get_mut(node) {
            match layer_id {
                Some(layer_id) => owner.layers.insert(layer_id, key),
                None => owner.layer_queue.insert(custom_type, key),
            }
        }
        if let Some(layer_id) = layer_id {
            self.link_child_layer(&key, layer_id);
        }

        self.lifecycle_create::<Layer>(&key, layer_id.is_some());
        class.on_construct(self, key)?;

        Ok(key)
    }

    /// # Panics
    ///
    /// Panics if the layer is already being destroyed.
    pub fn destroy_layer(&mut self, key: &LayerKey) -> Result<(), SessionError> {
        self.lifecycle_destroy::<Layer>(key, "destroy_layer")
    }

    pub fn subscribe_layer(&mut self, key: &LayerKey) -> Result<bool, SessionError> {
        self.subscribe_entity::<Layer>(key, "subscribe_layer")
    }

    pub fn unsubscribe_layer(&mut self, key: &LayerKey) -> Result<bool, SessionError> {
        self.unsubscribe_entity::<Layer>(key, "unsubscribe_layer")
    }

    /// Stores an item value. It is sent right away when the layer is
    /// identified, otherwise together with all other items on confirmation.
    pub fn set_layer_item(
        &mut self,
        key: &LayerKey,
        item_id: ItemId,
        value: impl Into<Value>,
    ) -> Result<(), SessionError> {
        let value = value.into();
        let Some(layer) = self.layers.get_mut(key) else {
            return Err(SessionError::UnknownEntity {
                kind: EntityKind::Layer,
                context: "set_layer_item",
            });
        };
        layer.value_type.check(layer.count, &value)?;
        layer.items.insert(item_id, value);
        self.send_layer_item(key, item_id);
        Ok(())
    }

    /// Removes an item, returning its last value.
    pub fn unset_layer_item(
        &mut self,
        key: &LayerKey,
        item_id: ItemId,
    ) -> Result<Option<Value>, SessionError> {
        let Some(layer) = self.layers.get_mut(key) else {
            return Err(SessionError::UnknownEntity {
                kind: EntityKind::Layer,
                context: "unset_layer_item",
            });
        };
        let Some(value) = layer.items.remove(&item_id) else {
            return Ok(None);
        };
        if let Some((node_id, layer_id)) = self.layer_address(key) {
            self.send(Request::LayerUnsetValue {
                node_id,
                layer_id,
                item_id,
            });
        }
        Ok(Some(value))
    }

    fn send_layer_item(&mut self, key: &LayerKey, item_id: ItemId) {
        let Some((node_id, layer_id)) = self.layer_address(key) else {
            return;
        };
        let Some(layer) = self.layers.get(key) else {
            return;
        };
        let Some(value) = layer.items.get(&item_id).cloned() else {
            return;
        };
        let value_type = layer.value_type;
        self.send(Request::LayerSetValue {
            node_id,
            layer_id,
            item_id,
            value_type,
            value,
        });
    }

    fn link_child_layer(&mut self, key: &LayerKey, layer_id: LayerId) {
        let Some(parent_layer) = self.layers.get(key).and_then(|layer| layer.parent_layer) else {
            return;
        };
        if let Some(parent) = self.layers.get_mut(&parent_layer) {
            if !parent.child_layers.contains_key(&layer_id) {
                parent.child_layers.insert(layer_id, *key);
            }
        }
    }

    // Inbound

    pub fn receive_layer_create(
        &mut self,
        node_id: NodeId,
        parent_layer_id: Option<LayerId>,
        layer_id: LayerId,
        value_type: ValueType,
        count: u8,
        custom_type: CustomType,
    ) -> Option<LayerKey> {
        if self.is_frozen("layer_create") {
            return None;
        }
        let Some(node_key) = self.node_ids.get(&node_id).copied() else {
            debug!("Ignoring layer create under unknown node {}", node_id);
            return None;
        };
        let node = self.nodes.get_mut(&node_key)?;

        let key = if let Some(key) = node.layers.get(&layer_id).copied() {
            key
        } else if let Some(key) = node.layer_queue.take(custom_type) {
            node.layers.insert(layer_id, key);
            if let Some(layer) = self.layers.get_mut(&key) {
                layer.id = Some(layer_id);
            }
            self.link_child_layer(&key, layer_id);
            key
        } else {
            let parent_layer = match parent_layer_id {
                Some(parent_layer_id) => {
                    let Some(parent_layer) = node.layers.get(&parent_layer_id).copied() else {
                        warn!(
                            "Ignoring layer {} under unknown parent layer {}",
                            layer_id, parent_layer_id
                        );
                        return None;
                    };
                    Some(parent_layer)
                }
                None => None,
            };
            let mut init = LayerInit::new(custom_type, value_type)
                .with_count(count)
                .with_id(layer_id);
            init.parent_layer = parent_layer;
            match self.create_layer(&node_key, init) {
                Ok(key) => key,
                Err(SessionError::Construction(error)) => {
                    warn!("Cannot materialize layer {}: {}", layer_id, error);
                    return None;
                }
                Err(error) => {
                    warn!("Constructing layer {} failed: {}", layer_id, error);
                    self.layer_by_id(node_id, layer_id)?
                }
            }
        };

        if self.lifecycle_receive_create::<Layer>(&key) == EntityState::Created {
            self.flush_confirmed_layer(&key);
        }
        if let Some(class) = self.layers.get(&key).map(|layer| layer.class.clone()) {
            class.on_create(self, key);
        }
        Some(key)
    }

    pub fn receive_layer_destroy(&mut self, node_id: NodeId, layer_id: LayerId) -> Option<Layer> {
        if self.is_frozen("layer_destroy") {
            return None;
        }
        let key = self.layer_by_id(node_id, layer_id)?;
        self.lifecycle_receive_destroy::<Layer>(&key)
    }

    /// Stores an item set by anyone, without echoing it back.
    pub fn receive_layer_set_value(
        &mut self,
        node_id: NodeId,
        layer_id: LayerId,
        item_id: ItemId,
        value: Value,
    ) -> Option<LayerKey> {
        if self.is_frozen("layer_set_value") {
            return None;
        }
        let key = self.layer_by_id(node_id, layer_id)?;
        let layer = self.layers.get_mut(&key)?;
        if let Err(error) = layer.value_type.check(layer.count, &value) {
            warn!("Ignoring item {} of layer {}: {}", item_id, layer_id, error);
            return None;
        }
        layer.items.insert(item_id, value);
        Some(key)
    }

    /// Returns the removed value; None when the item was not set.
    pub fn receive_layer_unset_value(
        &mut self,
        node_id: NodeId,
        layer_id: LayerId,
        item_id: ItemId,
    ) -> Option<Value> {
        if self.is_frozen("layer_unset_value") {
            return None;
        }
        let key = self.layer_by_id(node_id, layer_id)?;
        self.layers.get_mut(&key)?.items.remove(&item_id)
    }

    /// Sends everything that waited for this layer's id: its items and the
    /// creates of nested layers.
    pub(crate) fn flush_confirmed_layer(&mut self, key: &LayerKey) {
        let Some(layer) = self.layers.get(key) else {
            return;
        };
        let item_ids: Vec<ItemId> = layer.items.keys().copied().collect();
        let node = layer.node;
        for item_id in item_ids {
            self.send_layer_item(key, item_id);
        }

        let Some(node) = self.nodes.get(&node) else {
            return;
        };
        let nested: Vec<LayerKey> = node
            .layer_queue
            .keys()
            .into_iter()
            .filter(|pending_key| {
                self.layers
                    .get(pending_key)
                    .is_some_and(|pending| pending.parent_layer == Some(*key))
            })
            .collect();
        for pending_key in nested {
            self.flush_deferred_create::<Layer>(&pending_key);
        }
    }
}
