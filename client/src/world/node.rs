use std::{collections::HashMap, fmt, sync::Arc};

use log::{debug, info, warn};

use scenesync_shared::{
    BigMap, CheckedMap, ConstructionError, CustomType, EntityKind, EntityLifecycle, EntityState,
    LayerId, LockState, NodeId, NodeLock, OwnershipError, Permission, Priority, Request,
    TagGroupId, UserId,
};

use crate::{
    error::SessionError,
    registry::NodeClass,
    session::Session,
    world::{
        entity_kind::SessionEntity,
        keys::{LayerKey, NodeKey, TagGroupKey},
        layer::Layer,
        pending::PendingSlots,
        tag_group::TagGroup,
    },
};

// NodeInit

/// Describes a node to construct locally.
#[derive(Clone)]
pub struct NodeInit {
    pub custom_type: CustomType,
    /// Explicit class; resolved through the registry when absent
    pub class: Option<Arc<dyn NodeClass>>,
    pub parent: Option<NodeKey>,
    /// Known id: the node is assumed to exist already and no create is sent
    pub node_id: Option<NodeId>,
    pub user_id: Option<UserId>,
}

impl NodeInit {
    pub fn new(custom_type: CustomType) -> Self {
        Self {
            custom_type,
            class: None,
            parent: None,
            node_id: None,
            user_id: None,
        }
    }

    pub fn with_class(mut self, class: Arc<dyn NodeClass>) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_parent(mut self, parent: NodeKey) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

// Node

pub struct Node {
    pub(crate) id: Option<NodeId>,
    pub(crate) lifecycle: EntityLifecycle,
    pub(crate) custom_type: CustomType,
    pub(crate) class: Arc<dyn NodeClass>,
    pub(crate) parent: Option<NodeKey>,
    /// Parent as the server last placed it
    pub(crate) server_parent: Option<NodeKey>,
    pub(crate) user_id: Option<UserId>,
    pub(crate) child_nodes: CheckedMap<NodeId, NodeKey>,
    pub(crate) tag_groups: CheckedMap<TagGroupId, TagGroupKey>,
    pub(crate) tag_group_queue: PendingSlots<TagGroupKey>,
    pub(crate) layers: CheckedMap<LayerId, LayerKey>,
    pub(crate) layer_queue: PendingSlots<LayerKey>,
    pub(crate) priority: Priority,
    pub(crate) permissions: HashMap<UserId, Permission>,
    pub(crate) lock: NodeLock,
    /// Parent differs from what the server knows and the link request has not
    /// been sent yet
    pub(crate) pending_link: bool,
}

impl Node {
    fn new(
        custom_type: CustomType,
        class: Arc<dyn NodeClass>,
        id: Option<NodeId>,
        parent: Option<NodeKey>,
        user_id: Option<UserId>,
        priority: Priority,
    ) -> Self {
        Self {
            id,
            lifecycle: EntityLifecycle::new(),
            custom_type,
            class,
            parent,
            server_parent: parent,
            user_id,
            child_nodes: CheckedMap::new(),
            tag_groups: CheckedMap::new(),
            tag_group_queue: PendingSlots::new(),
            layers: CheckedMap::new(),
            layer_queue: PendingSlots::new(),
            priority,
            permissions: HashMap::new(),
            lock: NodeLock::new(),
            pending_link: false,
        }
    }

    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    pub fn state(&self) -> EntityState {
        self.lifecycle.state()
    }

    pub fn is_subscribed(&self) -> bool {
        self.lifecycle.is_subscribed()
    }

    pub fn version(&self) -> u32 {
        self.lifecycle.version()
    }

    pub fn crc32(&self) -> u32 {
        self.lifecycle.crc32()
    }

    pub fn custom_type(&self) -> CustomType {
        self.custom_type
    }

    pub fn class_name(&self) -> &'static str {
        self.class.name()
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn child_node(&self, node_id: NodeId) -> Option<NodeKey> {
        self.child_nodes.get(&node_id).copied()
    }

    pub fn child_node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.child_nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn tag_group(&self, tag_group_id: TagGroupId) -> Option<TagGroupKey> {
        self.tag_groups.get(&tag_group_id).copied()
    }

    pub fn tag_group_count(&self) -> usize {
        self.tag_groups.len()
    }

    pub fn pending_tag_group(&self, custom_type: CustomType) -> Option<TagGroupKey> {
        self.tag_group_queue.get(custom_type)
    }

    pub fn layer(&self, layer_id: LayerId) -> Option<LayerKey> {
        self.layers.get(&layer_id).copied()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn pending_layer(&self, custom_type: CustomType) -> Option<LayerKey> {
        self.layer_queue.get(custom_type)
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn permission(&self, user_id: UserId) -> Option<Permission> {
        self.permissions.get(&user_id).copied()
    }

    pub fn lock_state(&self) -> LockState {
        self.lock.state()
    }

    pub fn lock_holder(&self) -> Option<NodeId> {
        self.lock.holder()
    }

    pub fn has_pending_link(&self) -> bool {
        self.pending_link
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("state", &self.lifecycle.state())
            .field("custom_type", &self.custom_type)
            .field("class", &self.class.name())
            .field("user_id", &self.user_id)
            .field("priority", &self.priority)
            .finish()
    }
}

impl SessionEntity for Node {
    type Key = NodeKey;
    const KIND: EntityKind = EntityKind::Node;

    fn arena(session: &Session) -> &BigMap<NodeKey, Self> {
        &session.nodes
    }

    fn arena_mut(session: &mut Session) -> &mut BigMap<NodeKey, Self> {
        &mut session.nodes
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

    fn create_request(session: &Session, key: &NodeKey) -> Option<Request> {
        let node = session.nodes.get(key)?;
        Some(Request::NodeCreate {
            custom_type: node.custom_type,
        })
    }

    fn destroy_request(session: &Session, key: &NodeKey) -> Option<Request> {
        let node_id = session.nodes.get(key)?.id?;
        Some(Request::NodeDestroy { node_id })
    }

    fn subscribe_request(session: &Session, key: &NodeKey) -> Option<Request> {
        let node = session.nodes.get(key)?;
        Some(Request::NodeSubscribe {
            node_id: node.id?,
            version: node.lifecycle.version(),
            crc32: node.lifecycle.crc32(),
        })
    }

    fn unsubscribe_request(session: &Session, key: &NodeKey) -> Option<Request> {
        let node = session.nodes.get(key)?;
        Some(Request::NodeUnsubscribe {
            node_id: node.id?,
            version: node.lifecycle.version(),
            crc32: node.lifecycle.crc32(),
        })
    }

    fn teardown(session: &mut Session, key: &NodeKey, cascade: bool) -> Option<Self> {
        let mut node = session.nodes.remove(key)?;

        if let Some(node_id) = node.id {
            session.node_ids.discard(&node_id);
            if let Some(parent) = node.parent.and_then(|parent| session.nodes.get_mut(&parent)) {
                parent.child_nodes.discard(&node_id);
            }
        } else {
            session.pending_nodes.remove(node.custom_type, key);
        }

        for (child_id, child_key) in node.child_nodes.drain() {
            let linked_here_only = session
                .nodes
                .get(&child_key)
                .is_some_and(|child| child.pending_link);
            if cascade && !linked_here_only {
                Node::teardown(session, &child_key, true);
            } else if linked_here_only {
                // the server never saw this link, so no destroy will follow
                session.restore_server_parent(&child_key, child_id);
            } else if let Some(child) = session.nodes.get_mut(&child_key) {
                child.parent = None;
                child.server_parent = None;
            }
        }
        // speculative children are not in the child map yet
        for pending_key in session.pending_nodes.keys() {
            if let Some(pending) = session.nodes.get_mut(&pending_key) {
                if pending.parent == Some(*key) {
                    pending.parent = None;
                }
            }
        }

        let tag_group_keys: Vec<TagGroupKey> = node
            .tag_groups
            .drain()
            .map(|(_, tag_group_key)| tag_group_key)
            .chain(node.tag_group_queue.keys())
            .collect();
        for tag_group_key in tag_group_keys {
            TagGroup::teardown(session, &tag_group_key, true);
        }

        let layer_keys: Vec<LayerKey> = node
            .layers
            .drain()
            .map(|(_, layer_key)| layer_key)
            .chain(node.layer_queue.keys())
            .collect();
        for layer_key in layer_keys {
            Layer::teardown(session, &layer_key, true);
        }
        node.tag_group_queue = PendingSlots::new();
        node.layer_queue = PendingSlots::new();

        debug!("Removed node {:?} ({:?})", node.id, key);
        Some(node)
    }
}

impl Session {
    // Local operations

    /// Constructs a node. Without a known id the node is speculative: it is
    /// queued and a create request goes out (or waits for the connection).
    pub fn create_node(&mut self, init: NodeInit) -> Result<NodeKey, SessionError> {
        let NodeInit {
            custom_type,
            class,
            parent,
            node_id,
            user_id,
        } = init;

        if let Some(parent) = &parent {
            if !self.nodes.contains_key(parent) {
                return Err(ConstructionError::UnknownOwner {
                    kind: EntityKind::Node,
                    context: "create_node parent",
                }
                .into());
            }
        }
        if let Some(node_id) = node_id {
            if self.node_ids.contains_key(&node_id) {
                return Err(ConstructionError::DuplicateId {
                    kind: EntityKind::Node,
                    id: node_id,
                }
                .into());
            }
        }
        let class = match class {
            Some(class) => {
                check_declared_type(class.name(), class.custom_type(), custom_type)?;
                class
            }
            None => self.registry.resolve_node(custom_type),
        };

        let priority = self.config().default_priority;
        let node = Node::new(custom_type, class.clone(), node_id, parent, user_id, priority);
        let key = self.nodes.insert(node);

        match node_id {
            Some(node_id) => {
                self.node_ids.insert(node_id, key);
                if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
                    parent.child_nodes.insert(node_id, key);
                }
            }
            None => self.pending_nodes.push(custom_type, key),
        }

        self.lifecycle_create::<Node>(&key, node_id.is_some());
        class.on_construct(self, key)?;

        Ok(key)
    }

    /// Destroys a node. Before confirmation the intent is remembered and
    /// carried out once the node is confirmed.
    ///
    /// # Panics
    ///
    /// Panics if the node is already being destroyed.
    pub fn destroy_node(&mut self, key: &NodeKey) -> Result<(), SessionError> {
        self.lifecycle_destroy::<Node>(key, "destroy_node")
    }

    pub fn subscribe_node(&mut self, key: &NodeKey) -> Result<bool, SessionError> {
        self.subscribe_entity::<Node>(key, "subscribe_node")
    }

    pub fn unsubscribe_node(&mut self, key: &NodeKey) -> Result<bool, SessionError> {
        self.unsubscribe_entity::<Node>(key, "unsubscribe_node")
    }

    /// Stores the priority; it is sent right away when the node has an id,
    /// otherwise once the node is confirmed.
    pub fn set_node_priority(
        &mut self,
        key: &NodeKey,
        priority: Priority,
    ) -> Result<(), SessionError> {
        let Some(node) = self.nodes.get_mut(key) else {
            return Err(unknown_node("set_node_priority"));
        };
        node.priority = priority;
        if let Some(node_id) = node.id {
            self.send(Request::NodePriority { node_id, priority });
        }
        Ok(())
    }

    /// Moves `child` under `parent`.
    ///
    /// An unconfirmed child is simply re-parented locally; its confirmation
    /// sends the link if the server put it elsewhere. A confirmed child under a
    /// confirmed parent is re-parented by the server: the request is sent and
    /// the local tree changes when the link event comes back.
    pub fn link_node(&mut self, child: &NodeKey, parent: &NodeKey) -> Result<(), SessionError> {
        let Some(parent_id) = self.nodes.get(parent).map(|node| node.id) else {
            return Err(unknown_node("link_node parent"));
        };
        let Some((child_id, old_parent)) = self.nodes.get(child).map(|node| (node.id, node.parent))
        else {
            return Err(unknown_node("link_node child"));
        };

        let Some(child_id) = child_id else {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = Some(*parent);
            }
            return Ok(());
        };

        match parent_id {
            Some(parent_id) => {
                self.send(Request::NodeLink {
                    parent_id,
                    child_id,
                });
            }
            None => {
                // parent still speculative: move locally, link on its confirmation
                if let Some(old_parent) = old_parent.and_then(|key| self.nodes.get_mut(&key)) {
                    old_parent.child_nodes.discard(&child_id);
                }
                if let Some(new_parent) = self.nodes.get_mut(parent) {
                    new_parent.child_nodes.insert(child_id, *child);
                }
                if let Some(node) = self.nodes.get_mut(child) {
                    node.parent = Some(*parent);
                    node.pending_link = true;
                }
            }
        }
        Ok(())
    }

    /// Puts a child whose link was never sent back under the parent the
    /// server knows, or detaches it when that parent is gone.
    fn restore_server_parent(&mut self, key: &NodeKey, node_id: NodeId) {
        let Some(server_parent) = self.nodes.get(key).map(|node| node.server_parent) else {
            return;
        };
        let restored = match server_parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            Some(parent) => {
                if !parent.child_nodes.contains_key(&node_id) {
                    parent.child_nodes.insert(node_id, *key);
                }
                server_parent
            }
            None => None,
        };
        if let Some(node) = self.nodes.get_mut(key) {
            debug!("Restoring node {} to parent {:?}", node_id, restored);
            node.parent = restored;
            node.server_parent = restored;
            node.pending_link = false;
        }
    }

    /// Requests the node lock. Sent once the node is confirmed.
    pub fn lock_node(&mut self, key: &NodeKey) -> Result<(), SessionError> {
        let Some(node) = self.nodes.get_mut(key) else {
            return Err(unknown_node("lock_node"));
        };
        let created = node.lifecycle.state() == EntityState::Created;
        let send_now = node.lock.try_request_lock(created)?;
        if let (true, Some(node_id)) = (send_now, node.id) {
            self.send(Request::NodeLock { node_id });
        }
        Ok(())
    }

    /// Requests release of the node lock. Rejected, with nothing sent, unless
    /// this client's avatar holds the lock.
    pub fn unlock_node(&mut self, key: &NodeKey) -> Result<(), SessionError> {
        let Some(identity) = self.identity() else {
            return Err(SessionError::NotConnected {
                context: "unlock_node",
            });
        };
        let Some(node) = self.nodes.get_mut(key) else {
            return Err(unknown_node("unlock_node"));
        };
        let Some(node_id) = node.id else {
            return Err(SessionError::NotIdentified {
                kind: EntityKind::Node,
                context: "unlock_node",
            });
        };
        node.lock.try_request_unlock(identity.avatar_id)?;
        self.send(Request::NodeUnlock { node_id });
        Ok(())
    }

    /// Asks the server to hand the node to another user. Only the current
    /// owner may do so; the local owner changes when the server confirms.
    pub fn set_node_owner(&mut self, key: &NodeKey, user_id: UserId) -> Result<(), SessionError> {
        let Some(identity) = self.identity() else {
            return Err(SessionError::NotConnected {
                context: "set_node_owner",
            });
        };
        let Some(node) = self.nodes.get(key) else {
            return Err(unknown_node("set_node_owner"));
        };
        let Some(node_id) = node.id else {
            return Err(SessionError::NotIdentified {
                kind: EntityKind::Node,
                context: "set_node_owner",
            });
        };
        if node.user_id != Some(identity.user_id) {
            return Err(OwnershipError::NotOwner {
                node_id,
                owner: node.user_id,
                requester: identity.user_id,
            }
            .into());
        }
        self.send(Request::NodeOwner { node_id, user_id });
        Ok(())
    }

    // Inbound

    pub fn receive_node_create(
        &mut self,
        node_id: NodeId,
        parent_id: Option<NodeId>,
        user_id: UserId,
        custom_type: CustomType,
    ) -> Option<NodeKey> {
        if self.is_frozen("node_create") {
            return None;
        }

        let key = match self.node_ids.get(&node_id).copied() {
            Some(key) => {
                if self.entity_state::<Node>(&key) != Some(EntityState::Assumed) {
                    warn!("Ignoring repeated create of node {}", node_id);
                    return Some(key);
                }
                // assumed earlier, now announced
                self.adopt_confirmed_parent(&key, node_id, parent_id);
                if let Some(node) = self.nodes.get_mut(&key) {
                    node.user_id = Some(user_id);
                }
                self.lifecycle_receive_create::<Node>(&key);
                key
            }
            None => match self.match_pending_node(parent_id, user_id, custom_type) {
                Some(key) => {
                    self.bind_pending_node(&key, node_id, parent_id, user_id);
                    self.lifecycle_receive_create::<Node>(&key);
                    key
                }
                None => {
                    let key = self.materialize_node(node_id, parent_id, user_id, custom_type);
                    self.lifecycle_receive_create::<Node>(&key);
                    key
                }
            },
        };

        if self.entity_state::<Node>(&key) == Some(EntityState::Created) {
            self.flush_confirmed_node(&key);
        }
        if let Some(class) = self.nodes.get(&key).map(|node| node.class.clone()) {
            class.on_create(self, key);
        }
        Some(key)
    }

    pub fn receive_node_destroy(&mut self, node_id: NodeId) -> Option<Node> {
        if self.is_frozen("node_destroy") {
            return None;
        }
        let Some(key) = self.node_ids.get(&node_id).copied() else {
            debug!("Ignoring destroy of unknown node {}", node_id);
            return None;
        };
        self.lifecycle_receive_destroy::<Node>(&key)
    }

    pub fn receive_node_link(&mut self, parent_id: NodeId, child_id: NodeId) -> Option<NodeKey> {
        if self.is_frozen("node_link") {
            return None;
        }
        let Some(parent_key) = self.node_ids.get(&parent_id).copied() else {
            debug!("Ignoring link to unknown parent node {}", parent_id);
            return None;
        };
        let child_key = self.node_ids.get(&child_id).copied()?;

        let old_parent = self.nodes.get(&child_key)?.parent;
        if let Some(old_parent) = old_parent.and_then(|key| self.nodes.get_mut(&key)) {
            old_parent.child_nodes.discard(&child_id);
        }
        if let Some(parent) = self.nodes.get_mut(&parent_key) {
            parent.child_nodes.insert(child_id, child_key);
        }
        if let Some(child) = self.nodes.get_mut(&child_key) {
            child.parent = Some(parent_key);
            child.server_parent = Some(parent_key);
            child.pending_link = false;
        }
        Some(child_key)
    }

    pub fn receive_node_lock(&mut self, node_id: NodeId, avatar_id: NodeId) -> Option<NodeKey> {
        if self.is_frozen("node_lock") {
            return None;
        }
        let key = self.node_ids.get(&node_id).copied()?;
        self.nodes.get_mut(&key)?.lock.receive_lock(avatar_id);
        Some(key)
    }

    pub fn receive_node_unlock(&mut self, node_id: NodeId, avatar_id: NodeId) -> Option<NodeKey> {
        if self.is_frozen("node_unlock") {
            return None;
        }
        let key = self.node_ids.get(&node_id).copied()?;
        let node = self.nodes.get_mut(&key)?;
        if node.lock.holder().is_some_and(|holder| holder != avatar_id) {
            warn!(
                "Node {} unlocked by avatar {} while held by {:?}",
                node_id,
                avatar_id,
                node.lock.holder()
            );
        }
        node.lock.receive_unlock();
        Some(key)
    }

    pub fn receive_node_owner(&mut self, node_id: NodeId, user_id: UserId) -> Option<NodeKey> {
        if self.is_frozen("node_owner") {
            return None;
        }
        let key = self.node_ids.get(&node_id).copied()?;
        self.nodes.get_mut(&key)?.user_id = Some(user_id);
        Some(key)
    }

    pub fn receive_node_permission(
        &mut self,
        node_id: NodeId,
        user_id: UserId,
        permission: Permission,
    ) -> Option<NodeKey> {
        if self.is_frozen("node_perm") {
            return None;
        }
        let key = self.node_ids.get(&node_id).copied()?;
        self.nodes
            .get_mut(&key)?
            .permissions
            .insert(user_id, permission);
        Some(key)
    }

    // Reconciliation

    /// A confirmation is ours when it puts the node under our avatar, owned by
    /// our user, and a node of that type is waiting.
    fn match_pending_node(
        &mut self,
        parent_id: Option<NodeId>,
        user_id: UserId,
        custom_type: CustomType,
    ) -> Option<NodeKey> {
        let identity = self.identity()?;
        if parent_id != Some(identity.avatar_id) || user_id != identity.user_id {
            return None;
        }
        self.pending_nodes.pop_front(custom_type)
    }

    fn bind_pending_node(
        &mut self,
        key: &NodeKey,
        node_id: NodeId,
        parent_id: Option<NodeId>,
        user_id: UserId,
    ) {
        self.node_ids.insert(node_id, *key);
        let Some(node) = self.nodes.get_mut(key) else {
            panic!("Pending node {:?} is not in its arena", key);
        };
        node.id = Some(node_id);
        node.user_id = Some(user_id);

        self.adopt_confirmed_parent(key, node_id, parent_id);
    }

    /// Puts a freshly identified node into its parent's child map. A local
    /// parent that differs from the confirmed one wins and is linked later.
    fn adopt_confirmed_parent(
        &mut self,
        key: &NodeKey,
        node_id: NodeId,
        parent_id: Option<NodeId>,
    ) {
        let confirmed_parent =
            parent_id.and_then(|parent_id| self.node_ids.get(&parent_id).copied());
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        node.server_parent = confirmed_parent;
        let local_parent = node.parent;

        let parent = match (local_parent, confirmed_parent) {
            (None, confirmed) => {
                if let Some(node) = self.nodes.get_mut(key) {
                    node.parent = confirmed;
                }
                confirmed
            }
            (Some(local), Some(confirmed)) if local == confirmed => Some(local),
            (Some(local), _) => {
                if let Some(node) = self.nodes.get_mut(key) {
                    node.pending_link = true;
                }
                Some(local)
            }
        };

        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            if !parent.child_nodes.contains_key(&node_id) {
                parent.child_nodes.insert(node_id, *key);
            }
        }
    }

    /// A node announced by the server that this client did not ask for.
    fn materialize_node(
        &mut self,
        node_id: NodeId,
        parent_id: Option<NodeId>,
        user_id: UserId,
        custom_type: CustomType,
    ) -> NodeKey {
        let parent = parent_id.and_then(|parent_id| self.node_ids.get(&parent_id).copied());
        let class = self.registry.resolve_node(custom_type);
        let priority = self.config().default_priority;
        let node = Node::new(
            custom_type,
            class.clone(),
            Some(node_id),
            parent,
            Some(user_id),
            priority,
        );
        let key = self.nodes.insert(node);
        self.node_ids.insert(node_id, key);
        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            parent.child_nodes.insert(node_id, key);
        }

        self.lifecycle_create::<Node>(&key, true);
        if let Err(error) = class.on_construct(self, key) {
            warn!(
                "Constructing {} for node {} failed: {}",
                class.name(),
                node_id,
                error
            );
        }
        key
    }

    /// Sends everything that waited for this node's id.
    pub(crate) fn flush_confirmed_node(&mut self, key: &NodeKey) {
        let default_priority = self.config().default_priority;
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        let Some(node_id) = node.id else {
            return;
        };
        let priority = node.priority;
        let lock_deferred = node.lock.take_deferred();
        let parent = node.parent;
        let child_keys: Vec<NodeKey> = node.child_nodes.values().copied().collect();

        if priority != default_priority {
            self.send(Request::NodePriority { node_id, priority });
        }
        self.flush_pending_link(key, parent);
        if lock_deferred {
            info!("Sending deferred lock of node {}", node_id);
            self.send(Request::NodeLock { node_id });
        }
        self.flush_node_children(key);
        // children that were linked here while this node was speculative
        for child_key in child_keys {
            let child_parent = self.nodes.get(&child_key).and_then(|child| child.parent);
            self.flush_pending_link(&child_key, child_parent);
        }
    }

    fn flush_pending_link(&mut self, key: &NodeKey, parent: Option<NodeKey>) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        if !node.pending_link {
            return;
        }
        let Some(child_id) = node.id else {
            return;
        };
        let Some(parent_id) = parent.and_then(|parent| self.nodes.get(&parent)?.id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(key) {
            node.pending_link = false;
        }
        self.send(Request::NodeLink {
            parent_id,
            child_id,
        });
    }

    /// Sends deferred creates of tag groups and top-level layers.
    pub(crate) fn flush_node_children(&mut self, key: &NodeKey) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        let tag_group_keys = node.tag_group_queue.keys();
        let layer_keys = node.layer_queue.keys();

        for tag_group_key in tag_group_keys {
            self.flush_deferred_create::<TagGroup>(&tag_group_key);
        }
        for layer_key in layer_keys {
            let parent_layer = self
                .layers
                .get(&layer_key)
                .and_then(|layer| layer.parent_layer);
            let parent_layer_known = match parent_layer {
                None => true,
                Some(parent_layer) => self
                    .layers
                    .get(&parent_layer)
                    .is_some_and(|parent_layer| parent_layer.id.is_some()),
            };
            if parent_layer_known {
                self.flush_deferred_create::<Layer>(&layer_key);
            }
        }
    }
}

fn unknown_node(context: &'static str) -> SessionError {
    SessionError::UnknownEntity {
        kind: EntityKind::Node,
        context,
    }
}

/// A class without a declared type accepts any; otherwise the requested type
/// must be the declared one.
pub(crate) fn check_declared_type(
    class: &'static str,
    declared: Option<CustomType>,
    requested: CustomType,
) -> Result<(), ConstructionError> {
    match declared {
        Some(declared) if declared != requested => Err(ConstructionError::ClassTypeMismatch {
            class,
            declared: Some(declared),
            requested,
        }),
        _ => Ok(()),
    }
}
