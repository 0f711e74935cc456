use std::mem;

use log::{debug, info, warn};

use scenesync_shared::{
    BigMap, BigMapKey, CheckedMap, CustomType, ItemId, LayerId, NodeId, Request, TagGroupId, TagId,
    UserId, Value, ROOT_NODE_CUSTOM_TYPE, ROOT_NODE_ID,
};

use crate::{
    config::SessionConfig,
    connection::{ConnectionState, SessionIdentity},
    registry::ClassRegistry,
    world::{
        keys::{LayerKey, NodeKey, TagGroupKey, TagKey},
        layer::Layer,
        node::{Node, NodeInit},
        pending::PendingNodes,
        tag::Tag,
        tag_group::TagGroup,
    },
};

/// Client-side mirror of the shared scene graph.
///
/// Owns every node, tag group, tag and layer this client knows about, turns
/// local operations into [`Request`]s and reconciles server events against
/// what was requested. Requests accumulate until collected with
/// [`Session::take_outgoing_requests`].
pub struct Session {
    config: SessionConfig,
    pub(crate) registry: ClassRegistry,
    connection_state: ConnectionState,
    identity: Option<SessionIdentity>,
    pub(crate) nodes: BigMap<NodeKey, Node>,
    pub(crate) tag_groups: BigMap<TagGroupKey, TagGroup>,
    pub(crate) tags: BigMap<TagKey, Tag>,
    pub(crate) layers: BigMap<LayerKey, Layer>,
    pub(crate) node_ids: CheckedMap<NodeId, NodeKey>,
    pub(crate) pending_nodes: PendingNodes,
    outgoing_requests: Vec<Request>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default(), ClassRegistry::default())
    }
}

impl Session {
    /// Create a new Session
    pub fn new(config: SessionConfig, registry: ClassRegistry) -> Self {
        Self {
            config,
            registry,
            connection_state: ConnectionState::Connecting,
            identity: None,
            nodes: BigMap::new(),
            tag_groups: BigMap::new(),
            tags: BigMap::new(),
            layers: BigMap::new(),
            node_ids: CheckedMap::new(),
            pending_nodes: PendingNodes::new(),
            outgoing_requests: Vec::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.identity
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    // Outgoing

    /// Drains the requests produced since the last call, in production order.
    pub fn take_outgoing_requests(&mut self) -> Vec<Request> {
        mem::take(&mut self.outgoing_requests)
    }

    pub(crate) fn send(&mut self, request: Request) {
        if !self.connection_state.is_connected() {
            debug!(
                "Dropping {} request while {}",
                request.name(),
                self.connection_state
            );
            return;
        }
        debug!("Queueing {} request", request.name());
        self.outgoing_requests.push(request);
    }

    /// Inbound events are ignored once the connection is gone.
    pub(crate) fn is_frozen(&self, event: &'static str) -> bool {
        if self.connection_state.is_terminated() {
            debug!("Ignoring {} event after disconnect", event);
            return true;
        }
        false
    }

    // Connection

    /// Handles the server's acceptance: records the identity, creates the
    /// root node and sends everything that waited for the connection.
    /// Returns the root node.
    pub fn receive_connect_accept(
        &mut self,
        user_id: UserId,
        avatar_id: NodeId,
    ) -> Option<NodeKey> {
        if self.is_frozen("connect_accept") {
            return None;
        }
        info!("Connected as user {} with avatar node {}", user_id, avatar_id);
        self.identity = Some(SessionIdentity { user_id, avatar_id });
        self.connection_state = ConnectionState::Connected;

        let root = match self.node_ids.get(&ROOT_NODE_ID).copied() {
            Some(root) => root,
            None => {
                let init = NodeInit::new(ROOT_NODE_CUSTOM_TYPE)
                    .with_id(ROOT_NODE_ID)
                    .with_user(self.config.root_user_id);
                match self.create_node(init) {
                    Ok(root) => root,
                    Err(error) => {
                        warn!("Constructing the root node failed: {}", error);
                        self.node_ids.get(&ROOT_NODE_ID).copied()?
                    }
                }
            }
        };

        for pending_key in self.pending_nodes.keys() {
            self.flush_deferred_create::<Node>(&pending_key);
        }

        let mut node_keys: Vec<(NodeId, NodeKey)> = self
            .node_ids
            .iter()
            .map(|(node_id, node_key)| (*node_id, *node_key))
            .collect();
        node_keys.sort_by_key(|(node_id, _)| *node_id);
        let default_priority = self.config.default_priority;
        for (node_id, node_key) in node_keys {
            self.catch_up_subscription::<Node>(&node_key);
            let priority = self.nodes.get(&node_key).map(|node| node.priority);
            if let Some(priority) = priority.filter(|priority| *priority != default_priority) {
                self.send(Request::NodePriority { node_id, priority });
            }
            self.flush_node_children(&node_key);
        }
        let tag_group_keys = creation_order(&self.tag_groups);
        for tag_group_key in tag_group_keys {
            self.catch_up_subscription::<TagGroup>(&tag_group_key);
            self.flush_tag_group_children(&tag_group_key);
        }
        let tag_keys = creation_order(&self.tags);
        for tag_key in tag_keys {
            self.catch_up_subscription::<Tag>(&tag_key);
        }
        let layer_keys = creation_order(&self.layers);
        for layer_key in layer_keys {
            self.catch_up_subscription::<Layer>(&layer_key);
        }

        Some(root)
    }

    pub fn receive_connect_terminate(&mut self) {
        if self.connection_state.is_terminated() {
            return;
        }
        info!("Connection terminated by server");
        self.connection_state = ConnectionState::Disconnected;
    }

    /// Asks the server to end the session.
    pub fn terminate(&mut self) {
        if !self.connection_state.is_connected() {
            return;
        }
        info!("Terminating connection");
        self.send(Request::ConnectTerminate);
        self.connection_state = ConnectionState::Disconnecting;
    }

    // Lookups

    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn tag_group(&self, key: &TagGroupKey) -> Option<&TagGroup> {
        self.tag_groups.get(key)
    }

    pub fn tag(&self, key: &TagKey) -> Option<&Tag> {
        self.tags.get(key)
    }

    pub fn layer(&self, key: &LayerKey) -> Option<&Layer> {
        self.layers.get(key)
    }

    pub fn node_by_id(&self, node_id: NodeId) -> Option<NodeKey> {
        self.node_ids.get(&node_id).copied()
    }

    pub fn tag_group_by_id(
        &self,
        node_id: NodeId,
        tag_group_id: TagGroupId,
    ) -> Option<TagGroupKey> {
        let node_key = self.node_by_id(node_id)?;
        self.nodes.get(&node_key)?.tag_group(tag_group_id)
    }

    pub fn tag_by_id(
        &self,
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
    ) -> Option<TagKey> {
        let tag_group_key = self.tag_group_by_id(node_id, tag_group_id)?;
        self.tag_groups.get(&tag_group_key)?.tag(tag_id)
    }

    pub fn layer_by_id(&self, node_id: NodeId, layer_id: LayerId) -> Option<LayerKey> {
        let node_key = self.node_by_id(node_id)?;
        self.nodes.get(&node_key)?.layer(layer_id)
    }

    pub fn layer_item_by_id(
        &self,
        node_id: NodeId,
        layer_id: LayerId,
        item_id: ItemId,
    ) -> Option<&Value> {
        let layer_key = self.layer_by_id(node_id, layer_id)?;
        self.layers.get(&layer_key)?.item(item_id)
    }

    pub fn root_node(&self) -> Option<NodeKey> {
        self.node_by_id(ROOT_NODE_ID)
    }

    pub fn avatar_node(&self) -> Option<NodeKey> {
        self.node_by_id(self.identity?.avatar_id)
    }

    /// Speculative nodes of `custom_type`, oldest first.
    pub fn pending_nodes(&self, custom_type: CustomType) -> Vec<NodeKey> {
        self.pending_nodes.queue(custom_type)
    }

    pub fn pending_node_count(&self, custom_type: CustomType) -> usize {
        self.pending_nodes.len(custom_type)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tag_group_count(&self) -> usize {
        self.tag_groups.len()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

fn creation_order<K: BigMapKey, V>(arena: &BigMap<K, V>) -> Vec<K> {
    let mut keys: Vec<K> = arena.iter().map(|(key, _)| key).collect();
    keys.sort_by_key(|key| key.to_u64());
    keys
}
