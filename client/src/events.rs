use log::debug;

use scenesync_shared::{InboundEvent, Value};

use crate::{
    session::Session,
    world::{
        keys::{LayerKey, NodeKey, TagGroupKey, TagKey},
        layer::Layer,
        node::Node,
        tag::Tag,
        tag_group::TagGroup,
    },
};

/// What an inbound event did to the local model.
#[derive(Debug)]
pub enum Resolved {
    /// Connection accepted; carries the root node
    Connected(NodeKey),
    Terminated,
    Node(NodeKey),
    TagGroup(TagGroupKey),
    Tag(TagKey),
    Layer(LayerKey),
    DestroyedNode(Node),
    DestroyedTagGroup(TagGroup),
    DestroyedTag(Tag),
    DestroyedLayer(Layer),
    /// A layer item was removed; carries its last value
    UnsetItem(Value),
}

impl Session {
    /// Applies one server event. Returns None when the event referred to
    /// something unknown, was rejected, or changed nothing observable.
    pub fn receive_event(&mut self, event: InboundEvent) -> Option<Resolved> {
        match event {
            InboundEvent::ConnectAccept { user_id, avatar_id } => self
                .receive_connect_accept(user_id, avatar_id)
                .map(Resolved::Connected),
            InboundEvent::ConnectTerminate => {
                self.receive_connect_terminate();
                Some(Resolved::Terminated)
            }

            InboundEvent::NodeCreate {
                node_id,
                parent_id,
                user_id,
                custom_type,
            } => self
                .receive_node_create(node_id, parent_id, user_id, custom_type)
                .map(Resolved::Node),
            InboundEvent::NodeDestroy { node_id } => self
                .receive_node_destroy(node_id)
                .map(Resolved::DestroyedNode),
            InboundEvent::NodeLink {
                parent_id,
                child_id,
            } => self
                .receive_node_link(parent_id, child_id)
                .map(Resolved::Node),
            InboundEvent::NodeLock { node_id, avatar_id } => self
                .receive_node_lock(node_id, avatar_id)
                .map(Resolved::Node),
            InboundEvent::NodeUnlock { node_id, avatar_id } => self
                .receive_node_unlock(node_id, avatar_id)
                .map(Resolved::Node),
            InboundEvent::NodeOwner { node_id, user_id } => self
                .receive_node_owner(node_id, user_id)
                .map(Resolved::Node),
            InboundEvent::NodePermission {
                node_id,
                user_id,
                permission,
            } => self
                .receive_node_permission(node_id, user_id, permission)
                .map(Resolved::Node),

            InboundEvent::TagGroupCreate {
                node_id,
                tag_group_id,
                custom_type,
            } => self
                .receive_tag_group_create(node_id, tag_group_id, custom_type)
                .map(Resolved::TagGroup),
            InboundEvent::TagGroupDestroy {
                node_id,
                tag_group_id,
            } => self
                .receive_tag_group_destroy(node_id, tag_group_id)
                .map(Resolved::DestroyedTagGroup),

            InboundEvent::TagCreate {
                node_id,
                tag_group_id,
                tag_id,
                value_type,
                count,
                custom_type,
            } => self
                .receive_tag_create(node_id, tag_group_id, tag_id, value_type, count, custom_type)
                .map(Resolved::Tag),
            InboundEvent::TagDestroy {
                node_id,
                tag_group_id,
                tag_id,
            } => self
                .receive_tag_destroy(node_id, tag_group_id, tag_id)
                .map(Resolved::DestroyedTag),
            InboundEvent::TagSetValue {
                node_id,
                tag_group_id,
                tag_id,
                value,
            } => self
                .receive_tag_set_value(node_id, tag_group_id, tag_id, value)
                .map(Resolved::Tag),

            InboundEvent::LayerCreate {
                node_id,
                parent_layer_id,
                layer_id,
                value_type,
                count,
                custom_type,
            } => self
                .receive_layer_create(
                    node_id,
                    parent_layer_id,
                    layer_id,
                    value_type,
                    count,
                    custom_type,
                )
                .map(Resolved::Layer),
            InboundEvent::LayerDestroy { node_id, layer_id } => self
                .receive_layer_destroy(node_id, layer_id)
                .map(Resolved::DestroyedLayer),
            InboundEvent::LayerSetValue {
                node_id,
                layer_id,
                item_id,
                value,
            } => self
                .receive_layer_set_value(node_id, layer_id, item_id, value)
                .map(Resolved::Layer),
            InboundEvent::LayerUnsetValue {
                node_id,
                layer_id,
                item_id,
            } => self
                .receive_layer_unset_value(node_id, layer_id, item_id)
                .map(Resolved::UnsetItem),

            // acknowledgements carry nothing the model tracks
            event @ (InboundEvent::NodeSubscribe { .. }
            | InboundEvent::NodeUnsubscribe { .. }
            | InboundEvent::TagGroupSubscribe { .. }
            | InboundEvent::TagGroupUnsubscribe { .. }
            | InboundEvent::LayerSubscribe { .. }
            | InboundEvent::LayerUnsubscribe { .. }) => {
                debug!("Received {} acknowledgement", event.name());
                None
            }
        }
    }
}
