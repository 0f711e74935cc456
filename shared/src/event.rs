use crate::{
    types::{CustomType, ItemId, LayerId, NodeId, Permission, TagGroupId, TagId, UserId},
    value::{Value, ValueType},
};

/// Confirmed state change delivered by the authoritative source, in delivery
/// order.
#[derive(Clone, PartialEq, Debug)]
pub enum InboundEvent {
    ConnectAccept {
        user_id: UserId,
        avatar_id: NodeId,
    },
    ConnectTerminate,

    NodeCreate {
        node_id: NodeId,
        parent_id: Option<NodeId>,
        user_id: UserId,
        custom_type: CustomType,
    },
    NodeDestroy {
        node_id: NodeId,
    },
    NodeLink {
        parent_id: NodeId,
        child_id: NodeId,
    },
    NodeLock {
        node_id: NodeId,
        avatar_id: NodeId,
    },
    NodeUnlock {
        node_id: NodeId,
        avatar_id: NodeId,
    },
    NodeOwner {
        node_id: NodeId,
        user_id: UserId,
    },
    NodePermission {
        node_id: NodeId,
        user_id: UserId,
        permission: Permission,
    },
    NodeSubscribe {
        node_id: NodeId,
        version: u32,
        crc32: u32,
    },
    NodeUnsubscribe {
        node_id: NodeId,
        version: u32,
        crc32: u32,
    },

    TagGroupCreate {
        node_id: NodeId,
        tag_group_id: TagGroupId,
        custom_type: CustomType,
    },
    TagGroupDestroy {
        node_id: NodeId,
        tag_group_id: TagGroupId,
    },
    TagGroupSubscribe {
        node_id: NodeId,
        tag_group_id: TagGroupId,
        version: u32,
        crc32: u32,
    },
    TagGroupUnsubscribe {
        node_id: NodeId,
        tag_group_id: TagGroupId,
        version: u32,
        crc32: u32,
    },

    TagCreate {
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
        value_type: ValueType,
        count: u8,
        custom_type: CustomType,
    },
    TagDestroy {
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
    },
    TagSetValue {
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
        value: Value,
    },

    LayerCreate {
        node_id: NodeId,
        parent_layer_id: Option<LayerId>,
        layer_id: LayerId,
        value_type: ValueType,
        count: u8,
        custom_type: CustomType,
    },
    LayerDestroy {
        node_id: NodeId,
        layer_id: LayerId,
    },
    LayerSubscribe {
        node_id: NodeId,
        layer_id: LayerId,
        version: u32,
        crc32: u32,
    },
    LayerUnsubscribe {
        node_id: NodeId,
        layer_id: LayerId,
        version: u32,
        crc32: u32,
    },
    LayerSetValue {
        node_id: NodeId,
        layer_id: LayerId,
        item_id: ItemId,
        value: Value,
    },
    LayerUnsetValue {
        node_id: NodeId,
        layer_id: LayerId,
        item_id: ItemId,
    },
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectAccept { .. } => "connect_accept",
            Self::ConnectTerminate => "connect_terminate",
            Self::NodeCreate { .. } => "node_create",
            Self::NodeDestroy { .. } => "node_destroy",
            Self::NodeLink { .. } => "node_link",
            Self::NodeLock { .. } => "node_lock",
            Self::NodeUnlock { .. } => "node_unlock",
            Self::NodeOwner { .. } => "node_owner",
            Self::NodePermission { .. } => "node_perm",
            Self::NodeSubscribe { .. } => "node_subscribe",
            Self::NodeUnsubscribe { .. } => "node_unsubscribe",
            Self::TagGroupCreate { .. } => "taggroup_create",
            Self::TagGroupDestroy { .. } => "taggroup_destroy",
            Self::TagGroupSubscribe { .. } => "taggroup_subscribe",
            Self::TagGroupUnsubscribe { .. } => "taggroup_unsubscribe",
            Self::TagCreate { .. } => "tag_create",
            Self::TagDestroy { .. } => "tag_destroy",
            Self::TagSetValue { .. } => "tag_set_value",
            Self::LayerCreate { .. } => "layer_create",
            Self::LayerDestroy { .. } => "layer_destroy",
            Self::LayerSubscribe { .. } => "layer_subscribe",
            Self::LayerUnsubscribe { .. } => "layer_unsubscribe",
            Self::LayerSetValue { .. } => "layer_set_value",
            Self::LayerUnsetValue { .. } => "layer_unset_value",
        }
    }
}
