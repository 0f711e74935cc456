use crate::{
    types::{CustomType, ItemId, LayerId, NodeId, Priority, TagGroupId, TagId, UserId},
    value::{Value, ValueType},
};

/// Outbound request to the authoritative source. Requests are fire-and-forget:
/// the only acknowledgement is a later [`InboundEvent`](crate::InboundEvent).
#[derive(Clone, PartialEq, Debug)]
pub enum Request {
    NodeCreate {
        custom_type: CustomType,
    },
    NodeDestroy {
        node_id: NodeId,
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
    NodeLink {
        parent_id: NodeId,
        child_id: NodeId,
    },
    NodeLock {
        node_id: NodeId,
    },
    NodeUnlock {
        node_id: NodeId,
    },
    NodeOwner {
        node_id: NodeId,
        user_id: UserId,
    },
    NodePriority {
        node_id: NodeId,
        priority: Priority,
    },

    TagGroupCreate {
        node_id: NodeId,
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
        value_type: ValueType,
        count: u8,
        custom_type: CustomType,
    },
    TagDestroy {
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
    },
    TagSubscribe {
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
    },
    TagUnsubscribe {
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
    },
    TagSetValue {
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
        value_type: ValueType,
        value: Value,
    },

    LayerCreate {
        node_id: NodeId,
        parent_layer_id: Option<LayerId>,
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
        value_type: ValueType,
        value: Value,
    },
    LayerUnsetValue {
        node_id: NodeId,
        layer_id: LayerId,
        item_id: ItemId,
    },

    ConnectTerminate,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NodeCreate { .. } => "node_create",
            Self::NodeDestroy { .. } => "node_destroy",
            Self::NodeSubscribe { .. } => "node_subscribe",
            Self::NodeUnsubscribe { .. } => "node_unsubscribe",
            Self::NodeLink { .. } => "node_link",
            Self::NodeLock { .. } => "node_lock",
            Self::NodeUnlock { .. } => "node_unlock",
            Self::NodeOwner { .. } => "node_owner",
            Self::NodePriority { .. } => "node_priority",
            Self::TagGroupCreate { .. } => "taggroup_create",
            Self::TagGroupDestroy { .. } => "taggroup_destroy",
            Self::TagGroupSubscribe { .. } => "taggroup_subscribe",
            Self::TagGroupUnsubscribe { .. } => "taggroup_unsubscribe",
            Self::TagCreate { .. } => "tag_create",
            Self::TagDestroy { .. } => "tag_destroy",
            Self::TagSubscribe { .. } => "tag_subscribe",
            Self::TagUnsubscribe { .. } => "tag_unsubscribe",
            Self::TagSetValue { .. } => "tag_set_value",
            Self::LayerCreate { .. } => "layer_create",
            Self::LayerDestroy { .. } => "layer_destroy",
            Self::LayerSubscribe { .. } => "layer_subscribe",
            Self::LayerUnsubscribe { .. } => "layer_unsubscribe",
            Self::LayerSetValue { .. } => "layer_set_value",
            Self::LayerUnsetValue { .. } => "layer_unset_value",
            Self::ConnectTerminate => "connect_terminate",
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Self::NodeCreate { .. }
                | Self::TagGroupCreate { .. }
                | Self::TagCreate { .. }
                | Self::LayerCreate { .. }
        )
    }

    pub fn is_destroy(&self) -> bool {
        matches!(
            self,
            Self::NodeDestroy { .. }
                | Self::TagGroupDestroy { .. }
                | Self::TagDestroy { .. }
                | Self::LayerDestroy { .. }
        )
    }
}
