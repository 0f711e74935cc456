use std::{fmt, sync::Arc};

use log::{debug, warn};

use scenesync_shared::{
    BigMap, CheckedMap, ConstructionError, CustomType, EntityKind, EntityLifecycle, EntityState,
    NodeId, Request, TagGroupId, TagId,
};

use crate::{
    error::SessionError,
    registry::TagGroupClass,
    session::Session,
    world::{
        entity_kind::SessionEntity,
        keys::{NodeKey, TagGroupKey, TagKey},
        node::check_declared_type,
        pending::PendingSlots,
        tag::Tag,
    },
};

#[derive(Clone)]
pub struct TagGroupInit {
    pub custom_type: CustomType,
    pub class: Option<Arc<dyn TagGroupClass>>,
    pub tag_group_id: Option<TagGroupId>,
}

impl TagGroupInit {
    pub fn new(custom_type: CustomType) -> Self {
        Self {
            custom_type,
            class: None,
            tag_group_id: None,
        }
    }

    pub fn with_class(mut self, class: Arc<dyn TagGroupClass>) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_id(mut self, tag_group_id: TagGroupId) -> Self {
        self.tag_group_id = Some(tag_group_id);
        self
    }
}

pub struct TagGroup {
    pub(crate) id: Option<TagGroupId>,
    pub(crate) lifecycle: EntityLifecycle,
    pub(crate) custom_type: CustomType,
    pub(crate) class: Arc<dyn TagGroupClass>,
    pub(crate) node: NodeKey,
    pub(crate) tags: CheckedMap<TagId, TagKey>,
    pub(crate) tag_queue: PendingSlots<TagKey>,
}

impl TagGroup {
    pub fn id(&self) -> Option<TagGroupId> {
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

    pub fn tag(&self, tag_id: TagId) -> Option<TagKey> {
        self.tags.get(&tag_id).copied()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn pending_tag(&self, custom_type: CustomType) -> Option<TagKey> {
        self.tag_queue.get(custom_type)
    }
}

impl fmt::Debug for TagGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagGroup")
            .field("id", &self.id)
            .field("state", &self.lifecycle.state())
            .field("custom_type", &self.custom_type)
            .field("class", &self.class.name())
            .finish()
    }
}

impl SessionEntity for TagGroup {
    type Key = TagGroupKey;
    const KIND: EntityKind = EntityKind::TagGroup;

    fn arena(session: &Session) -> &BigMap<TagGroupKey, Self> {
        &session.tag_groups
    }

    fn arena_mut(session: &mut Session) -> &mut BigMap<TagGroupKey, Self> {
        &mut session.tag_groups
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

    fn create_request(session: &Session, key: &TagGroupKey) -> Option<Request> {
        let tag_group = session.tag_groups.get(key)?;
        let node_id = session.nodes.get(&tag_group.node)?.id?;
        Some(Request::TagGroupCreate {
            node_id,
            custom_type: tag_group.custom_type,
        })
    }

    fn destroy_request(session: &Session, key: &TagGroupKey) -> Option<Request> {
        let (node_id, tag_group_id) = session.tag_group_address(key)?;
        Some(Request::TagGroupDestroy {
            node_id,
            tag_group_id,
        })
    }

    fn subscribe_request(session: &Session, key: &TagGroupKey) -> Option<Request> {
        let (node_id, tag_group_id) = session.tag_group_address(key)?;
        let lifecycle = &session.tag_groups.get(key)?.lifecycle;
        Some(Request::TagGroupSubscribe {
            node_id,
            tag_group_id,
            version: lifecycle.version(),
            crc32: lifecycle.crc32(),
        })
    }

    fn unsubscribe_request(session: &Session, key: &TagGroupKey) -> Option<Request> {
        let (node_id, tag_group_id) = session.tag_group_address(key)?;
        let lifecycle = &session.tag_groups.get(key)?.lifecycle;
        Some(Request::TagGroupUnsubscribe {
            node_id,
            tag_group_id,
            version: lifecycle.version(),
            crc32: lifecycle.crc32(),
        })
    }

    fn teardown(session: &mut Session, key: &TagGroupKey, _cascade: bool) -> Option<Self> {
        let mut tag_group = session.tag_groups.remove(key)?;

        if let Some(node) = session.nodes.get_mut(&tag_group.node) {
            if let Some(tag_group_id) = tag_group.id {
                node.tag_groups.discard(&tag_group_id);
            }
            node.tag_group_queue.release(tag_group.custom_type, key);
        }

        // tags never outlive their group
        let tag_keys: Vec<TagKey> = tag_group
            .tags
            .drain()
            .map(|(_, tag_key)| tag_key)
            .chain(tag_group.tag_queue.keys())
            .collect();
        for tag_key in tag_keys {
            Tag::teardown(session, &tag_key, true);
        }
        tag_group.tag_queue = PendingSlots::new();

        debug!("Removed tag group {:?} ({:?})", tag_group.id, key);
        Some(tag_group)
    }
}

impl Session {
    pub(crate) fn tag_group_address(&self, key: &TagGroupKey) -> Option<(NodeId, TagGroupId)> {
        let tag_group = self.tag_groups.get(key)?;
        let node_id = self.nodes.get(&tag_group.node)?.id?;
        Some((node_id, tag_group.id?))
    }

    /// Constructs a tag group under `node`. Only one unconfirmed tag group per
    /// type key may exist under a node.
    pub fn create_tag_group(
        &mut self,
        node: &NodeKey,
        init: TagGroupInit,
    ) -> Result<TagGroupKey, SessionError> {
        let TagGroupInit {
            custom_type,
            class,
            tag_group_id,
        } = init;

        let Some(owner) = self.nodes.get(node) else {
            return Err(ConstructionError::UnknownOwner {
                kind: EntityKind::TagGroup,
                context: "create_tag_group node",
            }
            .into());
        };
        match tag_group_id {
            Some(tag_group_id) if owner.tag_groups.contains_key(&tag_group_id) => {
                return Err(ConstructionError::DuplicateId {
                    kind: EntityKind::TagGroup,
                    id: tag_group_id.into(),
                }
                .into());
            }
            None if owner.tag_group_queue.contains(custom_type) => {
                return Err(ConstructionError::DuplicatePending {
                    kind: EntityKind::TagGroup,
                    custom_type,
                }
                .into());
            }
            _ => {}
        }
        let node_custom_type = owner.custom_type;
        let class = match class {
            Some(class) => {
                check_declared_type(class.name(), class.custom_type(), custom_type)?;
                class
            }
            None => self
                .registry
                .resolve_tag_group(node_custom_type, custom_type),
        };

        let key = self.tag_groups.insert(TagGroup {
            id: tag_group_id,
            lifecycle: EntityLifecycle::new(),
            custom_type,
            class: class.clone(),
            node: *node,
            tags: CheckedMap::new(),
            tag_queue: PendingSlots::new(),
        });
        if let Some(owner) = self.nodes.get_mut(node) {
            match tag_group_id {
                Some(tag_group_id) => owner.tag_groups.insert(tag_group_id, key),
                None => owner.tag_group_queue.insert(custom_type, key),
            }
        }

        self.lifecycle_create::<TagGroup>(&key, tag_group_id.is_some());
        class.on_construct(self, key)?;

        Ok(key)
    }

    /// # Panics
    ///
    /// Panics if the tag group is already being destroyed.
    pub fn destroy_tag_group(&mut self, key: &TagGroupKey) -> Result<(), SessionError> {
        self.lifecycle_destroy::<TagGroup>(key, "destroy_tag_group")
    }

    pub fn subscribe_tag_group(&mut self, key: &TagGroupKey) -> Result<bool, SessionError> {
        self.subscribe_entity::<TagGroup>(key, "subscribe_tag_group")
    }

    pub fn unsubscribe_tag_group(&mut self, key: &TagGroupKey) -> Result<bool, SessionError> {
        self.unsubscribe_entity::<TagGroup>(key, "unsubscribe_tag_group")
    }

    // Inbound

    pub fn receive_tag_group_create(
        &mut self,
        node_id: NodeId,
        tag_group_id: TagGroupId,
        custom_type: CustomType,
    ) -> Option<TagGroupKey> {
        if self.is_frozen("taggroup_create") {
            return None;
        }
        let Some(node_key) = self.node_ids.get(&node_id).copied() else {
            debug!("Ignoring tag group create under unknown node {}", node_id);
            return None;
        };
        let node = self.nodes.get_mut(&node_key)?;

        let key = if let Some(key) = node.tag_groups.get(&tag_group_id).copied() {
            // assumed earlier, now announced
            key
        } else if let Some(key) = node.tag_group_queue.take(custom_type) {
            node.tag_groups.insert(tag_group_id, key);
            if let Some(tag_group) = self.tag_groups.get_mut(&key) {
                tag_group.id = Some(tag_group_id);
            }
            key
        } else {
            self.materialize_tag_group(&node_key, tag_group_id, custom_type)
        };

        if self.lifecycle_receive_create::<TagGroup>(&key) == EntityState::Created {
            self.flush_tag_group_children(&key);
        }
        if let Some(class) = self.tag_groups.get(&key).map(|tag_group| tag_group.class.clone()) {
            class.on_create(self, key);
        }
        Some(key)
    }

    pub fn receive_tag_group_destroy(
        &mut self,
        node_id: NodeId,
        tag_group_id: TagGroupId,
    ) -> Option<TagGroup> {
        if self.is_frozen("taggroup_destroy") {
            return None;
        }
        let key = self.tag_group_by_id(node_id, tag_group_id)?;
        self.lifecycle_receive_destroy::<TagGroup>(&key)
    }

    fn materialize_tag_group(
        &mut self,
        node: &NodeKey,
        tag_group_id: TagGroupId,
        custom_type: CustomType,
    ) -> TagGroupKey {
        let init = TagGroupInit::new(custom_type).with_id(tag_group_id);
        match self.create_tag_group(node, init) {
            Ok(key) => key,
            Err(SessionError::Construction(error)) => {
                panic!("Materializing tag group {} failed: {}", tag_group_id, error)
            }
            Err(error) => {
                // hook failure; the tag group itself exists
                warn!("Constructing tag group {} failed: {}", tag_group_id, error);
                self.nodes
                    .get(node)
                    .and_then(|node| node.tag_group(tag_group_id))
                    .unwrap_or_else(|| {
                        panic!("Tag group {} vanished during construction", tag_group_id)
                    })
            }
        }
    }

    /// Sends deferred tag creates.
    pub(crate) fn flush_tag_group_children(&mut self, key: &TagGroupKey) {
        let Some(tag_group) = self.tag_groups.get(key) else {
            return;
        };
        for tag_key in tag_group.tag_queue.keys() {
            self.flush_deferred_create::<Tag>(&tag_key);
        }
    }
}
