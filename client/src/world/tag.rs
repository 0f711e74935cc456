use std::{fmt, sync::Arc};

use log::{debug, warn};

use scenesync_shared::{
    BigMap, ConstructionError, CustomType, EntityKind, EntityLifecycle, EntityState, NodeId,
    Request, TagGroupId, TagId, Value, ValueType, MAX_VALUE_COUNT,
};

use crate::{
    error::SessionError,
    registry::TagClass,
    session::Session,
    world::{
        entity_kind::SessionEntity,
        keys::{TagGroupKey, TagKey},
        node::check_declared_type,
    },
};

/// Describes a tag to construct locally. The value type is inferred from the
/// initial value when not given; the element count defaults to the length of
/// the initial value, or one.
#[derive(Clone)]
pub struct TagInit {
    pub custom_type: CustomType,
    pub value_type: Option<ValueType>,
    pub count: Option<u8>,
    pub value: Option<Value>,
    pub class: Option<Arc<dyn TagClass>>,
    pub tag_id: Option<TagId>,
}

impl TagInit {
    pub fn new(custom_type: CustomType) -> Self {
        Self {
            custom_type,
            value_type: None,
            count: None,
            value: None,
            class: None,
            tag_id: None,
        }
    }

    pub fn with_type(mut self, value_type: ValueType, count: u8) -> Self {
        self.value_type = Some(value_type);
        self.count = Some(count);
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_class(mut self, class: Arc<dyn TagClass>) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_id(mut self, tag_id: TagId) -> Self {
        self.tag_id = Some(tag_id);
        self
    }
}

pub struct Tag {
    pub(crate) id: Option<TagId>,
    pub(crate) lifecycle: EntityLifecycle,
    pub(crate) custom_type: CustomType,
    pub(crate) class: Arc<dyn TagClass>,
    pub(crate) tag_group: TagGroupKey,
    pub(crate) value_type: ValueType,
    pub(crate) count: u8,
    pub(crate) value: Option<Value>,
}

impl Tag {
    pub fn id(&self) -> Option<TagId> {
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

    pub fn tag_group(&self) -> TagGroupKey {
        self.tag_group
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("id", &self.id)
            .field("state", &self.lifecycle.state())
            .field("custom_type", &self.custom_type)
            .field("class", &self.class.name())
            .field("value_type", &self.value_type)
            .field("count", &self.count)
            .field("value", &self.value)
            .finish()
    }
}

impl SessionEntity for Tag {
    type Key = TagKey;
    const KIND: EntityKind = EntityKind::Tag;

    fn arena(session: &Session) -> &BigMap<TagKey, Self> {
        &session.tags
    }

    fn arena_mut(session: &mut Session) -> &mut BigMap<TagKey, Self> {
        &mut session.tags
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

    fn create_request(session: &Session, key: &TagKey) -> Option<Request> {
        let tag = session.tags.get(key)?;
        let (node_id, tag_group_id) = session.tag_group_address(&tag.tag_group)?;
        Some(Request::TagCreate {
            node_id,
            tag_group_id,
            value_type: tag.value_type,
            count: tag.count,
            custom_type: tag.custom_type,
        })
    }

    fn destroy_request(session: &Session, key: &TagKey) -> Option<Request> {
        let (node_id, tag_group_id, tag_id) = session.tag_address(key)?;
        Some(Request::TagDestroy {
            node_id,
            tag_group_id,
            tag_id,
        })
    }

    fn subscribe_request(session: &Session, key: &TagKey) -> Option<Request> {
        let (node_id, tag_group_id, tag_id) = session.tag_address(key)?;
        Some(Request::TagSubscribe {
            node_id,
            tag_group_id,
            tag_id,
        })
    }

    fn unsubscribe_request(session: &Session, key: &TagKey) -> Option<Request> {
        let (node_id, tag_group_id, tag_id) = session.tag_address(key)?;
        Some(Request::TagUnsubscribe {
            node_id,
            tag_group_id,
            tag_id,
        })
    }

    fn teardown(session: &mut Session, key: &TagKey, _cascade: bool) -> Option<Self> {
        let mut tag = session.tags.remove(key)?;

        if let Some(tag_group) = session.tag_groups.get_mut(&tag.tag_group) {
            if let Some(tag_id) = tag.id {
                tag_group.tags.discard(&tag_id);
            }
            tag_group.tag_queue.release(tag.custom_type, key);
        }
        tag.value = None;

        debug!("Removed tag {:?} ({:?})", tag.id, key);
        Some(tag)
    }
}

impl Session {
    pub(crate) fn tag_address(&self, key: &TagKey) -> Option<(NodeId, TagGroupId, TagId)> {
        let tag = self.tags.get(key)?;
        let (node_id, tag_group_id) = self.tag_group_address(&tag.tag_group)?;
        Some((node_id, tag_group_id, tag.id?))
    }

    /// Constructs a tag under `tag_group`. Only one unconfirmed tag per type key
    /// may exist under a tag group. An initial value is sent once the tag is
    /// confirmed.
    pub fn create_tag(
        &mut self,
        tag_group: &TagGroupKey,
        init: TagInit,
    ) -> Result<TagKey, SessionError> {
        let TagInit {
            custom_type,
            value_type,
            count,
            value,
            class,
            tag_id,
        } = init;

        let Some(owner) = self.tag_groups.get(tag_group) else {
            return Err(ConstructionError::UnknownOwner {
                kind: EntityKind::Tag,
                context: "create_tag tag group",
            }
            .into());
        };
        match tag_id {
            Some(tag_id) if owner.tags.contains_key(&tag_id) => {
                return Err(ConstructionError::DuplicateId {
                    kind: EntityKind::Tag,
                    id: tag_id.into(),
                }
                .into());
            }
            None if owner.tag_queue.contains(custom_type) => {
                return Err(ConstructionError::DuplicatePending {
                    kind: EntityKind::Tag,
                    custom_type,
                }
                .into());
            }
            _ => {}
        }

        let value_type = match (value_type, &value) {
            (Some(value_type), _) => value_type,
            (None, Some(value)) => value.infer_type().map_err(ConstructionError::from)?,
            (None, None) => return Err(ConstructionError::MissingValueType.into()),
        };
        let count = match (count, &value) {
            (Some(count), _) => count,
            (None, Some(value)) => u8::try_from(value.len()).unwrap_or(u8::MAX),
            (None, None) => 1,
        };
        if count == 0 || count > MAX_VALUE_COUNT {
            return Err(ConstructionError::InvalidCount { count }.into());
        }
        if let Some(value) = &value {
            value_type
                .check(count, value)
                .map_err(ConstructionError::from)?;
        }

        let tag_group_custom_type = owner.custom_type;
        let node_custom_type = self
            .nodes
            .get(&owner.node)
            .map_or(0, |node| node.custom_type);
        let class = match class {
            Some(class) => {
                check_declared_type(class.name(), class.custom_type(), custom_type)?;
                class
            }
            None => self
                .registry
                .resolve_tag(node_custom_type, tag_group_custom_type, custom_type),
        };

        let key = self.tags.insert(Tag {
            id: tag_id,
            lifecycle: EntityLifecycle::new(),
            custom_type,
            class: class.clone(),
            tag_group: *tag_group,
            value_type,
            count,
            value,
        });
        if let Some(owner) = self.tag_groups.get_mut(tag_group) {
            match tag_id {
                Some(tag_id) => owner.tags.insert(tag_id, key),
                None => owner.tag_queue.insert(custom_type, key),
            }
        }

        self.lifecycle_create::<Tag>(&key, tag_id.is_some());
        class.on_construct(self, key)?;

        Ok(key)
    }

    /// # Panics
    ///
    /// Panics if the tag is already being destroyed.
    pub fn destroy_tag(&mut self, key: &TagKey) -> Result<(), SessionError> {
        self.lifecycle_destroy::<Tag>(key, "destroy_tag")
    }

    pub fn subscribe_tag(&mut self, key: &TagKey) -> Result<bool, SessionError> {
        self.subscribe_entity::<Tag>(key, "subscribe_tag")
    }

    pub fn unsubscribe_tag(&mut self, key: &TagKey) -> Result<bool, SessionError> {
        self.unsubscribe_entity::<Tag>(key, "unsubscribe_tag")
    }

    /// Stores the value and sends it when the tag is identified; otherwise it
    /// goes out with the tag's confirmation.
    pub fn set_tag_value(
        &mut self,
        key: &TagKey,
        value: impl Into<Value>,
    ) -> Result<(), SessionError> {
        let value = value.into();
        let Some(tag) = self.tags.get_mut(key) else {
            return Err(SessionError::UnknownEntity {
                kind: EntityKind::Tag,
                context: "set_tag_value",
            });
        };
        tag.value_type.check(tag.count, &value)?;
        tag.value = Some(value);
        self.send_tag_value(key);
        Ok(())
    }

    fn send_tag_value(&mut self, key: &TagKey) {
        let Some((node_id, tag_group_id, tag_id)) = self.tag_address(key) else {
            return;
        };
        let Some(tag) = self.tags.get(key) else {
            return;
        };
        let Some(value) = tag.value.clone() else {
            return;
        };
        let value_type = tag.value_type;
        self.send(Request::TagSetValue {
            node_id,
            tag_group_id,
            tag_id,
            value_type,
            value,
        });
    }

    // Inbound

    pub fn receive_tag_create(
        &mut self,
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
        value_type: ValueType,
        count: u8,
        custom_type: CustomType,
    ) -> Option<TagKey> {
        if self.is_frozen("tag_create") {
            return None;
        }
        let tag_group_key = self.tag_group_by_id(node_id, tag_group_id)?;
        let tag_group = self.tag_groups.get_mut(&tag_group_key)?;

        let key = if let Some(key) = tag_group.tags.get(&tag_id).copied() {
            key
        } else if let Some(key) = tag_group.tag_queue.take(custom_type) {
            tag_group.tags.insert(tag_id, key);
            if let Some(tag) = self.tags.get_mut(&key) {
                tag.id = Some(tag_id);
            }
            key
        } else {
            let init = TagInit::new(custom_type)
                .with_type(value_type, count)
                .with_id(tag_id);
            match self.create_tag(&tag_group_key, init) {
                Ok(key) => key,
                Err(SessionError::Construction(error)) => {
                    warn!("Cannot materialize tag {}: {}", tag_id, error);
                    return None;
                }
                Err(error) => {
                    warn!("Constructing tag {} failed: {}", tag_id, error);
                    self.tag_group_by_id(node_id, tag_group_id)
                        .and_then(|tag_group_key| self.tag_groups.get(&tag_group_key))
                        .and_then(|tag_group| tag_group.tag(tag_id))?
                }
            }
        };

        if self.lifecycle_receive_create::<Tag>(&key) == EntityState::Created {
            // a confirmation carries no payload: send what was set meanwhile
            self.send_tag_value(&key);
        }
        if let Some(class) = self.tags.get(&key).map(|tag| tag.class.clone()) {
            class.on_create(self, key);
        }
        Some(key)
    }

    pub fn receive_tag_destroy(
        &mut self,
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
    ) -> Option<Tag> {
        if self.is_frozen("tag_destroy") {
            return None;
        }
        let key = self.tag_by_id(node_id, tag_group_id, tag_id)?;
        self.lifecycle_receive_destroy::<Tag>(&key)
    }

    /// Stores a value set by anyone, without echoing it back.
    pub fn receive_tag_set_value(
        &mut self,
        node_id: NodeId,
        tag_group_id: TagGroupId,
        tag_id: TagId,
        value: Value,
    ) -> Option<TagKey> {
        if self.is_frozen("tag_set_value") {
            return None;
        }
        let key = self.tag_by_id(node_id, tag_group_id, tag_id)?;
        let tag = self.tags.get_mut(&key)?;
        if let Err(error) = tag.value_type.check(tag.count, &value) {
            warn!("Ignoring value of tag {}: {}", tag_id, error);
            return None;
        }
        tag.value = Some(value);
        Some(key)
    }
}
