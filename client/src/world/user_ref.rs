use std::fmt;

use scenesync_shared::{
    CustomType, NodeId, Scalar, UserId, INFO_TAG_GROUP_CUSTOM_TYPE, USERS_PARENT_NODE_ID,
    USER_NAME_TAG_CUSTOM_TYPE,
};

use crate::{session::Session, world::keys::NodeKey};

// UserRef

/// Read-only view of a user node, one of the children of the users parent
/// node the server maintains.
pub struct UserRef<'s> {
    session: &'s Session,
    node: NodeKey,
    user_id: UserId,
}

impl<'s> UserRef<'s> {
    pub(crate) fn new(session: &'s Session, node: NodeKey, user_id: UserId) -> Self {
        Self {
            session,
            node,
            user_id,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn node(&self) -> NodeKey {
        self.node
    }

    /// None until the name tag is known and has a value.
    pub fn name(&self) -> Option<&'s str> {
        match self.session.info_scalar(&self.node, USER_NAME_TAG_CUSTOM_TYPE)? {
            Scalar::Text(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for UserRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User ({}): {}", self.user_id, self.name().unwrap_or(""))
    }
}

impl Session {
    /// Users the server has announced so far, by user id.
    pub fn users(&self) -> Vec<UserRef<'_>> {
        let Some(parent) = self.node_by_id(USERS_PARENT_NODE_ID) else {
            return Vec::new();
        };
        let Some(parent) = self.nodes.get(&parent) else {
            return Vec::new();
        };
        let mut users: Vec<UserRef<'_>> = parent
            .child_nodes
            .iter()
            .filter_map(|(node_id, key)| {
                let user_id = UserId::try_from(*node_id).ok()?;
                Some(UserRef::new(self, *key, user_id))
            })
            .collect();
        users.sort_by_key(|user| user.user_id());
        users
    }

    pub fn user(&self, user_id: UserId) -> Option<UserRef<'_>> {
        let key = self.node_by_id(NodeId::from(user_id))?;
        let parent = self.nodes.get(&key)?.parent?;
        if self.nodes.get(&parent)?.id != Some(USERS_PARENT_NODE_ID) {
            return None;
        }
        Some(UserRef::new(self, key, user_id))
    }

    /// First scalar of a tag in the node's info tag group.
    pub(crate) fn info_scalar(
        &self,
        node: &NodeKey,
        tag_custom_type: CustomType,
    ) -> Option<&Scalar> {
        let node = self.nodes.get(node)?;
        let tag_group = node
            .tag_groups
            .values()
            .filter_map(|key| self.tag_groups.get(key))
            .find(|tag_group| tag_group.custom_type == INFO_TAG_GROUP_CUSTOM_TYPE)?;
        let tag = tag_group
            .tags
            .values()
            .filter_map(|key| self.tags.get(key))
            .find(|tag| tag.custom_type == tag_custom_type)?;
        tag.value.as_ref()?.scalars().first()
    }
}
