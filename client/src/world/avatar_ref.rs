use std::fmt;

use scenesync_shared::{
    CustomType, NodeId, Scalar, UserId, AVATAR_CLIENT_NAME_TAG_CUSTOM_TYPE,
    AVATAR_CLIENT_VERSION_TAG_CUSTOM_TYPE, AVATAR_HOSTNAME_TAG_CUSTOM_TYPE,
    AVATAR_LOGIN_TIME_TAG_CUSTOM_TYPE, AVATAR_PARENT_NODE_ID, AVATAR_USER_ID_TAG_CUSTOM_TYPE,
};

use crate::{session::Session, world::keys::NodeKey};

// AvatarRef

/// Read-only view of an avatar node: one connected client, described by the
/// info tag group the server attaches to it.
pub struct AvatarRef<'s> {
    session: &'s Session,
    node: NodeKey,
    avatar_id: NodeId,
}

impl<'s> AvatarRef<'s> {
    pub(crate) fn new(session: &'s Session, node: NodeKey, avatar_id: NodeId) -> Self {
        Self {
            session,
            node,
            avatar_id,
        }
    }

    pub fn avatar_id(&self) -> NodeId {
        self.avatar_id
    }

    pub fn node(&self) -> NodeKey {
        self.node
    }

    pub fn hostname(&self) -> Option<&'s str> {
        self.text(AVATAR_HOSTNAME_TAG_CUSTOM_TYPE)
    }

    pub fn login_time(&self) -> Option<u64> {
        self.int(AVATAR_LOGIN_TIME_TAG_CUSTOM_TYPE)
    }

    pub fn client_name(&self) -> Option<&'s str> {
        self.text(AVATAR_CLIENT_NAME_TAG_CUSTOM_TYPE)
    }

    pub fn client_version(&self) -> Option<&'s str> {
        self.text(AVATAR_CLIENT_VERSION_TAG_CUSTOM_TYPE)
    }

    /// The user this avatar logged in as. Falls back to the node owner while
    /// the user id tag is unknown.
    pub fn user_id(&self) -> Option<UserId> {
        self.int(AVATAR_USER_ID_TAG_CUSTOM_TYPE)
            .and_then(|user_id| UserId::try_from(user_id).ok())
            .or_else(|| self.session.node(&self.node)?.user_id())
    }

    pub fn username(&self) -> Option<&'s str> {
        self.session.user(self.user_id()?)?.name()
    }

    fn text(&self, tag_custom_type: CustomType) -> Option<&'s str> {
        match self.session.info_scalar(&self.node, tag_custom_type)? {
            Scalar::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    fn int(&self, tag_custom_type: CustomType) -> Option<u64> {
        match self.session.info_scalar(&self.node, tag_custom_type)? {
            Scalar::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for AvatarRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Avatar ({}): {}@{} ({}:{})",
            self.avatar_id,
            self.username().unwrap_or(""),
            self.hostname().unwrap_or(""),
            self.client_name().unwrap_or(""),
            self.client_version().unwrap_or("")
        )
    }
}

impl Session {
    /// Connected clients the server has announced so far, by avatar id.
    pub fn avatars(&self) -> Vec<AvatarRef<'_>> {
        let Some(parent) = self.node_by_id(AVATAR_PARENT_NODE_ID) else {
            return Vec::new();
        };
        let Some(parent) = self.nodes.get(&parent) else {
            return Vec::new();
        };
        let mut avatars: Vec<AvatarRef<'_>> = parent
            .child_nodes
            .iter()
            .map(|(avatar_id, key)| AvatarRef::new(self, *key, *avatar_id))
            .collect();
        avatars.sort_by_key(|avatar| avatar.avatar_id());
        avatars
    }

    pub fn avatar(&self, avatar_id: NodeId) -> Option<AvatarRef<'_>> {
        let key = self.node_by_id(avatar_id)?;
        let parent = self.nodes.get(&key)?.parent?;
        if self.nodes.get(&parent)?.id != Some(AVATAR_PARENT_NODE_ID) {
            return None;
        }
        Some(AvatarRef::new(self, key, avatar_id))
    }

    /// This client's own avatar, once announced.
    pub fn my_avatar(&self) -> Option<AvatarRef<'_>> {
        self.avatar(self.identity()?.avatar_id)
    }
}
