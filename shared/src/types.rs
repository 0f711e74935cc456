use std::fmt;

pub type NodeId = u32;
pub type TagGroupId = u16;
pub type TagId = u16;
pub type LayerId = u16;
pub type ItemId = u32;
pub type UserId = u16;
pub type CustomType = u16;
pub type Priority = u8;
pub type Permission = u8;

pub const DEFAULT_PRIORITY: Priority = 128;

/// The root of every scene graph, owned by the super user.
pub const ROOT_NODE_ID: NodeId = 0;
pub const ROOT_NODE_CUSTOM_TYPE: CustomType = 0;
pub const SUPER_USER_ID: UserId = 100;

/// Server-maintained parents: avatar nodes live under the first, user nodes
/// under the second. A user node's id is its user id.
pub const AVATAR_PARENT_NODE_ID: NodeId = 1;
pub const USERS_PARENT_NODE_ID: NodeId = 2;

/// Tag group describing a user or avatar node, and the tags inside it.
pub const INFO_TAG_GROUP_CUSTOM_TYPE: CustomType = 0;
pub const USER_NAME_TAG_CUSTOM_TYPE: CustomType = 0;
pub const AVATAR_USER_ID_TAG_CUSTOM_TYPE: CustomType = 0;
pub const AVATAR_HOSTNAME_TAG_CUSTOM_TYPE: CustomType = 1;
pub const AVATAR_LOGIN_TIME_TAG_CUSTOM_TYPE: CustomType = 2;
pub const AVATAR_CLIENT_NAME_TAG_CUSTOM_TYPE: CustomType = 3;
pub const AVATAR_CLIENT_VERSION_TAG_CUSTOM_TYPE: CustomType = 4;

pub const PERM_NONE: Permission = 0;
pub const PERM_READ: Permission = 1;
pub const PERM_WRITE: Permission = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    TagGroup,
    Tag,
    Layer,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Node => "Node",
            EntityKind::TagGroup => "TagGroup",
            EntityKind::Tag => "Tag",
            EntityKind::Layer => "Layer",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derives a stable custom type from a class name, so applications don't
/// have to hand out discriminators themselves.
pub fn custom_type_from_name(name: &str) -> CustomType {
    let mut hash: u64 = 1;
    for ch in name.chars() {
        let num = ch as u64;
        hash = hash
            .wrapping_add(num)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash);
    }
    (hash % 65535) as CustomType
}
