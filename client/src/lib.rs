//! # Scenesync Client
//! Client-side entity model for a shared scene graph. Local operations become
//! requests; server events confirm, reject or introduce entities, and the
//! session reconciles the two.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use scenesync_shared::{
        custom_type_from_name, ConstructionError, CustomType, EntityKind, EntityState,
        InboundEvent, ItemId, LayerId, LockError, LockState, NodeId, OwnershipError, Permission,
        Priority, RegistryError, Request, Scalar, TagGroupId, TagId, UserId, Value, ValueError,
        ValueType, AVATAR_CLIENT_NAME_TAG_CUSTOM_TYPE, AVATAR_CLIENT_VERSION_TAG_CUSTOM_TYPE,
        AVATAR_HOSTNAME_TAG_CUSTOM_TYPE, AVATAR_LOGIN_TIME_TAG_CUSTOM_TYPE, AVATAR_PARENT_NODE_ID,
        AVATAR_USER_ID_TAG_CUSTOM_TYPE, DEFAULT_PRIORITY, INFO_TAG_GROUP_CUSTOM_TYPE,
        MAX_VALUE_COUNT, PERM_NONE, PERM_READ, PERM_WRITE, ROOT_NODE_CUSTOM_TYPE, ROOT_NODE_ID,
        SUPER_USER_ID, USERS_PARENT_NODE_ID, USER_NAME_TAG_CUSTOM_TYPE,
    };
}

mod config;
mod connection;
mod error;
mod events;
mod registry;
mod session;
mod world;

pub use config::SessionConfig;
pub use connection::{ConnectionState, SessionIdentity};
pub use error::SessionError;
pub use events::Resolved;
pub use registry::{
    BaseLayer, BaseNode, BaseTag, BaseTagGroup, ClassRegistry, LayerClass, NodeClass, TagClass,
    TagGroupClass,
};
pub use session::Session;
pub use world::{
    avatar_ref::AvatarRef,
    keys::{LayerKey, NodeKey, TagGroupKey, TagKey},
    layer::{Layer, LayerInit},
    node::{Node, NodeInit},
    tag::{Tag, TagInit},
    tag_group::{TagGroup, TagGroupInit},
    user_ref::UserRef,
};
