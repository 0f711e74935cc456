//! # Scenesync Shared
//! Entity lifecycle, lock machine, values and the request/event vocabulary
//! exchanged with the authoritative scene server.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod bigmap;
mod checked_map;
mod error;
mod event;
mod lifecycle;
mod lock;
mod request;
mod types;
mod value;

pub use bigmap::{BigMap, BigMapIter, BigMapKey};
pub use checked_map::CheckedMap;
pub use error::{
    ConstructionError, LifecycleError, LockError, OwnershipError, RegistryError, ValueError,
};
pub use event::InboundEvent;
pub use lifecycle::{EntityLifecycle, EntityState, LifecycleEffect, Transition};
pub use lock::{LockState, NodeLock};
pub use request::Request;
pub use types::{
    custom_type_from_name, CustomType, EntityKind, ItemId, LayerId, NodeId, Permission, Priority,
    TagGroupId, TagId, UserId, AVATAR_CLIENT_NAME_TAG_CUSTOM_TYPE,
    AVATAR_CLIENT_VERSION_TAG_CUSTOM_TYPE, AVATAR_HOSTNAME_TAG_CUSTOM_TYPE,
    AVATAR_LOGIN_TIME_TAG_CUSTOM_TYPE, AVATAR_PARENT_NODE_ID, AVATAR_USER_ID_TAG_CUSTOM_TYPE,
    DEFAULT_PRIORITY, INFO_TAG_GROUP_CUSTOM_TYPE, PERM_NONE, PERM_READ, PERM_WRITE,
    ROOT_NODE_CUSTOM_TYPE, ROOT_NODE_ID, SUPER_USER_ID, USERS_PARENT_NODE_ID,
    USER_NAME_TAG_CUSTOM_TYPE,
};
pub use value::{Scalar, Value, ValueType, MAX_VALUE_COUNT};
