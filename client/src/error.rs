use thiserror::Error;

use scenesync_shared::{
    ConstructionError, EntityKind, LockError, OwnershipError, ValueError,
};

/// Errors returned synchronously by session operations.
///
/// Lifecycle violations are not represented here: they are programming errors
/// and panic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    #[error(transparent)]
    Value(#[from] ValueError),

    /// The key does not refer to a live entity (it was torn down, or never existed)
    #[error("{kind} not found: {context}")]
    UnknownEntity {
        kind: EntityKind,
        context: &'static str,
    },

    /// The operation needs an identifier the server has not assigned yet
    #[error("{kind} has no identifier yet: {context}")]
    NotIdentified {
        kind: EntityKind,
        context: &'static str,
    },

    #[error("Session has no identity yet: {context}")]
    NotConnected { context: &'static str },
}
