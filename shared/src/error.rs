use thiserror::Error;

use crate::{
    lifecycle::{EntityState, Transition},
    lock::LockState,
    types::{CustomType, EntityKind, NodeId, UserId},
    value::ValueType,
};

/// An entity was asked to make a transition its current state does not allow.
/// Always a programming error in the caller or in the session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Invalid entity state transition: {transition} from {state}")]
    InvalidTransition {
        state: EntityState,
        transition: Transition,
    },
}

/// Errors raised synchronously while constructing an entity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConstructionError {
    /// The owner handle does not refer to a live entity
    #[error("{kind} owner not found: {context}")]
    UnknownOwner {
        kind: EntityKind,
        context: &'static str,
    },

    /// A second not-yet-identified entity of the same custom type under one owner
    #[error("A pending {kind} with custom type {custom_type} already exists in its owner")]
    DuplicatePending {
        kind: EntityKind,
        custom_type: CustomType,
    },

    /// The identifier is already bound to a live entity
    #[error("{kind} with id {id} already exists")]
    DuplicateId { kind: EntityKind, id: u32 },

    /// The class handed to the constructor declares a different type key
    #[error("Class {class} declares custom type {declared:?}, but {requested} was requested")]
    ClassTypeMismatch {
        class: &'static str,
        declared: Option<CustomType>,
        requested: CustomType,
    },

    /// A tag needs either a declared value type or an initial value to infer it from
    #[error("Tag has neither a value type nor a value")]
    MissingValueType,

    /// Value tuples carry between one and four elements
    #[error("Invalid element count {count}, expected 1 to 4")]
    InvalidCount { count: u8 },

    /// The parent layer belongs to another node
    #[error("Parent layer belongs to a different node")]
    ForeignParentLayer,

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Errors raised while registering classes, before any session exists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind} class {class} does not declare required type attribute {attribute}")]
    MissingTypeAttribute {
        kind: EntityKind,
        class: &'static str,
        attribute: &'static str,
    },

    #[error("{kind} class {class} is already registered")]
    DuplicateClassName {
        kind: EntityKind,
        class: &'static str,
    },

    #[error("{kind} class {class} uses the type key of {existing}; extend it instead")]
    DuplicateTypeKey {
        kind: EntityKind,
        class: &'static str,
        existing: &'static str,
    },

    #[error("{kind} class {class} extends unregistered class {base}")]
    UnknownBaseClass {
        kind: EntityKind,
        class: &'static str,
        base: &'static str,
    },

    #[error("{kind} class {class} declares a different type key than its base {base}")]
    KeyMismatch {
        kind: EntityKind,
        class: &'static str,
        base: &'static str,
    },

    #[error("{kind} class {base} is already extended by {existing}, cannot also be extended by {class}")]
    AlreadyExtended {
        kind: EntityKind,
        base: &'static str,
        existing: &'static str,
        class: &'static str,
    },
}

/// Errors raised by the node lock machine. Rejections never change lock state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("Cannot {operation} a node whose lock is {state}")]
    InvalidLockState {
        state: LockState,
        operation: &'static str,
    },

    #[error("Avatar {requester} does not hold the lock (holder: {holder:?})")]
    NotLockHolder {
        holder: Option<NodeId>,
        requester: NodeId,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("User {requester} does not own node {node_id} (owner: {owner:?})")]
    NotOwner {
        node_id: NodeId,
        owner: Option<UserId>,
        requester: UserId,
    },
}

/// A value does not fit the value type and element count fixed at creation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("Value has {actual} elements, expected {expected}")]
    CountMismatch { expected: u8, actual: usize },

    #[error("Element {index} does not match value type {expected:?}")]
    TypeMismatch { expected: ValueType, index: usize },

    #[error("Element {index} is out of range for value type {value_type:?}")]
    OutOfRange { value_type: ValueType, index: usize },

    #[error("Value is empty")]
    Empty,
}
