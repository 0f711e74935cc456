pub mod avatar_ref;
pub(crate) mod entity_kind;
pub mod keys;
pub mod layer;
pub mod node;
pub mod pending;
pub mod tag;
pub mod tag_group;
pub mod user_ref;
