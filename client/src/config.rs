use std::default::Default;

use scenesync_shared::{Priority, UserId, DEFAULT_PRIORITY, SUPER_USER_ID};

/// Contains Config properties which will be used by the Session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Priority every node starts with. A node whose priority differs from
    /// this value re-sends it once the server confirms the node.
    pub default_priority: Priority,
    /// Session-wide switch for subscribing to entities as soon as they are
    /// known. Individual classes may still opt out.
    pub auto_subscribe: bool,
    /// User that owns the well-known root node.
    pub root_user_id: UserId,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_priority: DEFAULT_PRIORITY,
            auto_subscribe: true,
            root_user_id: SUPER_USER_ID,
        }
    }
}
