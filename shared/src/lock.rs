use std::fmt;

use crate::{error::LockError, types::NodeId};

/// Node lock, independent of the node's lifecycle.
///
/// `UNLOCKED -> LOCKING -> LOCKED -> UNLOCKING -> UNLOCKED`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LockState {
    #[default]
    Unlocked,
    Locking,
    Locked,
    Unlocking,
}

impl LockState {
    pub fn name(&self) -> &'static str {
        match self {
            LockState::Unlocked => "UNLOCKED",
            LockState::Locking => "LOCKING",
            LockState::Locked => "LOCKED",
            LockState::Unlocking => "UNLOCKING",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeLock {
    state: LockState,
    holder: Option<NodeId>,
    request_deferred: bool,
}

impl NodeLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    /// Avatar holding the lock, as last reported by the authoritative source.
    pub fn holder(&self) -> Option<NodeId> {
        self.holder
    }

    pub fn is_request_deferred(&self) -> bool {
        self.request_deferred
    }

    /// Lock (panicking version)
    ///
    /// Returns true when the request can be sent now, false when it must wait
    /// for the node's create confirmation.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not UNLOCKED.
    /// Consider using `try_request_lock` for non-panicking error handling.
    pub fn request_lock(&mut self, node_created: bool) -> bool {
        self.try_request_lock(node_created)
            .unwrap_or_else(|error| panic!("{}", error))
    }

    pub fn try_request_lock(&mut self, node_created: bool) -> Result<bool, LockError> {
        if self.state != LockState::Unlocked {
            return Err(LockError::InvalidLockState {
                state: self.state,
                operation: "lock",
            });
        }
        self.state = LockState::Locking;
        self.request_deferred = !node_created;
        Ok(node_created)
    }

    /// Returns true exactly once per deferred lock request.
    pub fn take_deferred(&mut self) -> bool {
        std::mem::take(&mut self.request_deferred)
    }

    /// Unlock (panicking version)
    ///
    /// # Panics
    ///
    /// Panics if the lock is not LOCKED or `requester` is not the holder.
    /// Consider using `try_request_unlock` for non-panicking error handling.
    pub fn request_unlock(&mut self, requester: NodeId) {
        self.try_request_unlock(requester)
            .unwrap_or_else(|error| panic!("{}", error))
    }

    pub fn try_request_unlock(&mut self, requester: NodeId) -> Result<(), LockError> {
        if self.holder != Some(requester) {
            return Err(LockError::NotLockHolder {
                holder: self.holder,
                requester,
            });
        }
        if self.state != LockState::Locked {
            return Err(LockError::InvalidLockState {
                state: self.state,
                operation: "unlock",
            });
        }
        self.state = LockState::Unlocking;
        Ok(())
    }

    /// Inbound lock: whoever asked, the node is now held by `holder`.
    pub fn receive_lock(&mut self, holder: NodeId) {
        self.state = LockState::Locked;
        self.holder = Some(holder);
        self.request_deferred = false;
    }

    pub fn receive_unlock(&mut self) {
        self.state = LockState::Unlocked;
        self.holder = None;
        self.request_deferred = false;
    }
}
