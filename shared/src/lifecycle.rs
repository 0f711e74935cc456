//! # Entity lifecycle
//!
//! Every node, tag group, tag and layer runs through the same seven-state
//! machine. The machine itself performs no I/O: each transition hands back at
//! most one [`LifecycleEffect`] which the owning session turns into an
//! outbound request or a teardown.
//!
//! ```text
//!  from          create        destroy       receive_create   receive_destroy
//!  RESERVED      CREATING      -             CREATED          -
//!                ASSUMED (id)
//!  CREATING      -             WANT_DESTROY  CREATED          -
//!  ASSUMED       -             DESTROYING    CREATED          -
//!  CREATED       -             DESTROYING    -                DESTROYED (release)
//!  WANT_DESTROY  -             -             DESTROYING       -
//!  DESTROYING    -             -             -                DESTROYED (teardown)
//! ```

use std::fmt;

use crate::error::LifecycleError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityState {
    Reserved,
    Creating,
    Created,
    Assumed,
    WantDestroy,
    Destroying,
    Destroyed,
}

impl EntityState {
    pub fn name(&self) -> &'static str {
        match self {
            EntityState::Reserved => "RESERVED",
            EntityState::Creating => "CREATING",
            EntityState::Created => "CREATED",
            EntityState::Assumed => "ASSUMED",
            EntityState::WantDestroy => "WANT_DESTROY",
            EntityState::Destroying => "DESTROYING",
            EntityState::Destroyed => "DESTROYED",
        }
    }

    /// The authoritative source knows this entity (or it is assumed to).
    pub fn is_established(&self) -> bool {
        matches!(self, EntityState::Created | EntityState::Assumed)
    }

    /// A destroy has been requested, sent, or confirmed.
    pub fn is_going_away(&self) -> bool {
        matches!(
            self,
            EntityState::WantDestroy | EntityState::Destroying | EntityState::Destroyed
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    Create,
    Destroy,
    ReceiveCreate,
    ReceiveDestroy,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Create => "create",
            Transition::Destroy => "destroy",
            Transition::ReceiveCreate => "receive_create",
            Transition::ReceiveDestroy => "receive_destroy",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the session has to do after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEffect {
    SendCreate,
    SendDestroy,
    Subscribe,
    /// Own destroy confirmed: cascade through descendants, then clear.
    Teardown,
    /// Destroy originated elsewhere: unlink this entity only, its descendants
    /// get their own confirmations.
    Release,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityLifecycle {
    state: EntityState,
    subscribed: bool,
    create_deferred: bool,
    version: u32,
    crc32: u32,
}

impl Default for EntityLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityLifecycle {
    pub fn new() -> Self {
        Self {
            state: EntityState::Reserved,
            subscribed: false,
            create_deferred: false,
            version: 0,
            crc32: 0,
        }
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn set_subscribed(&mut self, subscribed: bool) {
        self.subscribed = subscribed;
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// The create request could not be emitted yet (owner has no id, or the
    /// session is not connected) and must be flushed later.
    pub fn defer_create(&mut self) {
        self.create_deferred = true;
    }

    pub fn is_create_deferred(&self) -> bool {
        self.create_deferred
    }

    /// Returns true exactly once per deferral.
    pub fn take_deferred_create(&mut self) -> bool {
        std::mem::take(&mut self.create_deferred)
    }

    /// Create (panicking version)
    ///
    /// # Panics
    ///
    /// Panics if the entity is not RESERVED.
    /// Consider using `try_create` for non-panicking error handling.
    pub fn create(&mut self, id_known: bool, auto_subscribe: bool) -> Option<LifecycleEffect> {
        self.try_create(id_known, auto_subscribe)
            .unwrap_or_else(|error| panic!("{}", error))
    }

    pub fn try_create(
        &mut self,
        id_known: bool,
        auto_subscribe: bool,
    ) -> Result<Option<LifecycleEffect>, LifecycleError> {
        match self.state {
            EntityState::Reserved => {
                if !id_known {
                    self.state = EntityState::Creating;
                    Ok(Some(LifecycleEffect::SendCreate))
                } else {
                    // id already known: the entity exists authoritatively
                    self.state = EntityState::Assumed;
                    Ok(auto_subscribe.then_some(LifecycleEffect::Subscribe))
                }
            }
            state => Err(Self::violation(state, Transition::Create)),
        }
    }

    /// Destroy (panicking version)
    ///
    /// # Panics
    ///
    /// Panics unless the entity is CREATING, CREATED or ASSUMED.
    /// Consider using `try_destroy` for non-panicking error handling.
    pub fn destroy(&mut self) -> Option<LifecycleEffect> {
        self.try_destroy()
            .unwrap_or_else(|error| panic!("{}", error))
    }

    pub fn try_destroy(&mut self) -> Result<Option<LifecycleEffect>, LifecycleError> {
        match self.state {
            EntityState::Created | EntityState::Assumed => {
                self.state = EntityState::Destroying;
                Ok(Some(LifecycleEffect::SendDestroy))
            }
            EntityState::Creating => {
                // remembered, sent once the create is confirmed
                self.state = EntityState::WantDestroy;
                Ok(None)
            }
            state => Err(Self::violation(state, Transition::Destroy)),
        }
    }

    /// Receive create (panicking version)
    ///
    /// # Panics
    ///
    /// Panics if the entity is already CREATED or on its way out past WANT_DESTROY.
    /// Consider using `try_receive_create` for non-panicking error handling.
    pub fn receive_create(&mut self, auto_subscribe: bool) -> Option<LifecycleEffect> {
        self.try_receive_create(auto_subscribe)
            .unwrap_or_else(|error| panic!("{}", error))
    }

    pub fn try_receive_create(
        &mut self,
        auto_subscribe: bool,
    ) -> Result<Option<LifecycleEffect>, LifecycleError> {
        match self.state {
            EntityState::Reserved | EntityState::Creating => {
                self.state = EntityState::Created;
                Ok(auto_subscribe.then_some(LifecycleEffect::Subscribe))
            }
            EntityState::Assumed => {
                self.state = EntityState::Created;
                Ok(None)
            }
            EntityState::WantDestroy => {
                self.state = EntityState::Destroying;
                Ok(Some(LifecycleEffect::SendDestroy))
            }
            state => Err(Self::violation(state, Transition::ReceiveCreate)),
        }
    }

    /// Receive destroy (panicking version)
    ///
    /// # Panics
    ///
    /// Panics unless the entity is CREATED or DESTROYING.
    /// Consider using `try_receive_destroy` for non-panicking error handling.
    pub fn receive_destroy(&mut self) -> LifecycleEffect {
        self.try_receive_destroy()
            .unwrap_or_else(|error| panic!("{}", error))
    }

    pub fn try_receive_destroy(&mut self) -> Result<LifecycleEffect, LifecycleError> {
        match self.state {
            EntityState::Created => {
                self.state = EntityState::Destroyed;
                Ok(LifecycleEffect::Release)
            }
            EntityState::Destroying => {
                self.state = EntityState::Destroyed;
                Ok(LifecycleEffect::Teardown)
            }
            state => Err(Self::violation(state, Transition::ReceiveDestroy)),
        }
    }

    fn violation(state: EntityState, transition: Transition) -> LifecycleError {
        LifecycleError::InvalidTransition { state, transition }
    }
}
