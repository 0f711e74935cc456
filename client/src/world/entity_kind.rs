use log::{debug, info};

use scenesync_shared::{
    BigMap, BigMapKey, EntityKind, EntityLifecycle, EntityState, LifecycleEffect, Request,
};

use crate::{error::SessionError, session::Session};

/// Glue between the shared lifecycle machine and one entity kind.
///
/// The machine decides *what* has to happen; an implementor knows how to
/// address its entity on the wire and how to take it apart. Everything else
/// (deferral, subscription bookkeeping, the connection gate) lives once in the
/// generic driver below.
pub(crate) trait SessionEntity: Sized + 'static {
    type Key: BigMapKey + 'static;
    const KIND: EntityKind;

    fn arena(session: &Session) -> &BigMap<Self::Key, Self>;
    fn arena_mut(session: &mut Session) -> &mut BigMap<Self::Key, Self>;

    fn lifecycle(&self) -> &EntityLifecycle;
    fn lifecycle_mut(&mut self) -> &mut EntityLifecycle;

    /// The class-level subscription policy.
    fn class_auto_subscribe(&self) -> bool;

    /// None while an id the request needs (own or owner's) is unknown.
    fn create_request(session: &Session, key: &Self::Key) -> Option<Request>;
    fn destroy_request(session: &Session, key: &Self::Key) -> Option<Request>;
    fn subscribe_request(session: &Session, key: &Self::Key) -> Option<Request>;
    fn unsubscribe_request(session: &Session, key: &Self::Key) -> Option<Request>;

    /// Removes the entity from the arenas and every owner map. With `cascade`
    /// all descendants go too; without it, child nodes and child layers are
    /// only detached.
    fn teardown(session: &mut Session, key: &Self::Key, cascade: bool) -> Option<Self>;
}

impl Session {
    pub(crate) fn entity_state<E: SessionEntity>(&self, key: &E::Key) -> Option<EntityState> {
        E::arena(self)
            .get(key)
            .map(|entity| entity.lifecycle().state())
    }

    fn effective_auto_subscribe<E: SessionEntity>(&self, key: &E::Key) -> bool {
        self.config().auto_subscribe
            && E::arena(self)
                .get(key)
                .is_some_and(|entity| entity.class_auto_subscribe())
    }

    fn live_lifecycle_mut<E: SessionEntity>(&mut self, key: &E::Key) -> &mut EntityLifecycle {
        let Some(entity) = E::arena_mut(self).get_mut(key) else {
            panic!("{} {:?} is not in its arena", E::KIND, key);
        };
        entity.lifecycle_mut()
    }

    pub(crate) fn lifecycle_create<E: SessionEntity>(&mut self, key: &E::Key, id_known: bool) {
        let auto_subscribe = self.effective_auto_subscribe::<E>(key);
        let effect = self
            .live_lifecycle_mut::<E>(key)
            .create(id_known, auto_subscribe);
        self.apply_effect::<E>(key, effect);
    }

    pub(crate) fn lifecycle_destroy<E: SessionEntity>(
        &mut self,
        key: &E::Key,
        context: &'static str,
    ) -> Result<(), SessionError> {
        let Some(entity) = E::arena_mut(self).get_mut(key) else {
            return Err(SessionError::UnknownEntity {
                kind: E::KIND,
                context,
            });
        };
        let effect = entity.lifecycle_mut().destroy();
        self.apply_effect::<E>(key, effect);
        Ok(())
    }

    /// Returns the state the entity ends up in.
    pub(crate) fn lifecycle_receive_create<E: SessionEntity>(
        &mut self,
        key: &E::Key,
    ) -> EntityState {
        let auto_subscribe = self.effective_auto_subscribe::<E>(key);
        let effect = self
            .live_lifecycle_mut::<E>(key)
            .receive_create(auto_subscribe);
        self.apply_effect::<E>(key, effect);
        self.live_lifecycle_mut::<E>(key).state()
    }

    pub(crate) fn lifecycle_receive_destroy<E: SessionEntity>(
        &mut self,
        key: &E::Key,
    ) -> Option<E> {
        let effect = self.live_lifecycle_mut::<E>(key).receive_destroy();
        self.apply_effect::<E>(key, Some(effect))
    }

    fn apply_effect<E: SessionEntity>(
        &mut self,
        key: &E::Key,
        effect: Option<LifecycleEffect>,
    ) -> Option<E> {
        match effect? {
            LifecycleEffect::SendCreate => {
                self.send_create::<E>(key);
                None
            }
            LifecycleEffect::SendDestroy => {
                if let Some(request) = E::destroy_request(self, key) {
                    self.send(request);
                }
                None
            }
            LifecycleEffect::Subscribe => {
                self.send_subscribe::<E>(key);
                None
            }
            LifecycleEffect::Teardown => E::teardown(self, key, true),
            LifecycleEffect::Release => E::teardown(self, key, false),
        }
    }

    /// Sends the create request, or marks it deferred until the owner is
    /// identified and the session connected.
    fn send_create<E: SessionEntity>(&mut self, key: &E::Key) {
        let request = if self.connection_state().is_connected() {
            E::create_request(self, key)
        } else {
            None
        };
        match request {
            Some(request) => self.send(request),
            None => {
                debug!("Deferring create of {} {:?}", E::KIND, key);
                self.live_lifecycle_mut::<E>(key).defer_create();
            }
        }
    }

    /// Sends a create that was deferred earlier. Returns whether anything was
    /// sent.
    pub(crate) fn flush_deferred_create<E: SessionEntity>(&mut self, key: &E::Key) -> bool {
        if !self.connection_state().is_connected() {
            return false;
        }
        let Some(entity) = E::arena(self).get(key) else {
            return false;
        };
        if !entity.lifecycle().is_create_deferred() {
            return false;
        }
        let Some(request) = E::create_request(self, key) else {
            return false;
        };
        self.live_lifecycle_mut::<E>(key).take_deferred_create();
        info!("Sending deferred create of {} {:?}", E::KIND, key);
        self.send(request);
        true
    }

    pub(crate) fn send_subscribe<E: SessionEntity>(&mut self, key: &E::Key) -> bool {
        if !self.connection_state().is_connected() {
            return false;
        }
        let Some(entity) = E::arena(self).get(key) else {
            return false;
        };
        if entity.lifecycle().is_subscribed() {
            return false;
        }
        let Some(request) = E::subscribe_request(self, key) else {
            return false;
        };
        self.live_lifecycle_mut::<E>(key).set_subscribed(true);
        self.send(request);
        true
    }

    pub(crate) fn send_unsubscribe<E: SessionEntity>(&mut self, key: &E::Key) -> bool {
        if !self.connection_state().is_connected() {
            return false;
        }
        let Some(entity) = E::arena(self).get(key) else {
            return false;
        };
        if !entity.lifecycle().is_subscribed() {
            return false;
        }
        let Some(request) = E::unsubscribe_request(self, key) else {
            return false;
        };
        self.live_lifecycle_mut::<E>(key).set_subscribed(false);
        self.send(request);
        true
    }

    /// Subscribes an established entity the auto-subscribe policy wants but
    /// which could not be subscribed earlier (e.g. assumed before connecting).
    pub(crate) fn catch_up_subscription<E: SessionEntity>(&mut self, key: &E::Key) {
        let wants = self.effective_auto_subscribe::<E>(key)
            && self
                .entity_state::<E>(key)
                .is_some_and(|state| state.is_established());
        if wants {
            self.send_subscribe::<E>(key);
        }
    }

    pub(crate) fn subscribe_entity<E: SessionEntity>(
        &mut self,
        key: &E::Key,
        context: &'static str,
    ) -> Result<bool, SessionError> {
        if !E::arena(self).contains_key(key) {
            return Err(SessionError::UnknownEntity {
                kind: E::KIND,
                context,
            });
        }
        Ok(self.send_subscribe::<E>(key))
    }

    pub(crate) fn unsubscribe_entity<E: SessionEntity>(
        &mut self,
        key: &E::Key,
        context: &'static str,
    ) -> Result<bool, SessionError> {
        if !E::arena(self).contains_key(key) {
            return Err(SessionError::UnknownEntity {
                kind: E::KIND,
                context,
            });
        }
        Ok(self.send_unsubscribe::<E>(key))
    }
}
