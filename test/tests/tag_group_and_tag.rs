/// Tag groups and tags: creation under a node, matching of confirmations by
/// type key, and tag values.
use scenesync_client::{
    shared::{ConstructionError, EntityState, Request, Scalar, Value, ValueError, ValueType},
    NodeInit, NodeKey, Session, SessionError, TagGroupInit, TagInit,
};
use scenesync_test::{
    assert_no_requests, assert_requests, connected_session, TEST_AVATAR_ID, TEST_USER_ID,
};

/// A connected session with confirmed node 42, owned by the test user.
fn session_with_node() -> (Session, NodeKey) {
    let mut session = connected_session();
    let node = session.create_node(NodeInit::new(17)).expect("create node");
    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);
    session.take_outgoing_requests();
    (session, node)
}

#[test]
fn tag_group_is_bound_to_confirmation_of_its_type() {
    let (mut session, node) = session_with_node();

    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("create tag group");
    assert_requests!(
        session,
        [Request::TagGroupCreate {
            node_id: 42,
            custom_type: 32
        }]
    );
    assert_eq!(session.node(&node).and_then(|node| node.pending_tag_group(32)), Some(tag_group));

    let confirmed = session.receive_tag_group_create(42, 7, 32);

    assert_eq!(confirmed, Some(tag_group));
    assert_eq!(session.tag_group_by_id(42, 7), Some(tag_group));
    assert_eq!(session.node(&node).and_then(|node| node.pending_tag_group(32)), None);
    let tag_group = session.tag_group(&tag_group).expect("live");
    assert_eq!(tag_group.id(), Some(7));
    assert_eq!(tag_group.state(), EntityState::Created);
    assert_requests!(
        session,
        [Request::TagGroupSubscribe {
            node_id: 42,
            tag_group_id: 7,
            version: 0,
            crc32: 0
        }]
    );
}

#[test]
fn second_pending_tag_group_of_a_type_is_rejected() {
    let (mut session, node) = session_with_node();
    session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("first");

    let result = session.create_tag_group(&node, TagGroupInit::new(32));

    assert!(matches!(
        result,
        Err(SessionError::Construction(ConstructionError::DuplicatePending { custom_type: 32, .. }))
    ));
    assert_eq!(session.tag_group_count(), 1);
}

#[test]
fn tag_group_confirmation_of_other_type_is_materialized() {
    let (mut session, node) = session_with_node();
    let pending = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("pending");

    let other = session.receive_tag_group_create(42, 8, 33).expect("materialized");

    assert_ne!(other, pending);
    assert_eq!(session.node(&node).and_then(|node| node.pending_tag_group(32)), Some(pending));
    assert_eq!(session.node(&node).map(|node| node.tag_group_count()), Some(1));
}

#[test]
fn tag_group_on_unconfirmed_node_is_created_after_node() {
    let mut session = connected_session();
    let node = session.create_node(NodeInit::new(17)).expect("create node");
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("create tag group");
    assert_requests!(session, [Request::NodeCreate { custom_type: 17 }]);
    assert_eq!(
        session.tag_group(&tag_group).map(|tag_group| tag_group.state()),
        Some(EntityState::Creating)
    );

    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);

    assert_requests!(
        session,
        [
            Request::NodeSubscribe {
                node_id: 42,
                version: 0,
                crc32: 0
            },
            Request::TagGroupCreate {
                node_id: 42,
                custom_type: 32
            },
        ]
    );
}

#[test]
fn tag_group_on_unknown_node_is_rejected() {
    let (mut session, node) = session_with_node();
    session.receive_node_destroy(42);

    let result = session.create_tag_group(&node, TagGroupInit::new(32));

    assert!(matches!(
        result,
        Err(SessionError::Construction(ConstructionError::UnknownOwner { .. }))
    ));
}

#[test]
fn tag_with_initial_value_sends_value_after_confirmation() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");
    session.receive_tag_group_create(42, 7, 32);
    session.take_outgoing_requests();

    let tag = session
        .create_tag(&tag_group, TagInit::new(3).with_value(Value::single(5u32)))
        .expect("create tag");
    assert_requests!(
        session,
        [Request::TagCreate {
            node_id: 42,
            tag_group_id: 7,
            value_type: ValueType::Uint64,
            count: 1,
            custom_type: 3
        }]
    );

    assert_eq!(session.receive_tag_create(42, 7, 11, ValueType::Uint64, 1, 3), Some(tag));

    assert_requests!(
        session,
        [Request::TagSetValue {
            node_id: 42,
            tag_group_id: 7,
            tag_id: 11,
            value_type: ValueType::Uint64,
            value: Value::single(5u32)
        }]
    );
    assert_eq!(session.tag_by_id(42, 7, 11), Some(tag));
    let tag = session.tag(&tag).expect("live");
    assert!(!tag.is_subscribed());
    assert_eq!(tag.state(), EntityState::Created);
}

#[test]
fn tag_on_unconfirmed_group_is_created_after_group() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");
    session
        .create_tag(&tag_group, TagInit::new(3).with_type(ValueType::Real32, 2))
        .expect("tag");
    assert_requests!(
        session,
        [Request::TagGroupCreate {
            node_id: 42,
            custom_type: 32
        }]
    );

    session.receive_tag_group_create(42, 7, 32);

    assert_requests!(
        session,
        [
            Request::TagGroupSubscribe {
                node_id: 42,
                tag_group_id: 7,
                version: 0,
                crc32: 0
            },
            Request::TagCreate {
                node_id: 42,
                tag_group_id: 7,
                value_type: ValueType::Real32,
                count: 2,
                custom_type: 3
            },
        ]
    );
}

#[test]
fn second_pending_tag_of_a_type_is_rejected() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");
    session
        .create_tag(&tag_group, TagInit::new(3).with_type(ValueType::Uint8, 1))
        .expect("first");

    let result = session.create_tag(&tag_group, TagInit::new(3).with_type(ValueType::Uint8, 1));

    assert!(matches!(
        result,
        Err(SessionError::Construction(ConstructionError::DuplicatePending { custom_type: 3, .. }))
    ));
    assert_eq!(session.tag_count(), 1);
}

#[test]
fn tag_without_type_or_value_is_rejected() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");

    let result = session.create_tag(&tag_group, TagInit::new(3));

    assert_eq!(
        result.err(),
        Some(SessionError::Construction(ConstructionError::MissingValueType))
    );
    assert_eq!(session.tag_count(), 0);
}

#[test]
fn tag_count_must_fit_a_value() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");

    let result = session.create_tag(&tag_group, TagInit::new(3).with_type(ValueType::Uint8, 5));

    assert_eq!(
        result.err(),
        Some(SessionError::Construction(ConstructionError::InvalidCount { count: 5 }))
    );
}

#[test]
fn set_tag_value_checks_shape() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");
    let tag = session
        .create_tag(&tag_group, TagInit::new(3).with_type(ValueType::Uint8, 1))
        .expect("tag");

    let result = session.set_tag_value(&tag, Value::single(300u32));
    assert!(matches!(
        result,
        Err(SessionError::Value(ValueError::OutOfRange { .. }))
    ));
    let result = session.set_tag_value(&tag, Value::new(vec![Scalar::Int(1), Scalar::Int(2)]));
    assert_eq!(
        result,
        Err(SessionError::Value(ValueError::CountMismatch {
            expected: 1,
            actual: 2
        }))
    );
    assert_eq!(session.tag(&tag).and_then(|tag| tag.value()), None);
}

#[test]
fn inbound_tag_value_is_stored_without_echo() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");
    session.receive_tag_group_create(42, 7, 32);
    let tag = session
        .receive_tag_create(42, 7, 11, ValueType::String8, 1, 3)
        .expect("materialized tag");
    session.take_outgoing_requests();

    let updated = session.receive_tag_set_value(42, 7, 11, Value::single("hello"));

    assert_eq!(updated, Some(tag));
    assert_eq!(
        session.tag(&tag).and_then(|tag| tag.value()),
        Some(&Value::single("hello"))
    );
    assert_no_requests!(session);
}

#[test]
fn inbound_tag_value_of_wrong_shape_is_ignored() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");
    session.receive_tag_group_create(42, 7, 32);
    let tag = session
        .receive_tag_create(42, 7, 11, ValueType::Uint8, 1, 3)
        .expect("materialized tag");

    assert!(session
        .receive_tag_set_value(42, 7, 11, Value::single("text"))
        .is_none());
    assert_eq!(session.tag(&tag).and_then(|tag| tag.value()), None);
}

#[test]
fn explicit_tag_subscription_is_sent_once() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");
    session.receive_tag_group_create(42, 7, 32);
    let tag = session
        .receive_tag_create(42, 7, 11, ValueType::Uint8, 1, 3)
        .expect("materialized tag");
    session.take_outgoing_requests();

    assert_eq!(session.subscribe_tag(&tag), Ok(true));
    assert_eq!(session.subscribe_tag(&tag), Ok(false));
    assert_requests!(
        session,
        [Request::TagSubscribe {
            node_id: 42,
            tag_group_id: 7,
            tag_id: 11
        }]
    );

    assert_eq!(session.unsubscribe_tag(&tag), Ok(true));
    assert_eq!(session.unsubscribe_tag(&tag), Ok(false));
    assert_requests!(
        session,
        [Request::TagUnsubscribe {
            node_id: 42,
            tag_group_id: 7,
            tag_id: 11
        }]
    );
}

#[test]
fn subscription_of_unconfirmed_tag_group_sends_nothing() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");
    session.take_outgoing_requests();

    assert_eq!(session.subscribe_tag_group(&tag_group), Ok(false));
    assert_no_requests!(session);
}

#[test]
fn tag_group_destroyed_before_confirmation_is_destroyed_once_confirmed() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("create tag group");
    session.take_outgoing_requests();

    session.destroy_tag_group(&tag_group).expect("destroy");
    assert_no_requests!(session);
    assert_eq!(
        session.tag_group(&tag_group).map(|tag_group| tag_group.state()),
        Some(EntityState::WantDestroy)
    );

    session.receive_tag_group_create(42, 7, 32);
    assert_requests!(
        session,
        [Request::TagGroupDestroy {
            node_id: 42,
            tag_group_id: 7
        }]
    );
    assert_eq!(
        session.tag_group(&tag_group).map(|tag_group| tag_group.state()),
        Some(EntityState::Destroying)
    );

    let removed = session.receive_tag_group_destroy(42, 7).expect("torn down");
    assert_eq!(removed.state(), EntityState::Destroyed);
    assert_eq!(session.tag_group_count(), 0);
    assert_no_requests!(session);
}

#[test]
fn tag_destroyed_before_confirmation_is_destroyed_once_confirmed() {
    let (mut session, node) = session_with_node();
    let tag_group = session
        .create_tag_group(&node, TagGroupInit::new(32))
        .expect("tag group");
    session.receive_tag_group_create(42, 7, 32);
    let tag = session
        .create_tag(&tag_group, TagInit::new(3).with_value(Value::single(5u32)))
        .expect("create tag");
    session.take_outgoing_requests();

    session.destroy_tag(&tag).expect("destroy");
    assert_no_requests!(session);
    assert_eq!(session.tag(&tag).map(|tag| tag.state()), Some(EntityState::WantDestroy));

    session.receive_tag_create(42, 7, 11, ValueType::Uint64, 1, 3);
    // no value goes out for a tag on its way out
    assert_requests!(
        session,
        [Request::TagDestroy {
            node_id: 42,
            tag_group_id: 7,
            tag_id: 11
        }]
    );

    let removed = session.receive_tag_destroy(42, 7, 11).expect("torn down");
    assert_eq!(removed.state(), EntityState::Destroyed);
    assert!(session.tag(&tag).is_none());
    assert_eq!(session.tag_count(), 0);
}
