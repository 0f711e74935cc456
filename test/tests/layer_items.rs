/// Layers: nesting, item values and their delivery around confirmation.
use scenesync_client::{
    shared::{ConstructionError, EntityState, Request, Scalar, Value, ValueType},
    LayerInit, NodeInit, NodeKey, Session, SessionError,
};
use scenesync_test::{
    assert_no_requests, assert_requests, connected_session, TEST_AVATAR_ID, TEST_USER_ID,
};

fn session_with_node() -> (Session, NodeKey) {
    let mut session = connected_session();
    let node = session.create_node(NodeInit::new(17)).expect("create node");
    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);
    session.take_outgoing_requests();
    (session, node)
}

fn vector(x: f64, y: f64, z: f64) -> Value {
    Value::new(vec![Scalar::Real(x), Scalar::Real(y), Scalar::Real(z)])
}

#[test]
fn items_set_before_confirmation_are_sent_with_it() {
    let (mut session, node) = session_with_node();
    let layer = session
        .create_layer(&node, LayerInit::new(4, ValueType::Real32).with_count(3))
        .expect("create layer");
    assert_requests!(
        session,
        [Request::LayerCreate {
            node_id: 42,
            parent_layer_id: None,
            value_type: ValueType::Real32,
            count: 3,
            custom_type: 4
        }]
    );

    session
        .set_layer_item(&layer, 2, vector(0.0, 1.0, 2.0))
        .expect("item 2");
    session
        .set_layer_item(&layer, 1, vector(3.0, 4.0, 5.0))
        .expect("item 1");
    assert_no_requests!(session);

    assert_eq!(session.receive_layer_create(42, None, 8, ValueType::Real32, 3, 4), Some(layer));

    assert_requests!(
        session,
        [
            Request::LayerSubscribe {
                node_id: 42,
                layer_id: 8,
                version: 0,
                crc32: 0
            },
            Request::LayerSetValue {
                node_id: 42,
                layer_id: 8,
                item_id: 1,
                value_type: ValueType::Real32,
                value: vector(3.0, 4.0, 5.0)
            },
            Request::LayerSetValue {
                node_id: 42,
                layer_id: 8,
                item_id: 2,
                value_type: ValueType::Real32,
                value: vector(0.0, 1.0, 2.0)
            },
        ]
    );
    assert_eq!(session.layer_by_id(42, 8), Some(layer));
    assert_eq!(session.layer(&layer).map(|layer| layer.state()), Some(EntityState::Created));
}

#[test]
fn items_of_confirmed_layer_are_sent_immediately() {
    let (mut session, node) = session_with_node();
    let layer = session
        .receive_layer_create(42, None, 8, ValueType::Uint16, 1, 4)
        .expect("materialized layer");
    session.take_outgoing_requests();
    assert_eq!(session.node(&node).and_then(|node| node.layer(8)), Some(layer));

    session
        .set_layer_item(&layer, 10, Value::single(1000u32))
        .expect("set item");
    let previous = session.unset_layer_item(&layer, 10).expect("unset item");

    assert_eq!(previous, Some(Value::single(1000u32)));
    assert_requests!(
        session,
        [
            Request::LayerSetValue {
                node_id: 42,
                layer_id: 8,
                item_id: 10,
                value_type: ValueType::Uint16,
                value: Value::single(1000u32)
            },
            Request::LayerUnsetValue {
                node_id: 42,
                layer_id: 8,
                item_id: 10
            },
        ]
    );
}

#[test]
fn unset_of_missing_item_sends_nothing() {
    let (mut session, _node) = session_with_node();
    let layer = session
        .receive_layer_create(42, None, 8, ValueType::Uint16, 1, 4)
        .expect("materialized layer");
    session.take_outgoing_requests();

    assert_eq!(session.unset_layer_item(&layer, 99), Ok(None));
    assert_no_requests!(session);
}

#[test]
fn nested_layer_waits_for_parent_layer() {
    let (mut session, node) = session_with_node();
    let parent = session
        .create_layer(&node, LayerInit::new(4, ValueType::Uint8))
        .expect("parent layer");
    let nested = session
        .create_layer(&node, LayerInit::new(5, ValueType::Uint8).with_parent(parent))
        .expect("nested layer");
    assert_requests!(
        session,
        [Request::LayerCreate {
            node_id: 42,
            parent_layer_id: None,
            value_type: ValueType::Uint8,
            count: 1,
            custom_type: 4
        }]
    );

    session.receive_layer_create(42, None, 8, ValueType::Uint8, 1, 4);
    assert_requests!(
        session,
        [
            Request::LayerSubscribe {
                node_id: 42,
                layer_id: 8,
                version: 0,
                crc32: 0
            },
            Request::LayerCreate {
                node_id: 42,
                parent_layer_id: Some(8),
                value_type: ValueType::Uint8,
                count: 1,
                custom_type: 5
            },
        ]
    );

    session.receive_layer_create(42, Some(8), 9, ValueType::Uint8, 1, 5);
    assert_eq!(session.layer(&parent).and_then(|layer| layer.child_layer(9)), Some(nested));
    assert_eq!(session.layer(&nested).and_then(|layer| layer.parent_layer()), Some(parent));
}

#[test]
fn parent_layer_must_belong_to_the_same_node() {
    let (mut session, node) = session_with_node();
    let other_node = session.receive_node_create(30, None, 1, 2).expect("other node");
    let foreign = session
        .create_layer(&other_node, LayerInit::new(4, ValueType::Uint8))
        .expect("foreign layer");

    let result =
        session.create_layer(&node, LayerInit::new(5, ValueType::Uint8).with_parent(foreign));

    assert_eq!(
        result.err(),
        Some(SessionError::Construction(ConstructionError::ForeignParentLayer))
    );
}

#[test]
fn second_pending_layer_of_a_type_is_rejected() {
    let (mut session, node) = session_with_node();
    session
        .create_layer(&node, LayerInit::new(4, ValueType::Uint8))
        .expect("first");

    let result = session.create_layer(&node, LayerInit::new(4, ValueType::Uint8));

    assert!(matches!(
        result,
        Err(SessionError::Construction(ConstructionError::DuplicatePending { custom_type: 4, .. }))
    ));
}

#[test]
fn inbound_items_are_stored_and_unset() {
    let (mut session, _node) = session_with_node();
    let layer = session
        .receive_layer_create(42, None, 8, ValueType::Real64, 3, 4)
        .expect("materialized layer");
    session.take_outgoing_requests();

    assert_eq!(
        session.receive_layer_set_value(42, 8, 3, vector(1.0, 2.0, 3.0)),
        Some(layer)
    );
    assert_eq!(session.layer_item_by_id(42, 8, 3), Some(&vector(1.0, 2.0, 3.0)));
    assert_no_requests!(session);

    assert_eq!(
        session.receive_layer_unset_value(42, 8, 3),
        Some(vector(1.0, 2.0, 3.0))
    );
    assert_eq!(session.receive_layer_unset_value(42, 8, 3), None);
    assert_eq!(session.layer(&layer).map(|layer| layer.item_count()), Some(0));
}

#[test]
fn inbound_item_of_wrong_shape_is_ignored() {
    let (mut session, _node) = session_with_node();
    let layer = session
        .receive_layer_create(42, None, 8, ValueType::Real64, 3, 4)
        .expect("materialized layer");

    assert!(session
        .receive_layer_set_value(42, 8, 3, Value::single(1.0))
        .is_none());
    assert_eq!(session.layer(&layer).map(|layer| layer.item_count()), Some(0));
}

#[test]
fn items_iterate_in_id_order() {
    let (mut session, _node) = session_with_node();
    let layer = session
        .receive_layer_create(42, None, 8, ValueType::Uint8, 1, 4)
        .expect("materialized layer");
    for item_id in [5, 1, 3] {
        session
            .set_layer_item(&layer, item_id, Value::single(7u8))
            .expect("set item");
    }

    let ids: Vec<u32> = session
        .layer(&layer)
        .map(|layer| layer.items().map(|(item_id, _)| item_id).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![1, 3, 5]);
}

#[test]
fn layer_destroyed_before_confirmation_is_destroyed_once_confirmed() {
    let (mut session, node) = session_with_node();
    let layer = session
        .create_layer(&node, LayerInit::new(4, ValueType::Real32).with_count(3))
        .expect("create layer");
    session
        .set_layer_item(&layer, 1, vector(3.0, 4.0, 5.0))
        .expect("item 1");
    session.take_outgoing_requests();

    session.destroy_layer(&layer).expect("destroy");
    assert_no_requests!(session);
    assert_eq!(session.layer(&layer).map(|layer| layer.state()), Some(EntityState::WantDestroy));

    session.receive_layer_create(42, None, 8, ValueType::Real32, 3, 4);
    // items set meanwhile are dropped with the layer
    assert_requests!(
        session,
        [Request::LayerDestroy {
            node_id: 42,
            layer_id: 8
        }]
    );

    let removed = session.receive_layer_destroy(42, 8).expect("torn down");
    assert_eq!(removed.state(), EntityState::Destroyed);
    assert!(session.layer(&layer).is_none());
    assert_eq!(session.layer_count(), 0);
}
