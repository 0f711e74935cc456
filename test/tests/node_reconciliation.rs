/// Matching server confirmations against speculative nodes.
///
/// A node created locally has no id until the server announces a node of the
/// same type under this client's avatar, owned by this client's user. Anything
/// else the server announces is materialized as a new node.
use scenesync_client::{
    shared::{EntityState, Request, DEFAULT_PRIORITY},
    NodeInit, Resolved, Session,
};
use scenesync_shared::{EntityLifecycle, InboundEvent};
use scenesync_test::{
    assert_no_requests, assert_requests, connected_session, TEST_AVATAR_ID, TEST_USER_ID,
};

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

#[test]
fn speculative_node_is_bound_to_matching_confirmation() {
    init_logging();
    let mut session = connected_session();

    let key = session.create_node(NodeInit::new(17)).expect("create node");
    assert_requests!(session, [Request::NodeCreate { custom_type: 17 }]);
    assert_eq!(session.node(&key).map(|node| node.state()), Some(EntityState::Creating));
    assert_eq!(session.pending_node_count(17), 1);

    let confirmed = session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);

    assert_eq!(confirmed, Some(key));
    assert_eq!(session.node_by_id(42), Some(key));
    assert_eq!(session.pending_node_count(17), 0);
    let node = session.node(&key).expect("node still live");
    assert_eq!(node.id(), Some(42));
    assert_eq!(node.state(), EntityState::Created);
    assert_eq!(node.user_id(), Some(TEST_USER_ID));
    assert_requests!(
        session,
        [Request::NodeSubscribe {
            node_id: 42,
            version: 0,
            crc32: 0
        }]
    );
}

#[test]
fn confirmation_for_another_user_is_materialized() {
    init_logging();
    let mut session = connected_session();
    let pending = session.create_node(NodeInit::new(17)).expect("create node");
    session.take_outgoing_requests();

    let other = session
        .receive_node_create(43, Some(TEST_AVATAR_ID), TEST_USER_ID + 1, 17)
        .expect("materialized");

    assert_ne!(other, pending);
    assert_eq!(session.pending_node_count(17), 1);
    assert_eq!(session.node(&pending).and_then(|node| node.id()), None);
    assert_eq!(session.node(&other).map(|node| node.state()), Some(EntityState::Created));
    assert_requests!(
        session,
        [Request::NodeSubscribe {
            node_id: 43,
            version: 0,
            crc32: 0
        }]
    );
}

#[test]
fn confirmation_under_another_parent_is_materialized() {
    let mut session = connected_session();
    session.create_node(NodeInit::new(17)).expect("create node");
    session.take_outgoing_requests();

    session.receive_node_create(44, Some(TEST_AVATAR_ID + 1), TEST_USER_ID, 17);

    assert_eq!(session.pending_node_count(17), 1);
    assert!(session.node_by_id(44).is_some());
}

#[test]
fn confirmations_pop_pending_nodes_in_creation_order() {
    let mut session = connected_session();
    let first = session.create_node(NodeInit::new(17)).expect("first");
    let second = session.create_node(NodeInit::new(17)).expect("second");
    let other_type = session.create_node(NodeInit::new(18)).expect("other type");
    assert_eq!(session.pending_nodes(17), vec![first, second]);

    assert_eq!(
        session.receive_node_create(50, Some(TEST_AVATAR_ID), TEST_USER_ID, 17),
        Some(first)
    );
    assert_eq!(
        session.receive_node_create(51, Some(TEST_AVATAR_ID), TEST_USER_ID, 17),
        Some(second)
    );
    assert_eq!(session.pending_node_count(18), 1);
    assert_eq!(session.node(&other_type).and_then(|node| node.id()), None);
}

#[test]
fn destroy_before_confirmation_is_sent_on_confirmation() {
    let mut session = connected_session();
    let key = session.create_node(NodeInit::new(17)).expect("create node");
    session.take_outgoing_requests();

    session.destroy_node(&key).expect("destroy");
    assert_no_requests!(session);
    assert_eq!(session.node(&key).map(|node| node.state()), Some(EntityState::WantDestroy));

    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);
    assert_requests!(session, [Request::NodeDestroy { node_id: 42 }]);
    assert_eq!(session.node(&key).map(|node| node.state()), Some(EntityState::Destroying));

    let removed = session.receive_node_destroy(42).expect("torn down");
    assert_eq!(removed.state(), EntityState::Destroyed);
    assert!(session.node(&key).is_none());
    assert!(session.node_by_id(42).is_none());
}

#[test]
fn pending_priority_is_sent_on_confirmation() {
    let mut session = connected_session();
    let key = session.create_node(NodeInit::new(17)).expect("create node");
    session.set_node_priority(&key, 200).expect("priority");
    assert_requests!(session, [Request::NodeCreate { custom_type: 17 }]);

    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);

    let requests = session.take_outgoing_requests();
    assert!(requests.contains(&Request::NodePriority {
        node_id: 42,
        priority: 200
    }));
    assert_eq!(session.node(&key).map(|node| node.priority()), Some(200));
}

#[test]
fn default_priority_is_not_resent() {
    let mut session = connected_session();
    let key = session.create_node(NodeInit::new(17)).expect("create node");
    session.take_outgoing_requests();
    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);

    let requests = session.take_outgoing_requests();
    assert!(!requests
        .iter()
        .any(|request| matches!(request, Request::NodePriority { .. })));
    assert_eq!(session.node(&key).map(|node| node.priority()), Some(DEFAULT_PRIORITY));
}

#[test]
fn node_created_before_connect_is_sent_on_accept() {
    init_logging();
    let mut session = Session::default();
    let key = session.create_node(NodeInit::new(17)).expect("create node");
    assert_no_requests!(session);
    assert_eq!(session.node(&key).map(|node| node.state()), Some(EntityState::Creating));

    let root = session.receive_connect_accept(TEST_USER_ID, TEST_AVATAR_ID);

    assert!(root.is_some());
    let requests = session.take_outgoing_requests();
    assert_eq!(
        requests,
        vec![
            Request::NodeSubscribe {
                node_id: 0,
                version: 0,
                crc32: 0
            },
            Request::NodeCreate { custom_type: 17 },
        ]
    );
}

#[test]
fn link_of_unconfirmed_child_is_sent_after_confirmation() {
    let mut session = connected_session();
    let parent = session
        .receive_node_create(30, None, TEST_USER_ID + 1, 2)
        .expect("parent");
    let child = session.create_node(NodeInit::new(17)).expect("child");
    session.link_node(&child, &parent).expect("link");
    session.take_outgoing_requests();

    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);

    let requests = session.take_outgoing_requests();
    assert!(requests.contains(&Request::NodeLink {
        parent_id: 30,
        child_id: 42
    }));
    assert_eq!(session.node(&child).and_then(|node| node.parent()), Some(parent));
    assert_eq!(session.node(&parent).and_then(|node| node.child_node(42)), Some(child));
    assert_eq!(session.node(&child).map(|node| node.has_pending_link()), Some(false));
}

#[test]
fn link_of_confirmed_nodes_waits_for_server() {
    let mut session = connected_session();
    let parent = session.receive_node_create(30, None, 1, 2).expect("parent");
    let child = session.receive_node_create(31, None, 1, 2).expect("child");
    session.take_outgoing_requests();

    session.link_node(&child, &parent).expect("link");
    assert_requests!(
        session,
        [Request::NodeLink {
            parent_id: 30,
            child_id: 31
        }]
    );
    assert_eq!(session.node(&child).and_then(|node| node.parent()), None);

    session.receive_node_link(30, 31);
    assert_eq!(session.node(&child).and_then(|node| node.parent()), Some(parent));
    assert_eq!(session.node(&parent).map(|node| node.child_node_ids()), Some(vec![31]));
}

#[test]
fn events_after_disconnect_are_ignored() {
    let mut session = connected_session();
    session.receive_connect_terminate();

    assert!(session.receive_node_create(42, None, 1, 17).is_none());
    assert!(session.node_by_id(42).is_none());
    assert!(session
        .receive_event(InboundEvent::NodeDestroy { node_id: 0 })
        .is_none());
    assert!(session.root_node().is_some());
}

#[test]
fn receive_event_dispatches_node_create() {
    let mut session = connected_session();

    let resolved = session.receive_event(InboundEvent::NodeCreate {
        node_id: 60,
        parent_id: None,
        user_id: 1,
        custom_type: 4,
    });

    let Some(Resolved::Node(key)) = resolved else {
        panic!("Expected a node, got {:?}", resolved);
    };
    assert_eq!(session.node_by_id(60), Some(key));
}

#[test]
fn subscribe_acknowledgement_changes_nothing() {
    let mut session = connected_session();
    let resolved = session.receive_event(InboundEvent::NodeSubscribe {
        node_id: 0,
        version: 0,
        crc32: 0,
    });
    assert!(resolved.is_none());
    assert_no_requests!(session);
}

#[test]
fn confirmed_node_joins_avatar_children() {
    let mut session = connected_session();
    let avatar = session
        .receive_node_create(TEST_AVATAR_ID, Some(0), TEST_USER_ID, 1)
        .expect("avatar");
    let key = session.create_node(NodeInit::new(17)).expect("create node");
    assert_eq!(session.pending_node_count(17), 1);

    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);

    assert_eq!(session.pending_node_count(17), 0);
    assert_eq!(session.node(&avatar).and_then(|node| node.child_node(42)), Some(key));
    assert_eq!(session.node(&key).and_then(|node| node.parent()), Some(avatar));
    assert_eq!(session.node(&key).map(|node| node.state()), Some(EntityState::Created));
    assert_eq!(session.avatar_node(), Some(avatar));
}

#[test]
fn repeated_confirmation_keeps_pending_nodes_queued() {
    let mut session = connected_session();
    let first = session.create_node(NodeInit::new(17)).expect("first");
    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);
    let second = session.create_node(NodeInit::new(17)).expect("second");
    session.take_outgoing_requests();

    let repeated = session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);

    assert_eq!(repeated, Some(first));
    assert_eq!(session.pending_nodes(17), vec![second]);
    assert_eq!(session.node(&first).map(|node| node.state()), Some(EntityState::Created));
    assert_no_requests!(session);

    assert_eq!(
        session.receive_node_create(43, Some(TEST_AVATAR_ID), TEST_USER_ID, 17),
        Some(second)
    );
}

#[test]
#[should_panic(expected = "create from CREATING")]
fn creating_twice_is_a_violation() {
    let mut lifecycle = EntityLifecycle::new();
    lifecycle.create(false, true);
    lifecycle.create(false, true);
}
