/// Class resolution through the registry and the construct/create hooks.
use std::sync::Arc;

use scenesync_client::{
    shared::{ConstructionError, RegistryError, Request},
    ClassRegistry, NodeInit, SessionConfig, SessionError, TagGroupInit, TagInit,
};
use scenesync_test::{
    assert_no_requests, assert_requests, connected_session_with, HookLog, RecordingNode,
    RecordingTag, RecordingTagGroup, TEST_AVATAR_ID, TEST_USER_ID,
};

fn avatar_registry(log: &HookLog) -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    registry
        .register_node(RecordingNode::new("Avatar", 17, log))
        .expect("register Avatar");
    registry
}

#[test]
fn local_node_resolves_registered_class() {
    let log = HookLog::new();
    let mut session = connected_session_with(SessionConfig::default(), avatar_registry(&log));

    let key = session.create_node(NodeInit::new(17)).expect("create node");
    assert_eq!(session.node(&key).map(|node| node.class_name()), Some("Avatar"));
    assert_eq!(log.entries(), vec!["construct Avatar".to_string()]);

    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);
    assert_eq!(
        log.entries(),
        vec!["construct Avatar".to_string(), "create Avatar".to_string()]
    );
}

#[test]
fn unregistered_type_falls_back_to_base_class() {
    let log = HookLog::new();
    let mut session = connected_session_with(SessionConfig::default(), avatar_registry(&log));

    let key = session.receive_node_create(30, None, 1, 99).expect("materialized");

    assert_eq!(session.node(&key).map(|node| node.class_name()), Some("Node"));
    assert!(log.entries().is_empty());
}

#[test]
fn most_refined_class_is_used() {
    let log = HookLog::new();
    let mut registry = avatar_registry(&log);
    registry
        .register_node(RecordingNode::new("FancyAvatar", 17, &log).extending("Avatar"))
        .expect("register FancyAvatar");
    let mut session = connected_session_with(SessionConfig::default(), registry);

    let key = session.receive_node_create(30, None, 1, 17).expect("materialized");

    assert_eq!(session.node(&key).map(|node| node.class_name()), Some("FancyAvatar"));
    assert_eq!(log.count("construct FancyAvatar"), 1);
    assert_eq!(log.count("create FancyAvatar"), 1);
    assert_eq!(log.count("construct Avatar"), 0);
}

#[test]
fn explicit_class_must_declare_requested_type() {
    let log = HookLog::new();
    let mut session = connected_session_with(SessionConfig::default(), ClassRegistry::new());

    let class = Arc::new(RecordingNode::new("Avatar", 17, &log));
    let result = session.create_node(NodeInit::new(18).with_class(class));

    assert_eq!(
        result.err(),
        Some(SessionError::Construction(ConstructionError::ClassTypeMismatch {
            class: "Avatar",
            declared: Some(17),
            requested: 18
        }))
    );
    assert_eq!(session.pending_node_count(18), 0);
}

#[test]
fn construct_failure_is_returned() {
    let log = HookLog::new();
    let mut registry = ClassRegistry::new();
    registry
        .register_node(RecordingNode::new("Broken", 17, &log).failing_construct())
        .expect("register Broken");
    let mut session = connected_session_with(SessionConfig::default(), registry);

    let result = session.create_node(NodeInit::new(17));

    assert!(matches!(result, Err(SessionError::NotConnected { .. })));
    assert_eq!(log.count("construct Broken"), 1);
}

#[test]
fn construct_failure_does_not_stop_materialization() {
    let log = HookLog::new();
    let mut registry = ClassRegistry::new();
    registry
        .register_node(RecordingNode::new("Broken", 17, &log).failing_construct())
        .expect("register Broken");
    let mut session = connected_session_with(SessionConfig::default(), registry);

    let key = session.receive_node_create(30, None, 1, 17);

    assert!(key.is_some());
    assert_eq!(session.node_by_id(30), key);
    assert_eq!(log.count("create Broken"), 1);
}

#[test]
fn class_may_opt_out_of_auto_subscribe() {
    let log = HookLog::new();
    let mut registry = ClassRegistry::new();
    registry
        .register_node(RecordingNode::new("Quiet", 17, &log).without_auto_subscribe())
        .expect("register Quiet");
    let mut session = connected_session_with(SessionConfig::default(), registry);
    let key = session.create_node(NodeInit::new(17)).expect("create node");
    session.take_outgoing_requests();

    session.receive_node_create(42, Some(TEST_AVATAR_ID), TEST_USER_ID, 17);

    assert_no_requests!(session);
    assert_eq!(session.node(&key).map(|node| node.is_subscribed()), Some(false));
    assert_eq!(session.subscribe_node(&key), Ok(true));
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
fn session_may_disable_auto_subscribe() {
    let config = SessionConfig {
        auto_subscribe: false,
        ..Default::default()
    };
    let mut session = scenesync_client::Session::new(config, ClassRegistry::new());

    session.receive_connect_accept(TEST_USER_ID, TEST_AVATAR_ID);
    assert_no_requests!(session);

    session.receive_node_create(30, None, 1, 2);
    assert_no_requests!(session);
}

#[test]
fn tag_group_and_tag_classes_resolve_by_full_type_key() {
    let log = HookLog::new();
    let mut registry = avatar_registry(&log);
    registry
        .register_tag_group(RecordingTagGroup {
            name: "Transform",
            node_custom_type: 17,
            custom_type: 32,
            log: log.clone(),
        })
        .expect("register Transform");
    registry
        .register_tag(RecordingTag {
            name: "Position",
            node_custom_type: 17,
            tag_group_custom_type: 32,
            custom_type: 3,
            log: log.clone(),
        })
        .expect("register Position");
    let mut session = connected_session_with(SessionConfig::default(), registry);
    let avatar = session.receive_node_create(42, None, 1, 17).expect("avatar");
    let other = session.receive_node_create(43, None, 1, 18).expect("other node");

    let transform = session
        .create_tag_group(&avatar, TagGroupInit::new(32))
        .expect("transform");
    let plain = session
        .create_tag_group(&other, TagGroupInit::new(32))
        .expect("plain");
    let position = session
        .create_tag(
            &transform,
            TagInit::new(3).with_type(scenesync_client::shared::ValueType::Real32, 3),
        )
        .expect("position");

    assert_eq!(session.tag_group(&transform).map(|tg| tg.class_name()), Some("Transform"));
    assert_eq!(session.tag_group(&plain).map(|tg| tg.class_name()), Some("TagGroup"));
    assert_eq!(session.tag(&position).map(|tag| tag.class_name()), Some("Position"));
    assert_eq!(log.count("construct Transform"), 1);
}

#[test]
fn registration_rejects_conflicting_classes() {
    let log = HookLog::new();
    let mut registry = avatar_registry(&log);

    let duplicate_name = registry.register_node(RecordingNode::new("Avatar", 18, &log));
    assert!(matches!(
        duplicate_name,
        Err(RegistryError::DuplicateClassName { class: "Avatar", .. })
    ));

    let duplicate_key = registry.register_node(RecordingNode::new("Other", 17, &log));
    assert!(matches!(
        duplicate_key,
        Err(RegistryError::DuplicateTypeKey {
            existing: "Avatar",
            ..
        })
    ));

    let unknown_base =
        registry.register_node(RecordingNode::new("Orphan", 19, &log).extending("Missing"));
    assert!(matches!(
        unknown_base,
        Err(RegistryError::UnknownBaseClass { base: "Missing", .. })
    ));

    assert_eq!(registry.len(), 1);
}
