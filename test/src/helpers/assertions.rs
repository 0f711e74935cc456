/// Assert that draining the session's outgoing requests yields exactly the
/// given requests, in order
#[macro_export]
macro_rules! assert_requests {
    ($session:expr, [$($request:expr),* $(,)?]) => {
        let expected: Vec<scenesync_client::shared::Request> = vec![$($request),*];
        let actual = $session.take_outgoing_requests();
        assert_eq!(actual, expected, "Unexpected outgoing requests");
    };
}

/// Assert that the session has nothing to send
#[macro_export]
macro_rules! assert_no_requests {
    ($session:expr) => {
        let actual = $session.take_outgoing_requests();
        assert!(actual.is_empty(), "Expected no requests, got {:?}", actual);
    };
}
