mod common;

use apns_client::{Notification, Payload, Priority, PushType, UNKNOWN_ERROR_REASON};
use common::{MockResponse, spawn_gateway, test_client};
use uuid::Uuid;

#[tokio::test]
async fn test_accepted_send_yields_delivery() {
    common::setup_tracing();
    let gateway = spawn_gateway(|_| MockResponse::ok()).await;
    let client = test_client(gateway.addr);

    let notification = Notification::new("abc123", Payload::alert("Title", "Body"));
    let delivered = client.send(&notification).await.unwrap();

    assert_eq!(delivered.device_token, "abc123");
    assert_eq!(delivered.notification.device_token, "abc123");
    assert_eq!(delivered.apns_id.as_deref(), Some("mock-apns-id"));

    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.path, "/3/device/abc123");
    assert!(request.header("authorization").unwrap().starts_with("bearer "));
    assert_eq!(request.header("apns-push-type"), Some("alert"));
    assert_eq!(request.header("apns-priority"), Some("10"));
    assert_eq!(request.header("apns-topic"), Some("com.example.app"));
    assert!(request.header("apns-expiration").is_none());
    assert!(request.header("apns-collapse-id").is_none());

    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["aps"]["alert"]["title"], "Title");
    assert_eq!(body["aps"]["alert"]["body"], "Body");

    client.shutdown().await;
}

#[tokio::test]
async fn test_optional_headers_are_forwarded() {
    common::setup_tracing();
    let gateway = spawn_gateway(|_| MockResponse::ok()).await;
    let client = test_client(gateway.addr);

    let apns_id = Uuid::new_v4();
    let notification = Notification::new("abc 123", Payload::background())
        .with_topic("com.other.app")
        .with_priority(Priority::Throttled)
        .with_push_type(PushType::Background)
        .with_expiration(1_700_000_000)
        .with_collapse_id("game-42")
        .with_apns_id(apns_id);

    client.send(&notification).await.unwrap();

    let requests = gateway.requests();
    let request = &requests[0];
    // The device token lands percent-encoded in the path.
    assert_eq!(request.path, "/3/device/abc%20123");
    // The notification's own topic wins over the configured default.
    assert_eq!(request.header("apns-topic"), Some("com.other.app"));
    assert_eq!(request.header("apns-priority"), Some("5"));
    assert_eq!(request.header("apns-push-type"), Some("background"));
    assert_eq!(request.header("apns-expiration"), Some("1700000000"));
    assert_eq!(request.header("apns-collapse-id"), Some("game-42"));
    assert_eq!(request.header("apns-id"), Some(apns_id.to_string().as_str()));

    client.shutdown().await;
}

#[tokio::test]
async fn test_rejection_surfaces_reason_and_fires_event_once() {
    common::setup_tracing();
    let gateway = spawn_gateway(|_| MockResponse::error(410, "Unregistered")).await;
    let client = test_client(gateway.addr);
    let mut events = client.subscribe_reason("Unregistered");

    let notification = Notification::new("abc123", Payload::alert("t", "b"));
    let err = client.send(&notification).await.unwrap_err();

    let rejection = err.rejection().expect("expected a gateway rejection");
    assert_eq!(rejection.reason, "Unregistered");
    assert_eq!(rejection.status, 410);
    assert_eq!(rejection.notification.device_token, "abc123");

    match events.recv().await.unwrap() {
        apns_client::ClientEvent::Rejected { reason, status, notification } => {
            assert_eq!(reason, "Unregistered");
            assert_eq!(status, 410);
            assert_eq!(notification.device_token, "abc123");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(events.try_recv().is_err(), "event should fire exactly once");

    client.shutdown().await;
}

#[tokio::test]
async fn test_unparsable_error_body_yields_sentinel_reason() {
    common::setup_tracing();
    let gateway = spawn_gateway(|_| MockResponse::raw(503, "upstream fell over")).await;
    let client = test_client(gateway.addr);

    let notification = Notification::new("abc123", Payload::alert("t", "b"));
    let err = client.send(&notification).await.unwrap_err();

    let rejection = err.rejection().expect("expected a gateway rejection");
    assert_eq!(rejection.reason, UNKNOWN_ERROR_REASON);
    assert_eq!(rejection.status, 503);

    client.shutdown().await;
}
