mod common;

use apns_client::{Notification, Payload};
use common::{MockResponse, spawn_gateway, test_client};

#[tokio::test]
async fn test_send_many_isolates_failures() {
    common::setup_tracing();
    let gateway = spawn_gateway(|request| {
        if request.path.ends_with("/bad") {
            MockResponse::error(410, "Unregistered")
        } else {
            MockResponse::ok()
        }
    })
    .await;
    let client = test_client(gateway.addr);

    let notifications = vec![
        Notification::new("ok-1", Payload::alert("t", "b")),
        Notification::new("bad", Payload::alert("t", "b")),
        Notification::new("ok-2", Payload::alert("t", "b")),
    ];

    let results = client.send_many(&notifications).await;
    assert_eq!(results.len(), 3);

    let delivered = results[0].as_ref().unwrap();
    assert_eq!(delivered.device_token, "ok-1");

    let rejection = results[1].as_ref().unwrap_err().rejection().unwrap();
    assert_eq!(rejection.reason, "Unregistered");
    assert_eq!(rejection.status, 410);
    assert_eq!(rejection.notification.device_token, "bad");

    let delivered = results[2].as_ref().unwrap();
    assert_eq!(delivered.device_token, "ok-2");

    client.shutdown().await;
}

#[tokio::test]
async fn test_send_to_many_fans_out_per_device() {
    common::setup_tracing();
    let gateway = spawn_gateway(|_| MockResponse::ok()).await;
    let client = test_client(gateway.addr);

    let notification = Notification::new("placeholder", Payload::alert("t", "b"));
    let device_tokens = vec!["d1".to_string(), "d2".to_string(), "d3".to_string()];

    let results = client.send_to_many(&notification, &device_tokens).await;
    assert_eq!(results.len(), 3);
    for (result, device_token) in results.iter().zip(&device_tokens) {
        assert_eq!(&result.as_ref().unwrap().device_token, device_token);
    }

    let mut paths: Vec<String> = gateway.requests().iter().map(|r| r.path.clone()).collect();
    paths.sort();
    assert_eq!(paths, vec!["/3/device/d1", "/3/device/d2", "/3/device/d3"]);

    client.shutdown().await;
}
