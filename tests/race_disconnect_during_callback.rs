mod common;

use std::time::Duration;

use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// §8 scenario 6: the client aborts the connect request while the
/// controller's connect callback is still in flight. The gateway must not
/// insert the record and must not emit a disconnect callback once the
/// (now-too-late) callback response arrives, and the registry must stay
/// empty.
#[tokio::test]
async fn client_abort_during_connect_callback_leaves_no_trace() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let callback_url = format!("{}/callback", mock_server.uri());
    let base_url = common::spawn_gateway(Some(callback_url), 3600).await;

    let client = reqwest::Client::new();
    let request = client.get(format!("{base_url}/sse/room")).send();
    let aborted = tokio::time::timeout(Duration::from_millis(50), request).await;
    assert!(aborted.is_err(), "the connect request should still be pending at 50ms");
    // Dropping the timed-out future above drops the in-flight request,
    // which is what the client-side "abort" models here.

    // Give the delayed callback time to complete and the gateway time to
    // notice the already-closed client stream.
    tokio::time::sleep(Duration::from_millis(400)).await;

    mock_server.verify().await;
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "only the connect callback should ever fire");
    assert_eq!(requests[0].body_json::<serde_json::Value>().unwrap()["action"], "connect");
}
