use carehub_testing::{MockPushServer, MockResponse, MockServer, RequestMatcher};
use futures_util::StreamExt;
use http::{Method, StatusCode};
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_mock_server_wraps_data_envelope() {
    let server = MockServer::start().await;

    server
        .expect(RequestMatcher::list_notifications())
        .respond_with(MockResponse::new().data(json!([{"_id": "n1"}])))
        .once();

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{}/notification", server.base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"data": [{"_id": "n1"}]}));

    server.verify();
}

#[tokio::test]
async fn test_bearer_matching() {
    let server = MockServer::start().await;

    server
        .expect(RequestMatcher::mark_all_seen().bearer("secret"))
        .respond_with(MockResponse::new().status(StatusCode::NO_CONTENT));

    let client = reqwest::Client::new();
    let url = format!("{}/notification/seen-all", server.base_url());

    let resp = client.patch(&url).bearer_auth("secret").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client.patch(&url).bearer_auth("other").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    assert_eq!(server.unmatched_requests().len(), 1);
    assert_eq!(server.received_requests().len(), 2);
    assert_eq!(
        server.received_requests()[0].authorization(),
        Some("Bearer secret")
    );
}

#[tokio::test]
async fn test_bounded_expectations_answer_in_turn() {
    let server = MockServer::start().await;

    server
        .expect(RequestMatcher::list_notifications())
        .respond_with(MockResponse::new().data(json!(["second"])));
    server
        .expect(RequestMatcher::list_notifications())
        .respond_with(MockResponse::new().data(json!(["first"])))
        .once();

    let client = reqwest::Client::new();
    let url = format!("{}/notification", server.base_url());

    let first: serde_json::Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    let second: serde_json::Value = client.get(&url).send().await.unwrap().json().await.unwrap();

    assert_eq!(first["data"], json!(["first"]));
    assert_eq!(second["data"], json!(["second"]));
    assert_eq!(server.hits(&Method::GET, "/notification"), 2);
}

#[tokio::test]
async fn test_times_verification() {
    let server = MockServer::start().await;

    server
        .expect(RequestMatcher::mark_seen("n1"))
        .respond_with(MockResponse::new().delay(Duration::from_millis(10)))
        .times(2);

    let client = reqwest::Client::new();
    let url = format!("{}/notification/n1/seen", server.base_url());

    client.patch(&url).send().await.unwrap();
    client.patch(&url).send().await.unwrap();

    server.verify();
}

#[tokio::test]
#[should_panic]
async fn test_verification_failure() {
    let server = MockServer::start().await;

    server.expect(RequestMatcher::mark_all_seen()).once();

    server.verify();
}

#[tokio::test]
async fn test_push_server_records_handshake_and_fans_out() {
    let server = MockPushServer::start().await;

    let url = format!("{}?userId=u1", server.url());
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    server.wait_for_open(1).await;

    let handshakes = server.handshakes();
    assert_eq!(handshakes.len(), 1);
    assert_eq!(handshakes[0].user_id(), Some("u1"));
    assert_eq!(handshakes[0].path, "/socket");

    assert_eq!(server.push_notification(json!({"_id": "n1"})), 1);

    let frame = ws.next().await.unwrap().unwrap();
    let Message::Text(text) = frame else {
        panic!("expected a text frame, got {:?}", frame);
    };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["event"], "notification:new");
    assert_eq!(value["data"]["_id"], "n1");

    server.drop_connections();
    server.wait_for_open(0).await;
    assert_eq!(server.total_connections(), 1);
}
