use carehub_notify::push::{Backoff, HeartbeatConfig};
use carehub_notify::{
    session_channel, ConnectionStatus, HttpNotificationApi, NotificationCenter, NotificationState,
    NotificationStore, NotifyConfig, PushConfig, PushListener, ReconnectStrategy, Session,
    SessionSender,
};
use carehub_testing::{MockPushServer, MockResponse, MockServer, RequestMatcher};
use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const WAIT: Duration = Duration::from_secs(5);

fn record_json(id: &str, seen: bool, created_at: &str) -> Value {
    json!({
        "_id": id,
        "senderId": {"_id": "u-9", "firstName": "amira", "role": "provider"},
        "type": "complaint",
        "message": format!("notification {}", id),
        "seen": seen,
        "createdAt": created_at,
    })
}

struct Harness {
    api_server: MockServer,
    push: MockPushServer,
    sessions: SessionSender,
    center: NotificationCenter,
}

impl Harness {
    async fn start(initial: Value) -> Self {
        let api_server = MockServer::start().await;
        api_server
            .expect(RequestMatcher::list_notifications())
            .respond_with(MockResponse::new().data(initial));

        let push = MockPushServer::start().await;
        let (sessions, session_rx) = session_channel();
        let api = HttpNotificationApi::new(&api_server.base_url(), Duration::from_secs(5)).unwrap();
        let center = NotificationCenter::new(Arc::new(api), NotificationStore::new(), session_rx);

        Self {
            api_server,
            push,
            sessions,
            center,
        }
    }

    fn config(&self) -> PushConfig {
        PushConfig::new(self.push.url())
            .backoff(
                Backoff::new()
                    .strategy(ReconnectStrategy::Fixed)
                    .initial(Duration::from_millis(50))
                    .max(Duration::from_millis(50)),
            )
            .heartbeat(
                HeartbeatConfig::new()
                    .interval(Duration::from_secs(5))
                    .timeout(Duration::from_secs(5)),
            )
    }

    fn sign_in(&self, user_id: &str, token: &str) {
        self.sessions
            .send_replace(Some(Session::new(user_id).with_token(token)));
    }

    fn ids(&self) -> Vec<String> {
        self.center
            .store()
            .snapshot()
            .items
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    fn list_hits(&self) -> usize {
        self.api_server.hits(&Method::GET, "/notification")
    }
}

async fn wait_for_state(center: &NotificationCenter, f: impl FnMut(&NotificationState) -> bool) {
    let mut rx = center.subscribe();
    tokio::time::timeout(WAIT, rx.wait_for(f))
        .await
        .expect("timed out waiting for store state")
        .expect("store dropped");
}

async fn wait_for_list_hits(h: &Harness, n: usize) {
    tokio::time::timeout(WAIT, async {
        while h.list_hits() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for list requests");
}

async fn wait_for_status(rx: &mut watch::Receiver<ConnectionStatus>, status: ConnectionStatus) {
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == status))
        .await
        .expect("timed out waiting for listener status")
        .expect("listener dropped");
}

#[tokio::test]
async fn test_signed_out_listener_is_inert() {
    let h = Harness::start(json!([])).await;
    let handle = PushListener::spawn(h.center.clone(), h.config());

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(h.push.total_connections(), 0);
    assert_eq!(h.list_hits(), 0);
    assert_eq!(handle.status(), ConnectionStatus::Idle);
}

#[tokio::test]
async fn test_connects_after_initial_load_with_identity() {
    let h = Harness::start(json!([
        record_json("n1", false, "2025-03-01T10:00:00Z"),
        record_json("n2", true, "2025-03-01T09:00:00Z"),
    ]))
    .await;
    let handle = PushListener::spawn(h.center.clone(), h.config());
    let mut status = handle.subscribe_status();

    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;

    // The load completes before the socket is opened
    assert_eq!(h.ids(), ["n1", "n2"]);
    assert_eq!(h.center.store().unread_count(), 1);
    assert_eq!(h.list_hits(), 1);

    let handshakes = h.push.handshakes();
    assert_eq!(handshakes.len(), 1);
    assert_eq!(handshakes[0].user_id(), Some("admin-1"));
    assert_eq!(handshakes[0].authorization.as_deref(), Some("Bearer tok"));

    wait_for_status(&mut status, ConnectionStatus::Connected).await;
}

#[tokio::test]
async fn test_push_prepends_and_ignores_duplicates() {
    let h = Harness::start(json!([
        record_json("n1", false, "2025-03-01T10:00:00Z"),
        record_json("n2", true, "2025-03-01T09:00:00Z"),
    ]))
    .await;
    let _handle = PushListener::spawn(h.center.clone(), h.config());

    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;

    h.push
        .push_notification(record_json("n3", false, "2025-03-01T11:00:00Z"));
    wait_for_state(&h.center, |s| s.items.len() == 3).await;
    assert_eq!(h.ids(), ["n3", "n1", "n2"]);
    assert_eq!(h.center.store().unread_count(), 2);

    // Same id again, then a new one; frames are handled in order
    h.push
        .push_notification(record_json("n3", false, "2025-03-01T11:00:00Z"));
    h.push
        .push_notification(record_json("n4", true, "2025-03-01T12:00:00Z"));
    wait_for_state(&h.center, |s| s.get("n4").is_some()).await;

    assert_eq!(h.ids(), ["n4", "n3", "n1", "n2"]);
    assert_eq!(h.center.store().unread_count(), 2);
}

#[tokio::test]
async fn test_malformed_frame_is_dropped_without_disconnect() {
    let h = Harness::start(json!([])).await;
    let _handle = PushListener::spawn(h.center.clone(), h.config());

    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;

    h.push.push_text("{not json");
    h.push
        .push_event("notification:new", json!({"_id": 42, "type": "complaint"}));
    h.push.push_event("presence:update", json!({"online": true}));
    h.push
        .push_notification(record_json("n5", false, "2025-03-01T10:00:00Z"));

    wait_for_state(&h.center, |s| s.get("n5").is_some()).await;
    assert_eq!(h.ids(), ["n5"]);
    assert_eq!(h.push.open_connections(), 1);
    assert_eq!(h.push.total_connections(), 1);
}

#[tokio::test]
async fn test_reconnects_after_server_drop() {
    let h = Harness::start(json!([])).await;
    let handle = PushListener::spawn(h.center.clone(), h.config());
    let mut status = handle.subscribe_status();

    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;

    h.push.drop_connections();
    h.push.wait_for_total(2).await;
    h.push.wait_for_open(1).await;
    wait_for_status(&mut status, ConnectionStatus::Connected).await;

    h.push
        .push_notification(record_json("after", false, "2025-03-01T10:00:00Z"));
    wait_for_state(&h.center, |s| s.get("after").is_some()).await;

    // Reconnect does not reload the list unless resync is enabled
    assert_eq!(h.list_hits(), 1);
    assert_eq!(h.push.handshakes()[1].user_id(), Some("admin-1"));
}

#[tokio::test]
async fn test_resync_on_reconnect_merges_missed_records() {
    let h = Harness::start(json!([
        record_json("missed", false, "2025-03-01T11:00:00Z"),
        record_json("n1", false, "2025-03-01T10:00:00Z"),
    ]))
    .await;
    h.api_server
        .expect(RequestMatcher::list_notifications())
        .respond_with(MockResponse::new().data(json!([record_json(
            "n1",
            false,
            "2025-03-01T10:00:00Z"
        )])))
        .once();

    let _handle = PushListener::spawn(h.center.clone(), h.config().resync_on_reconnect(true));

    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;
    assert_eq!(h.ids(), ["n1"]);

    h.push.drop_connections();
    wait_for_state(&h.center, |s| s.items.len() == 2).await;

    assert_eq!(h.ids(), ["missed", "n1"]);
    assert_eq!(h.list_hits(), 2);
}

#[tokio::test]
async fn test_identity_change_replaces_connection() {
    let h = Harness::start(json!([])).await;
    let _handle = PushListener::spawn(h.center.clone(), h.config());

    h.sign_in("admin-1", "tok-1");
    h.push.wait_for_open(1).await;

    h.sign_in("admin-2", "tok-2");
    h.push.wait_for_total(2).await;
    h.push.wait_for_open(1).await;

    let handshakes = h.push.handshakes();
    assert_eq!(handshakes.len(), 2);
    assert_eq!(handshakes[1].user_id(), Some("admin-2"));
    assert_eq!(handshakes[1].authorization.as_deref(), Some("Bearer tok-2"));
    // Each identity gets its own initial load
    assert_eq!(h.list_hits(), 2);
}

#[tokio::test]
async fn test_token_refresh_reconnects() {
    let h = Harness::start(json!([])).await;
    let _handle = PushListener::spawn(h.center.clone(), h.config());

    h.sign_in("admin-1", "old");
    h.push.wait_for_open(1).await;

    h.sign_in("admin-1", "new");
    h.push.wait_for_total(2).await;

    assert_eq!(
        h.push.handshakes()[1].authorization.as_deref(),
        Some("Bearer new")
    );
}

#[tokio::test]
async fn test_resending_same_session_keeps_connection() {
    let h = Harness::start(json!([])).await;
    let _handle = PushListener::spawn(h.center.clone(), h.config());

    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;

    h.sign_in("admin-1", "tok");
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(h.push.total_connections(), 1);
    assert_eq!(h.push.open_connections(), 1);
}

#[tokio::test]
async fn test_sign_out_closes_connection() {
    let h = Harness::start(json!([])).await;
    let handle = PushListener::spawn(h.center.clone(), h.config());
    let mut status = handle.subscribe_status();

    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;

    h.sessions.send_replace(None);
    h.push.wait_for_open(0).await;
    wait_for_status(&mut status, ConnectionStatus::Idle).await;
}

#[tokio::test]
async fn test_shutdown_closes_connection() {
    let h = Harness::start(json!([])).await;
    let handle = PushListener::spawn(h.center.clone(), h.config());
    let status = handle.subscribe_status();

    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;

    handle.shutdown().await;

    h.push.wait_for_open(0).await;
    assert_eq!(*status.borrow(), ConnectionStatus::Idle);
}

#[tokio::test]
async fn test_dropping_handle_stops_listener() {
    let h = Harness::start(json!([])).await;
    let handle = PushListener::spawn(h.center.clone(), h.config());

    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;

    drop(handle);
    h.push.wait_for_open(0).await;

    h.sign_in("admin-2", "tok");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.push.total_connections(), 1);
}

#[tokio::test]
async fn test_unreachable_push_server_keeps_retrying() {
    let h = Harness::start(json!([])).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_url = format!("ws://{}/socket", listener.local_addr().unwrap());
    drop(listener);

    let config = PushConfig::new(dead_url).backoff(
        Backoff::new()
            .strategy(ReconnectStrategy::Fixed)
            .initial(Duration::from_millis(20)),
    );
    let handle = PushListener::spawn(h.center.clone(), config);
    let mut status = handle.subscribe_status();

    h.sign_in("admin-1", "tok");
    wait_for_status(&mut status, ConnectionStatus::Reconnecting).await;

    // The initial load does not depend on the push channel
    assert_eq!(h.list_hits(), 1);
    handle.shutdown().await;
    assert_eq!(*status.borrow(), ConnectionStatus::Idle);
}

/// Initial load answers at once; every later list fetch hangs for a while
async fn start_with_slow_resync() -> Harness {
    let h = Harness::start(json!([])).await;
    h.api_server
        .expect(RequestMatcher::list_notifications())
        .respond_with(
            MockResponse::new()
                .data(json!([]))
                .delay(Duration::from_secs(4)),
        );
    h.api_server
        .expect(RequestMatcher::list_notifications())
        .respond_with(MockResponse::new().data(json!([])))
        .once();
    h
}

async fn reconnect_into_resync(h: &Harness) {
    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;

    h.push.drop_connections();
    h.push.wait_for_total(2).await;
    wait_for_list_hits(h, 2).await;
}

#[tokio::test]
async fn test_sign_out_during_resync_closes_connection() {
    let h = start_with_slow_resync().await;
    let handle = PushListener::spawn(h.center.clone(), h.config().resync_on_reconnect(true));
    let mut status = handle.subscribe_status();
    reconnect_into_resync(&h).await;

    h.sessions.send_replace(None);

    tokio::time::timeout(Duration::from_secs(1), h.push.wait_for_open(0))
        .await
        .expect("socket left open while the resync was in flight");
    wait_for_status(&mut status, ConnectionStatus::Idle).await;
}

#[tokio::test]
async fn test_shutdown_during_resync_returns_promptly() {
    let h = start_with_slow_resync().await;
    let handle = PushListener::spawn(h.center.clone(), h.config().resync_on_reconnect(true));
    reconnect_into_resync(&h).await;

    tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
        .await
        .expect("shutdown waited for the resync request");
    h.push.wait_for_open(0).await;
}

#[tokio::test]
async fn test_push_during_resync_is_delivered() {
    let h = start_with_slow_resync().await;
    let _handle = PushListener::spawn(h.center.clone(), h.config().resync_on_reconnect(true));
    reconnect_into_resync(&h).await;
    h.push.wait_for_open(1).await;

    h.push
        .push_notification(record_json("live", false, "2025-03-01T10:00:00Z"));
    wait_for_state(&h.center, |s| s.get("live").is_some()).await;
}

#[tokio::test]
async fn test_flapping_connection_backs_off() {
    let h = Harness::start(json!([])).await;
    h.push.drop_new_connections(true);

    let config = h.config().backoff(
        Backoff::new()
            .strategy(ReconnectStrategy::Exponential)
            .initial(Duration::from_millis(100))
            .max(Duration::from_secs(10)),
    );
    let _handle = PushListener::spawn(h.center.clone(), config);

    h.sign_in("admin-1", "tok");
    h.push.wait_for_total(1).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    // Retries after 100, 200, 400 and 800 ms; a reset counter would retry every 100 ms
    let total = h.push.total_connections();
    assert!(total >= 2, "listener stopped retrying: {} connections", total);
    assert!(total <= 5, "backoff did not grow: {} connections", total);
}

#[tokio::test]
async fn test_zero_heartbeat_interval_still_delivers_pushes() {
    let h = Harness::start(json!([])).await;
    let settings = NotifyConfig::new(h.api_server.base_url(), h.push.url()).heartbeat(0, 5);
    let handle = PushListener::spawn(h.center.clone(), PushConfig::from_config(&settings));
    let mut status = handle.subscribe_status();

    h.sign_in("admin-1", "tok");
    h.push.wait_for_open(1).await;
    wait_for_status(&mut status, ConnectionStatus::Connected).await;

    // Several pings go out before the push arrives
    tokio::time::sleep(Duration::from_millis(350)).await;
    h.push
        .push_notification(record_json("n1", false, "2025-03-01T10:00:00Z"));
    wait_for_state(&h.center, |s| s.get("n1").is_some()).await;

    assert_eq!(h.push.total_connections(), 1);
    assert_eq!(handle.status(), ConnectionStatus::Connected);
}
