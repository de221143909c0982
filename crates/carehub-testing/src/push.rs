//! Mock real-time channel
//!
//! Accepts WebSocket clients on a random port, remembers every handshake and
//! fans pushed frames out to all open connections.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot, watch};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// What a client sent when it opened its connection
#[derive(Debug, Clone)]
pub struct Handshake {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

impl Handshake {
    /// Value of the `userId` query parameter
    pub fn user_id(&self) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == "userId").then_some(value)
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConnectionStats {
    opened: usize,
    open: usize,
}

#[derive(Debug, Clone)]
enum Outbound {
    Text(String),
    Drop,
}

/// A mock push server
pub struct MockPushServer {
    addr: SocketAddr,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
    stats: Arc<watch::Sender<ConnectionStats>>,
    outbound: broadcast::Sender<Outbound>,
    drop_on_accept: Arc<AtomicBool>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockPushServer {
    /// Start a new push server on a random port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock push server");
        let addr = listener.local_addr().expect("mock push server address");

        let handshakes = Arc::new(Mutex::new(Vec::new()));
        let stats = Arc::new(watch::Sender::new(ConnectionStats::default()));
        let (outbound, _) = broadcast::channel(64);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let accept_handshakes = handshakes.clone();
        let accept_stats = stats.clone();
        let accept_outbound = outbound.clone();
        let drop_on_accept = Arc::new(AtomicBool::new(false));
        let accept_drop = drop_on_accept.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                tokio::spawn(serve_connection(
                                    stream,
                                    accept_handshakes.clone(),
                                    accept_stats.clone(),
                                    accept_outbound.subscribe(),
                                    accept_drop.load(Ordering::SeqCst),
                                ));
                            }
                            Err(e) => tracing::warn!("mock push accept error: {}", e),
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Self {
            addr,
            handshakes,
            stats,
            outbound,
            drop_on_accept,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// WebSocket URL clients should connect to
    pub fn url(&self) -> String {
        format!("ws://{}/socket", self.addr)
    }

    /// Handshakes seen so far, oldest first
    pub fn handshakes(&self) -> Vec<Handshake> {
        self.handshakes
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Connections currently open
    pub fn open_connections(&self) -> usize {
        self.stats.borrow().open
    }

    /// Connections accepted since start, including closed ones
    pub fn total_connections(&self) -> usize {
        self.stats.borrow().opened
    }

    /// Send a raw text frame to every open connection
    pub fn push_text(&self, text: impl Into<String>) -> usize {
        self.outbound.send(Outbound::Text(text.into())).unwrap_or(0)
    }

    /// Send an `{"event", "data"}` envelope to every open connection
    pub fn push_event(&self, event: &str, data: impl Serialize) -> usize {
        let frame = serde_json::json!({
            "event": event,
            "data": serde_json::to_value(data).expect("push payload must serialize"),
        });
        self.push_text(frame.to_string())
    }

    /// Push a `notification:new` event
    pub fn push_notification(&self, record: impl Serialize) -> usize {
        self.push_event("notification:new", record)
    }

    /// Abruptly drop every open connection without a close frame
    pub fn drop_connections(&self) {
        let _ = self.outbound.send(Outbound::Drop);
    }

    /// Complete the handshake on new connections, then drop them at once
    pub fn drop_new_connections(&self, enabled: bool) {
        self.drop_on_accept.store(enabled, Ordering::SeqCst);
    }

    /// Wait until exactly `n` connections are open
    pub async fn wait_for_open(&self, n: usize) {
        self.wait_for(|s| s.open == n, &format!("{} open connections", n))
            .await;
    }

    /// Wait until at least `n` connections have ever been accepted
    pub async fn wait_for_total(&self, n: usize) {
        self.wait_for(|s| s.opened >= n, &format!("{} total connections", n))
            .await;
    }

    async fn wait_for(&self, condition: impl FnMut(&ConnectionStats) -> bool, what: &str) {
        let mut rx = self.stats.subscribe();
        tokio::time::timeout(WAIT_LIMIT, rx.wait_for(condition))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
            .expect("mock push server stopped");
    }
}

impl Drop for MockPushServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.drop_connections();
    }
}

async fn serve_connection(
    stream: TcpStream,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
    stats: Arc<watch::Sender<ConnectionStats>>,
    mut outbound: broadcast::Receiver<Outbound>,
    drop_at_once: bool,
) {
    let record = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let handshake = Handshake {
            path: req.uri().path().to_string(),
            query: req.uri().query().map(str::to_string),
            authorization: req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };
        if let Ok(mut seen) = handshakes.lock() {
            seen.push(handshake);
        }
        Ok(resp)
    };

    let mut ws = match tokio_tungstenite::accept_hdr_async(stream, record).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!("mock push handshake failed: {}", e);
            return;
        }
    };

    stats.send_modify(|s| {
        s.opened += 1;
        s.open += 1;
    });

    while !drop_at_once {
        tokio::select! {
            out = outbound.recv() => {
                match out {
                    Ok(Outbound::Text(text)) => {
                        if ws.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Outbound::Drop) | Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                }
            }
            incoming = ws.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    stats.send_modify(|s| s.open -= 1);
}
