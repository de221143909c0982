//! Push listener supervisor

use super::backoff::Backoff;
use super::envelope::PushEvent;
use super::heartbeat::{Heartbeat, HeartbeatConfig};
use crate::config::NotifyConfig;
use crate::consumer::NotificationCenter;
use crate::error::{NotifyError, Result};
use crate::session::{Session, SessionReceiver};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Push listener settings
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Real-time endpoint; `userId` is appended as a query parameter
    pub socket_url: String,
    pub heartbeat: HeartbeatConfig,
    pub backoff: Backoff,
    /// Refetch and merge the list after every reconnect
    pub resync_on_reconnect: bool,
}

impl PushConfig {
    pub fn new(socket_url: impl Into<String>) -> Self {
        Self {
            socket_url: socket_url.into(),
            heartbeat: HeartbeatConfig::default(),
            backoff: Backoff::default(),
            resync_on_reconnect: false,
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self {
            socket_url: config.socket_url.clone(),
            heartbeat: HeartbeatConfig::new()
                .interval(config.heartbeat_interval())
                .timeout(config.heartbeat_timeout()),
            backoff: Backoff::new()
                .strategy(config.reconnect_strategy)
                .initial(config.reconnect_initial_backoff())
                .max(config.reconnect_max_backoff()),
            resync_on_reconnect: config.resync_on_reconnect,
        }
    }

    pub fn heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn resync_on_reconnect(mut self, enabled: bool) -> Self {
        self.resync_on_reconnect = enabled;
        self
    }
}

/// State of the push connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Signed out or stopped
    Idle,
    /// First connection attempt for the current session
    Connecting,
    Connected,
    /// Waiting to retry after a failure or a dropped connection
    Reconnecting,
}

/// Keeps one push connection open for the current session
pub struct PushListener;

impl PushListener {
    /// Start the supervisor task.
    ///
    /// It follows the center's session channel: no connection while signed
    /// out, one connection per identity, the old one closed before the next
    /// opens. The initial list load runs before each session's first
    /// connection.
    pub fn spawn(center: NotificationCenter, config: PushConfig) -> PushListenerHandle {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Idle);
        let (stop_tx, stop_rx) = watch::channel(false);

        let supervisor = Supervisor {
            sessions: center.sessions(),
            center,
            config,
            status: status_tx,
            stop: stop_rx,
        };
        let task = tokio::spawn(supervisor.run());

        PushListenerHandle {
            status: status_rx,
            stop: stop_tx,
            task: Some(task),
        }
    }
}

/// Owner of a running [`PushListener`]; dropping it stops the listener
#[derive(Debug)]
pub struct PushListenerHandle {
    status: watch::Receiver<ConnectionStatus>,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PushListenerHandle {
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Observe status transitions
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Close the connection and wait for the supervisor to exit
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("push listener task failed: {}", e);
            }
        }
    }
}

impl Drop for PushListenerHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

/// Why a session's connection loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Shutdown,
    SessionChanged,
    SessionsClosed,
}

/// Why a single connection ended
#[derive(Debug)]
enum Pumped {
    Exit(Exit),
    Lost(String),
}

struct Supervisor {
    center: NotificationCenter,
    config: PushConfig,
    status: watch::Sender<ConnectionStatus>,
    sessions: SessionReceiver,
    stop: watch::Receiver<bool>,
}

impl Supervisor {
    async fn run(mut self) {
        loop {
            let session = self.sessions.borrow_and_update().clone();

            let exit = match session {
                Some(session) => self.serve_session(&session).await,
                None => {
                    self.status.send_replace(ConnectionStatus::Idle);
                    tokio::select! {
                        _ = stopped(&mut self.stop) => Exit::Shutdown,
                        changed = self.sessions.changed() => match changed {
                            Ok(()) => Exit::SessionChanged,
                            Err(_) => Exit::SessionsClosed,
                        },
                    }
                }
            };

            match exit {
                Exit::SessionChanged => continue,
                Exit::Shutdown | Exit::SessionsClosed => break,
            }
        }

        self.status.send_replace(ConnectionStatus::Idle);
        tracing::debug!("push listener stopped");
    }

    async fn serve_session(&mut self, session: &Session) -> Exit {
        self.status.send_replace(ConnectionStatus::Connecting);

        // Pushes must not race the initial replace-all
        {
            let load = self.center.load();
            tokio::pin!(load);
            loop {
                tokio::select! {
                    _ = stopped(&mut self.stop) => return Exit::Shutdown,
                    changed = self.sessions.changed() => {
                        if let Some(exit) = session_moved(&mut self.sessions, session, changed) {
                            return exit;
                        }
                    }
                    _ = &mut load => break,
                }
            }
        }

        let mut attempt: u32 = 0;
        let mut connected_before = false;

        loop {
            let handshake = tokio::time::timeout(
                self.config.heartbeat.idle_limit(),
                connect(&self.config.socket_url, session),
            );
            let connected = tokio::select! {
                _ = stopped(&mut self.stop) => return Exit::Shutdown,
                changed = self.sessions.changed() => match session_moved(&mut self.sessions, session, changed) {
                    Some(exit) => return exit,
                    None => continue,
                },
                res = handshake => res,
            };

            match connected {
                Ok(Ok(socket)) => {
                    self.status.send_replace(ConnectionStatus::Connected);
                    tracing::info!(user_id = %session.user_id, "push channel connected");

                    let resync = connected_before && self.config.resync_on_reconnect;
                    connected_before = true;
                    let opened_at = Instant::now();

                    match self.pump(socket, session, resync).await {
                        Pumped::Exit(exit) => return exit,
                        Pumped::Lost(reason) => {
                            tracing::warn!(user_id = %session.user_id, reason = %reason, "push channel lost");
                        }
                    }

                    // Only a connection that outlived one ping clears the backoff
                    if opened_at.elapsed() >= self.config.heartbeat.ping_interval() {
                        attempt = 0;
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!(user_id = %session.user_id, attempt, error = %err, "push channel connect failed");
                }
                Err(_) => {
                    tracing::warn!(user_id = %session.user_id, attempt, "push channel connect timed out");
                }
            }

            let delay = self.config.backoff.delay(attempt);
            attempt = attempt.saturating_add(1);
            self.status.send_replace(ConnectionStatus::Reconnecting);
            tracing::debug!(
                user_id = %session.user_id,
                attempt,
                backoff_ms = delay.as_millis() as u64,
                "waiting before push reconnect"
            );

            tokio::select! {
                _ = stopped(&mut self.stop) => return Exit::Shutdown,
                changed = self.sessions.changed() => {
                    if let Some(exit) = session_moved(&mut self.sessions, session, changed) {
                        return exit;
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Serve one open connection until it is lost or the listener must exit.
    ///
    /// With `resync` set the list is refetched and merged while frames keep
    /// flowing.
    async fn pump(&mut self, socket: Socket, session: &Session, resync: bool) -> Pumped {
        let (mut sink, mut stream) = socket.split();
        let mut heartbeat = Heartbeat::start(self.config.heartbeat);

        let center = self.center.clone();
        let refetch = async move { center.resync().await };
        tokio::pin!(refetch);
        let mut resync_pending = resync;

        loop {
            let silence_deadline = heartbeat.deadline();
            tokio::select! {
                res = &mut refetch, if resync_pending => {
                    resync_pending = false;
                    log_resync(session, res);
                }
                _ = stopped(&mut self.stop) => {
                    close(&mut sink).await;
                    return Pumped::Exit(Exit::Shutdown);
                }
                changed = self.sessions.changed() => {
                    if let Some(exit) = session_moved(&mut self.sessions, session, changed) {
                        close(&mut sink).await;
                        return Pumped::Exit(exit);
                    }
                }
                _ = heartbeat.ping_due() => {
                    if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                        return Pumped::Lost(format!("ping failed: {}", e));
                    }
                }
                _ = tokio::time::sleep_until(silence_deadline) => {
                    close(&mut sink).await;
                    return Pumped::Lost("heartbeat timed out".to_string());
                }
                frame = stream.next() => match frame {
                    Some(Ok(message)) => {
                        heartbeat.saw_activity();
                        match message {
                            Message::Text(text) => self.handle_text(&text),
                            Message::Close(frame) => {
                                return Pumped::Lost(format!("closed by server: {:?}", frame));
                            }
                            _ => {}
                        }
                    }
                    Some(Err(e)) => return Pumped::Lost(e.to_string()),
                    None => return Pumped::Lost("stream ended".to_string()),
                },
            }
        }
    }

    fn handle_text(&self, text: &str) {
        match PushEvent::decode(text) {
            Ok(PushEvent::NewNotification(record)) => {
                tracing::debug!(id = %record.id, kind = %record.kind, "push notification received");
                self.center.store().prepend_one(record);
            }
            Ok(PushEvent::Other(event)) => {
                tracing::debug!(event = %event, "ignoring push event");
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed push frame");
            }
        }
    }

}

fn log_resync(session: &Session, res: Result<usize>) {
    match res {
        Ok(inserted) => {
            tracing::debug!(user_id = %session.user_id, inserted, "resynced notifications after reconnect");
        }
        Err(e) => {
            tracing::warn!(user_id = %session.user_id, error = %e, "resync after reconnect failed");
        }
    }
}

/// `None` when the session value is unchanged
fn session_moved(
    sessions: &mut SessionReceiver,
    current: &Session,
    changed: std::result::Result<(), watch::error::RecvError>,
) -> Option<Exit> {
    if changed.is_err() {
        return Some(Exit::SessionsClosed);
    }
    let same = sessions.borrow_and_update().as_ref() == Some(current);
    (!same).then_some(Exit::SessionChanged)
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    // A dropped handle counts as a stop request
    let _ = stop.wait_for(|stop| *stop).await;
}

async fn close(sink: &mut SplitSink<Socket, Message>) {
    if tokio::time::timeout(CLOSE_GRACE, sink.close()).await.is_err() {
        tracing::debug!("push channel close timed out");
    }
}

/// Build the handshake request for `session`
pub(crate) fn socket_request(socket_url: &str, session: &Session) -> Result<Request> {
    let mut url = Url::parse(socket_url)?;
    url.query_pairs_mut().append_pair("userId", &session.user_id);

    let mut request = url.as_str().into_client_request()?;
    if let Some(token) = &session.token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| NotifyError::config(format!("invalid bearer token: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}

async fn connect(socket_url: &str, session: &Session) -> Result<Socket> {
    let request = socket_request(socket_url, session)?;
    let (socket, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(socket)
}
