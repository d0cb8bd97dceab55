use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatcher::{Dispatcher, Handled};
use super::frames::ClientFrame;
use super::GatewayError;
use super::ws::{self, WsMessage};

/// Lifecycle of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Socket open and credentials sent; waiting for the ready snapshot.
    Authenticating,
    Ready,
    Closed,
}

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial: Duration,
    pub max: Duration,
    /// Added or subtracted at random from every delay.
    pub jitter: Duration,
    /// Unbounded when `None`.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            jitter: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given attempt (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.initial.saturating_mul(1 << doublings).min(self.max)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as i64;
        let jitter = self.jitter.as_millis() as i64;
        let offset = rand::thread_rng().gen_range(-jitter..=jitter);
        Duration::from_millis((base + offset).max(0) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub token: String,
    pub heartbeat: Duration,
    pub reconnect: ReconnectPolicy,
}

/// How one socket session ended.
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    Closed { code: u16, reason: String },
    Lost,
}

/// Keeps one gateway socket alive and feeds its frames to the [`Dispatcher`].
///
/// Per session there are four tasks: the read loop (the caller of
/// [`Connection::run`]), a writer draining the outbound queue, the heartbeat,
/// and a dispatch task applying frames strictly in arrival order so reads
/// never wait on cache work.
pub struct Connection {
    config: GatewayConfig,
    dispatcher: Arc<Dispatcher>,
    state: Arc<watch::Sender<ConnectionState>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientFrame>>>,
    shutdown: CancellationToken,
}

impl Connection {
    pub fn new(config: GatewayConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            dispatcher,
            state: Arc::new(state),
            outbound: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Queue a frame on the current socket.
    pub fn send(&self, frame: ClientFrame) -> Result<(), GatewayError> {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        outbound
            .as_ref()
            .ok_or(GatewayError::NotConnected)?
            .send(frame)
            .map_err(|_| GatewayError::NotConnected)
    }

    pub fn begin_typing(&self, channel_id: &str) -> Result<(), GatewayError> {
        self.send(ClientFrame::BeginTyping {
            channel: channel_id.to_string(),
        })
    }

    pub fn end_typing(&self, channel_id: &str) -> Result<(), GatewayError> {
        self.send(ClientFrame::EndTyping {
            channel: channel_id.to_string(),
        })
    }

    /// Stop the current session and any pending reconnect. `run` then returns.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Connect and keep reconnecting per the policy until shut down, the
    /// remote side ends a session with reconnects disabled, or attempts run out.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let policy = &self.config.reconnect;
        let mut attempt: u32 = 0;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            self.set_state(ConnectionState::Connecting);

            let (result, reached_ready) = self.run_session().await;
            if reached_ready {
                attempt = 0;
            }
            match result {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Closed { code, reason }) => {
                    info!(code, %reason, "gateway closed the connection");
                }
                Ok(SessionEnd::Lost) => warn!("gateway connection lost"),
                Err(e) => {
                    warn!(error = %e, "gateway session failed");
                    if !policy.enabled {
                        self.set_state(ConnectionState::Closed);
                        return Err(e);
                    }
                }
            }

            if !policy.enabled {
                break;
            }
            attempt += 1;
            if let Some(max) = policy.max_attempts
                && attempt > max
            {
                self.set_state(ConnectionState::Closed);
                return Err(GatewayError::RetriesExhausted(max));
            }

            let delay = policy.delay(attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting to gateway");
            self.set_state(ConnectionState::Disconnected);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }

        self.set_state(ConnectionState::Closed);
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// One socket from connect to close. Also reports whether the session
    /// reached `Ready`, so the caller can reset its backoff.
    async fn run_session(&self) -> (Result<SessionEnd, GatewayError>, bool) {
        let (mut writer, mut reader) = match ws::connect(&self.config.url).await {
            Ok(halves) => halves,
            Err(e) => return (Err(GatewayError::Connect(e)), false),
        };
        info!(url = %self.config.url, "gateway connected");

        self.set_state(ConnectionState::Authenticating);
        let auth = ClientFrame::Authenticate {
            token: self.config.token.clone(),
        };
        let sent = match auth.to_text() {
            Ok(text) => writer.send_text(&text).await.map_err(GatewayError::Transport),
            Err(e) => Err(GatewayError::Encode(e)),
        };
        if let Err(e) = sent {
            return (Err(e), false);
        }

        let session = self.shutdown.child_token();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let write_handle = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let text = match frame.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "dropping unencodable frame");
                        continue;
                    }
                };
                if let Err(e) = writer.send_text(&text).await {
                    debug!(error = %e, "gateway write failed");
                    break;
                }
            }
            if let Err(e) = writer.close().await {
                debug!(error = %e, "gateway close failed");
            }
        });

        let heartbeat_handle = tokio::spawn(heartbeat(out_tx.clone(), self.config.heartbeat, session.clone()));
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = Some(out_tx);

        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();
        let dispatcher = self.dispatcher.clone();
        let state = self.state.clone();
        let dispatch_handle = tokio::spawn(async move {
            let mut reached_ready = false;
            while let Some(text) = frame_rx.recv().await {
                match dispatcher.handle_text(&text).await {
                    Ok(Handled::Ready) => {
                        reached_ready = true;
                        state.send_replace(ConnectionState::Ready);
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "dropping gateway frame"),
                }
            }
            reached_ready
        });

        let end = loop {
            tokio::select! {
                _ = session.cancelled() => break SessionEnd::Shutdown,
                message = reader.recv() => match message {
                    Some(Ok(WsMessage::Text(text))) => {
                        if frame_tx.send(text).is_err() {
                            break SessionEnd::Lost;
                        }
                    }
                    Some(Ok(WsMessage::Close { code, reason })) => break SessionEnd::Closed { code, reason },
                    Some(Ok(WsMessage::Binary(data))) => {
                        debug!(len = data.len(), "ignoring binary gateway frame");
                    }
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "gateway read failed");
                        break SessionEnd::Lost;
                    }
                    None => break SessionEnd::Lost,
                },
            }
        };

        // Tear down: stop the heartbeat, drain queued frames, then let the
        // writer close the socket once every sender is gone.
        session.cancel();
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(frame_tx);
        if let Err(e) = heartbeat_handle.await {
            debug!(error = %e, "heartbeat task ended abnormally");
        }
        let reached_ready = dispatch_handle.await.unwrap_or(false);
        if let Err(e) = write_handle.await {
            debug!(error = %e, "writer task ended abnormally");
        }

        (Ok(end), reached_ready)
    }
}

/// Send a `Ping` carrying the current time in milliseconds every `every`.
async fn heartbeat(out: mpsc::UnboundedSender<ClientFrame>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately; the first ping goes out after one period.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let data = chrono::Utc::now().timestamp_millis();
                if out.send(ClientFrame::Ping { data }).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    use super::*;
    use crate::cache::Cache;
    use crate::events::{Event, Listeners};
    use crate::http::HttpClient;
    use crate::http::testing::RecordingTransport;

    type ServerSocket = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    fn connection(url: String, reconnect: ReconnectPolicy) -> (Arc<Connection>, Arc<Listeners>) {
        let listeners = Arc::new(Listeners::new());
        let dispatcher = Dispatcher::new(
            Arc::new(Cache::new(10)),
            HttpClient::with_transport(RecordingTransport::echo()),
            listeners.clone(),
        );
        let config = GatewayConfig {
            url,
            token: "secret".into(),
            heartbeat: Duration::from_millis(50),
            reconnect,
        };
        (Arc::new(Connection::new(config, Arc::new(dispatcher))), listeners)
    }

    fn no_reconnect() -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: false,
            ..ReconnectPolicy::default()
        }
    }

    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> ServerSocket {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    /// Next text frame of the given type, skipping others.
    async fn next_of_type(socket: &mut ServerSocket, kind: &str) -> Value {
        while let Some(Ok(message)) = socket.next().await {
            if let Message::Text(text) = message {
                let frame: Value = serde_json::from_str(&text).unwrap();
                if frame["type"] == kind {
                    return frame;
                }
            }
        }
        panic!("socket closed before a {kind} frame");
    }

    async fn send(socket: &mut ServerSocket, frame: Value) {
        socket.send(Message::Text(frame.to_string())).await.unwrap();
    }

    async fn handshake(socket: &mut ServerSocket) {
        let auth = next_of_type(socket, "Authenticate").await;
        assert_eq!(auth["token"], "secret");
        send(socket, json!({ "type": "Authenticated" })).await;
        send(
            socket,
            json!({ "type": "Ready", "users": [{ "_id": "me", "username": "bot", "relationship": "User" }] }),
        )
        .await;
    }

    async fn wait_for_state(conn: &Connection, want: ConnectionState) {
        let mut rx = conn.state();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want))
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay(2), Duration::from_secs(2));
        assert_eq!(policy.base_delay(5), Duration::from_secs(16));
        assert_eq!(policy.base_delay(6), Duration::from_secs(30));
        assert_eq!(policy.base_delay(100), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_jitter_stays_within_a_second() {
        let policy = ReconnectPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay(3);
            assert!(delay >= Duration::from_secs(3) && delay <= Duration::from_secs(5));
        }
        let delay = policy.delay(1);
        assert!(delay <= Duration::from_secs(2));
    }

    #[test]
    fn test_send_without_socket_fails() {
        let (conn, _) = connection("ws://127.0.0.1:1".into(), no_reconnect());
        assert!(matches!(conn.begin_typing("c1"), Err(GatewayError::NotConnected)));
        assert_eq!(conn.current_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_authenticates_then_becomes_ready() {
        let (listener, url) = bind().await;
        let (conn, listeners) = connection(url, no_reconnect());
        let ready = listeners.register_waiter("ready", |_| true);

        let server = tokio::spawn(async move {
            let mut socket = accept(&listener).await;
            handshake(&mut socket).await;
            let typing = next_of_type(&mut socket, "BeginTyping").await;
            assert_eq!(typing["channel"], "c1");
            socket.close(None).await.unwrap();
        });

        let runner = tokio::spawn({
            let conn = conn.clone();
            async move { conn.run().await }
        });

        assert!(matches!(ready.await.unwrap(), Event::Ready));
        wait_for_state(&conn, ConnectionState::Ready).await;
        conn.begin_typing("c1").unwrap();

        server.await.unwrap();
        runner.await.unwrap().unwrap();
        assert_eq!(conn.current_state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_heartbeat_sends_pings() {
        let (listener, url) = bind().await;
        let (conn, _) = connection(url, no_reconnect());

        let server = tokio::spawn(async move {
            let mut socket = accept(&listener).await;
            handshake(&mut socket).await;
            let first = next_of_type(&mut socket, "Ping").await;
            let second = next_of_type(&mut socket, "Ping").await;
            assert!(second["data"].as_i64().unwrap() >= first["data"].as_i64().unwrap());
        });

        let runner = tokio::spawn({
            let conn = conn.clone();
            async move { conn.run().await }
        });
        server.await.unwrap();
        conn.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_frames_do_not_drop_the_connection() {
        let (listener, url) = bind().await;
        let (conn, listeners) = connection(url, no_reconnect());
        let ready = listeners.register_waiter("ready", |_| true);

        let server = tokio::spawn(async move {
            let mut socket = accept(&listener).await;
            next_of_type(&mut socket, "Authenticate").await;
            socket.send(Message::Text("{oops".into())).await.unwrap();
            send(&mut socket, json!({ "type": "Mystery" })).await;
            send(&mut socket, json!({ "type": "Ready" })).await;
            socket
        });

        let runner = tokio::spawn({
            let conn = conn.clone();
            async move { conn.run().await }
        });
        assert!(matches!(ready.await.unwrap(), Event::Ready));
        let _socket = server.await.unwrap();
        conn.shutdown();
        runner.await.unwrap().unwrap();
        assert_eq!(conn.current_state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_reconnects_after_loss() {
        let (listener, url) = bind().await;
        let policy = ReconnectPolicy {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(50),
            jitter: Duration::ZERO,
            ..ReconnectPolicy::default()
        };
        let (conn, listeners) = connection(url, policy);
        let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();
        listeners.on("ready", move |_| {
            let ready_tx = ready_tx.clone();
            async move {
                let _ = ready_tx.send(());
                Ok(())
            }
        });

        let server = tokio::spawn(async move {
            let mut first = accept(&listener).await;
            handshake(&mut first).await;
            next_of_type(&mut first, "Ping").await;
            drop(first);
            let mut second = accept(&listener).await;
            handshake(&mut second).await;
            second
        });

        let runner = tokio::spawn({
            let conn = conn.clone();
            async move { conn.run().await }
        });

        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(5), ready_rx.recv())
                .await
                .unwrap()
                .unwrap();
        }
        let _socket = server.await.unwrap();
        wait_for_state(&conn, ConnectionState::Ready).await;

        conn.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let policy = ReconnectPolicy {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(2),
            jitter: Duration::ZERO,
            max_attempts: Some(2),
            ..ReconnectPolicy::default()
        };
        let (conn, _) = connection("ws://127.0.0.1:1".into(), policy);
        let err = conn.run().await.unwrap_err();
        assert!(matches!(err, GatewayError::RetriesExhausted(2)));
        assert_eq!(conn.current_state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_failure_without_reconnect_is_returned() {
        let (conn, _) = connection("ws://127.0.0.1:1".into(), no_reconnect());
        assert!(matches!(conn.run().await, Err(GatewayError::Connect(_))));
    }
}
