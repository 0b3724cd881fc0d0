use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use rostrum_core::ids::ConnectionId;
use rostrum_core::messages::{decode_candidate, decode_interviewer, MessageError};
use rostrum_session::{DeliveryError, Outbox, SessionEvent, SessionHandle};
use rostrum_telemetry::MetricsRecorder;
use tokio::sync::mpsc;

/// Which listener a connection arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Candidate,
    Interviewer,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Interviewer => "interviewer",
        }
    }

    pub fn connected(self, id: ConnectionId) -> SessionEvent {
        match self {
            Self::Candidate => SessionEvent::CandidateConnected(id),
            Self::Interviewer => SessionEvent::InterviewerConnected(id),
        }
    }

    pub fn disconnected(self, id: ConnectionId) -> SessionEvent {
        match self {
            Self::Candidate => SessionEvent::CandidateDisconnected(id),
            Self::Interviewer => SessionEvent::InterviewerDisconnected(id),
        }
    }

    /// Decode one text frame into the event for this channel.
    pub fn decode(self, id: &ConnectionId, raw: &str) -> Result<SessionEvent, MessageError> {
        match self {
            Self::Candidate => {
                decode_candidate(raw).map(|m| SessionEvent::CandidateMessage(id.clone(), m))
            }
            Self::Interviewer => {
                decode_interviewer(raw).map(|m| SessionEvent::InterviewerMessage(id.clone(), m))
            }
        }
    }
}

/// A connected WebSocket client.
pub struct Client {
    pub id: ConnectionId,
    pub channel: Channel,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
    last_pong: AtomicU64,
}

impl Client {
    fn new(id: ConnectionId, channel: Channel, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            channel,
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < timeout.as_secs()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry of all connected WebSocket clients on both channels.
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, Arc<Client>>,
    max_send_queue: usize,
    client_timeout: Duration,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize, client_timeout: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
            client_timeout,
        }
    }

    /// Register a new client and return its ID + receiver for outbound frames.
    pub fn register(&self, channel: Channel) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let client = Arc::new(Client::new(id.clone(), channel, tx));
        self.clients.insert(id.clone(), client);
        (id, rx)
    }

    /// Remove a client. Dropping its sender ends the writer task.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        match self.clients.remove(id) {
            Some((_, client)) => {
                client.connected.store(false, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn record_pong(&self, id: &ConnectionId) {
        if let Some(client) = self.clients.get(id) {
            client.record_pong();
        }
    }

    fn mark_disconnected(&self, id: &ConnectionId) {
        if let Some(client) = self.clients.get(id) {
            client.connected.store(false, Ordering::Relaxed);
        }
    }

    /// Queue a frame for one client without waiting.
    pub fn send_to(&self, id: &ConnectionId, message: String) -> Result<(), DeliveryError> {
        let client = self.clients.get(id).ok_or(DeliveryError::NotConnected)?;
        if !client.is_connected() {
            return Err(DeliveryError::Closed);
        }
        match client.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    conn_id = %id,
                    msg_len = msg.len(),
                    "send queue full, dropping message"
                );
                Err(DeliveryError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn count_for(&self, channel: Channel) -> usize {
        self.clients
            .iter()
            .filter(|entry| entry.value().channel == channel)
            .count()
    }

    /// Remove clients that haven't answered a ping within the timeout.
    pub fn cleanup_dead_clients(&self) -> usize {
        let dead: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|entry| !entry.value().is_alive(self.client_timeout))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in dead {
            if self.unregister(&id) {
                removed += 1;
                tracing::info!(conn_id = %id, "cleaned up dead client");
            }
        }
        removed
    }
}

#[async_trait]
impl Outbox for ClientRegistry {
    async fn send(&self, to: &ConnectionId, payload: String) -> Result<(), DeliveryError> {
        self.send_to(to, payload)
    }
}

/// Drive one WebSocket connection: announce it to the session, pump frames
/// both ways with a heartbeat, then announce the disconnect.
#[allow(clippy::too_many_arguments)]
pub async fn handle_ws_connection(
    socket: WebSocket,
    conn_id: ConnectionId,
    channel: Channel,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    session: SessionHandle,
    metrics: Arc<MetricsRecorder>,
    heartbeat: Duration,
) {
    let labels = [("channel", channel.as_str())];
    metrics.gauge_add("connections", &labels, 1);

    if !session.send(channel.connected(conn_id.clone())).await {
        tracing::warn!(conn_id = %conn_id, "session actor unavailable, closing");
        registry.unregister(&conn_id);
        metrics.gauge_add("connections", &labels, -1);
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: outbound views plus periodic ping.
    let writer_id = conn_id.clone();
    let writer_registry = Arc::clone(&registry);
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(conn_id = %writer_id, "sent ping");
                }
            }
        }

        writer_registry.mark_disconnected(&writer_id);
        let _ = ws_tx.close().await;
    });

    // Reader: decode inbound frames once, here, and forward them in order.
    let reader_id = conn_id.clone();
    let reader_registry = Arc::clone(&registry);
    let reader_session = session.clone();
    let reader_metrics = Arc::clone(&metrics);
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => match channel.decode(&reader_id, text.as_str()) {
                    Ok(event) => {
                        if !reader_session.send(event).await {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            conn_id = %reader_id,
                            channel = channel.as_str(),
                            kind = e.kind(),
                            error = %e,
                            "dropping malformed message"
                        );
                        reader_metrics.counter_inc(
                            "malformed_messages_total",
                            &[("channel", channel.as_str()), ("kind", e.kind())],
                            1,
                        );
                    }
                },
                WsMessage::Pong(_) => reader_registry.record_pong(&reader_id),
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => {},
        _ = &mut reader => {},
    }
    writer.abort();
    reader.abort();

    registry.unregister(&conn_id);
    session.send(channel.disconnected(conn_id.clone())).await;
    metrics.gauge_add("connections", &labels, -1);
    tracing::info!(conn_id = %conn_id, channel = channel.as_str(), "client disconnected");
}

/// Start a background task that periodically cleans up dead clients.
pub fn start_cleanup_task(
    registry: Arc<ClientRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_dead_clients();
            if removed > 0 {
                tracing::info!(removed, "dead client cleanup");
            }
        }
    })
}
