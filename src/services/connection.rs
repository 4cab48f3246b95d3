/// WebSocket connection manager for real-time chat delivery.
/// Owns the single live connection per session, the pending-send map that
/// survives drops, and the reconnect loop. Everything it learns is published
/// as `ChatEvent`s on an unbounded channel consumed by the dock.

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use url::Url;

use crate::error::{ClientError, Result};
use crate::models::{AckFrame, DeliveredFrame, InboundFrame, OutboundFrame, SendPayload};

/// Fixed delay between reconnect attempts. Retried indefinitely; a dropped
/// connection is a recoverable condition, never a terminal failure.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Replay status of a pending send entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Sending,
    Pending,
}

/// A send that has not yet been acknowledged or rejected. Held across
/// connection drops so a reconnect can replay it with the same
/// `clientMessageId`.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub conversation_id: String,
    pub payload: SendPayload,
    pub state: SendState,
}

/// Identifies a pending send in status-change events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRef {
    pub conversation_id: String,
    pub client_message_id: String,
}

/// Outbound event stream of the connection manager.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Connected,
    Disconnected,
    Delivered(DeliveredFrame),
    Acked(AckFrame),
    SendFailed {
        conversation_id: String,
        client_message_id: String,
        reason: String,
    },
    /// Connection dropped: these sends will be retried, not failed.
    SendsMarkedPending(Vec<PendingRef>),
    /// Reconnected: these sends were republished.
    SendsReplayed(Vec<PendingRef>),
}

pub struct ConnectionManager {
    ws_url: String,
    token: String,
    state: Arc<Mutex<ConnectionState>>,
    pending: Arc<Mutex<HashMap<String, PendingSend>>>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    /// Fallback correlation for error frames without a `clientMessageId`.
    last_sent: Arc<Mutex<Option<String>>>,
    events: mpsc::UnboundedSender<ChatEvent>,
}

impl ConnectionManager {
    pub fn new(ws_url: String, token: String) -> (Arc<Self>, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(ConnectionManager {
            ws_url,
            token,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            outbound: Arc::new(Mutex::new(None)),
            last_sent: Arc::new(Mutex::new(None)),
            events,
        });
        (manager, events_rx)
    }

    /// Derive the WebSocket endpoint from the HTTP API base.
    pub fn websocket_url(api_base: &str) -> Result<String> {
        let mut url = Url::parse(api_base)
            .map_err(|e| ClientError::ConfigError(format!("Invalid server URL: {}", e)))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::ConfigError("Unsupported server URL scheme".to_string()))?;
        url.set_path("/ws");
        Ok(url.to_string())
    }

    /// Spawn the connection loop. Runs until the process exits; connection
    /// failures are logged and retried with a fixed delay, never surfaced.
    pub fn start(self: &Arc<Self>) {
        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                *manager.state.lock().await = ConnectionState::Connecting;
                match manager.run_session().await {
                    Ok(connected) => {
                        if connected {
                            info!("WebSocket connection closed");
                            *manager.state.lock().await = ConnectionState::Disconnected;
                            manager.mark_sends_pending().await;
                            manager.emit(ChatEvent::Disconnected);
                        }
                    }
                    Err(e) => {
                        warn!("WebSocket connection attempt failed: {}", e);
                        *manager.state.lock().await = ConnectionState::Disconnected;
                    }
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        });
    }

    /// One connect-read-close cycle. Returns Ok(true) if a session was
    /// established before the connection ended.
    async fn run_session(self: &Arc<Self>) -> Result<bool> {
        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::WebSocketError(format!("Invalid WebSocket URL: {}", e)))?;
        let auth = format!("Bearer {}", self.token)
            .parse()
            .map_err(|_| ClientError::AuthError("Token is not a valid header value".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| ClientError::WebSocketError(format!("Connection failed: {}", e)))?;

        info!("WebSocket connected");
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        self.outbound.lock().await.replace(tx);
        *self.state.lock().await = ConnectionState::Connected;
        self.emit(ChatEvent::Connected);
        self.replay_pending().await;

        // Outgoing pump: serialized frames queued by publish().
        let send_task = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                    error!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }
        });

        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => self.handle_frame(&text).await,
                Ok(Message::Close(_)) => {
                    info!("WebSocket closed by server");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        send_task.abort();
        self.outbound.lock().await.take();
        Ok(true)
    }

    /// Route one inbound frame. Malformed frames are dropped; they must never
    /// take the client down.
    pub async fn handle_frame(&self, text: &str) {
        debug!("recv frame: {}", text);
        let frame: InboundFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("dropping malformed frame: {}", e);
                return;
            }
        };

        match frame {
            InboundFrame::Message(delivered) => {
                self.emit(ChatEvent::Delivered(delivered));
            }
            InboundFrame::Ack(ack) => {
                self.pending.lock().await.remove(&ack.client_message_id);
                self.emit(ChatEvent::Acked(ack));
            }
            InboundFrame::Error(err) => {
                let fallback = self.last_sent.lock().await.clone();
                let client_message_id = match err.client_message_id.clone().or(fallback) {
                    Some(id) => id,
                    None => {
                        debug!("send error frame without correlatable message");
                        return;
                    }
                };
                let entry = self.pending.lock().await.remove(&client_message_id);
                let Some(entry) = entry else {
                    debug!("send error for unknown message {}", client_message_id);
                    return;
                };
                self.emit(ChatEvent::SendFailed {
                    conversation_id: entry.conversation_id,
                    client_message_id,
                    reason: err.reason(),
                });
            }
        }
    }

    /// Record a send so it can be reconciled and, if necessary, replayed.
    /// Registered regardless of connection state.
    pub async fn register_send(&self, conversation_id: String, payload: SendPayload) {
        let state = if self.is_connected().await {
            SendState::Sending
        } else {
            SendState::Pending
        };
        let client_message_id = payload.client_message_id.clone();
        self.pending.lock().await.insert(
            client_message_id.clone(),
            PendingSend {
                conversation_id,
                payload,
                state,
            },
        );
        *self.last_sent.lock().await = Some(client_message_id);
    }

    /// Queue an outbound frame on the live connection.
    pub async fn publish(&self, frame: &OutboundFrame) -> Result<()> {
        if *self.state.lock().await != ConnectionState::Connected {
            return Err(ClientError::StateError(
                "WebSocket not connected".to_string(),
            ));
        }
        let text = serde_json::to_string(frame)?;
        debug!("send frame: {}", text);
        let outbound = self.outbound.lock().await;
        match outbound.as_ref() {
            Some(tx) => tx
                .send(text)
                .map_err(|e| ClientError::WebSocketError(format!("Failed to queue frame: {}", e))),
            None => Err(ClientError::StateError(
                "Outbound channel not initialized".to_string(),
            )),
        }
    }

    /// Connection dropped: every unresolved send reverts to pending so the UI
    /// shows "will retry" rather than an error.
    async fn mark_sends_pending(&self) {
        let mut pending = self.pending.lock().await;
        let mut refs = Vec::new();
        for (client_message_id, entry) in pending.iter_mut() {
            entry.state = SendState::Pending;
            refs.push(PendingRef {
                conversation_id: entry.conversation_id.clone(),
                client_message_id: client_message_id.clone(),
            });
        }
        drop(pending);
        if !refs.is_empty() {
            self.emit(ChatEvent::SendsMarkedPending(refs));
        }
    }

    /// Reconnected: republish every pending entry with its original payload
    /// and `clientMessageId`.
    async fn replay_pending(&self) {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return;
        }
        let outbound = self.outbound.lock().await;
        let Some(tx) = outbound.as_ref() else {
            return;
        };
        let mut refs = Vec::new();
        for (client_message_id, entry) in pending.iter_mut() {
            let frame = OutboundFrame::Send(entry.payload.clone());
            match serde_json::to_string(&frame) {
                Ok(text) => {
                    if tx.send(text).is_err() {
                        warn!("Outbound channel closed during replay");
                        break;
                    }
                    entry.state = SendState::Sending;
                    refs.push(PendingRef {
                        conversation_id: entry.conversation_id.clone(),
                        client_message_id: client_message_id.clone(),
                    });
                }
                Err(e) => warn!("Failed to serialize replay frame: {}", e),
            }
        }
        drop(outbound);
        drop(pending);
        if let Some(last) = refs.last() {
            *self.last_sent.lock().await = Some(last.client_message_id.clone());
        }
        if !refs.is_empty() {
            info!("Replayed {} pending send(s)", refs.len());
            self.emit(ChatEvent::SendsReplayed(refs));
        }
    }

    pub async fn get_state(&self) -> ConnectionState {
        self.state.lock().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        *self.state.lock().await == ConnectionState::Connected
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn pending_entry(&self, client_message_id: &str) -> Option<PendingSend> {
        self.pending.lock().await.get(client_message_id).cloned()
    }

    fn emit(&self, event: ChatEvent) {
        // The dock holds the receiver for the life of the session; a closed
        // channel just means shutdown is underway.
        let _ = self.events.send(event);
    }
}
