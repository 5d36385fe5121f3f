//! Live channel client
//!
//! A unified client for talking to the live gateway. Supports both the
//! request/ack pattern (joins, status updates) and event subscription
//! (order events fanned out by the server).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use shared::live::{ErrorPayload, HandshakePayload, LiveEventType, LiveMessage};

use super::transport::{MemoryTransport, TcpTransport, Transport};

/// How long a request waits for its ack
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// The gateway's transient socket hiccup; logged at debug, not error
const TRANSIENT_ERROR_MARKER: &str = "websocket error";

/// Connection lifecycle state
///
/// Informational only: sends are attempted regardless, the transport
/// returns its own error when the connection is really gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Live channel client
#[derive(Debug, Clone)]
pub struct LiveClient {
    transport: ClientTransport,
    event_tx: broadcast::Sender<LiveMessage>,
    pending_requests: Arc<Mutex<HashMap<Uuid, oneshot::Sender<LiveMessage>>>>,
    state: Arc<Mutex<ConnectionState>>,
}

#[derive(Debug, Clone)]
enum ClientTransport {
    Tcp(TcpTransport),
    Memory(MemoryTransport),
}

impl ClientTransport {
    async fn read_message(&self) -> ClientResult<LiveMessage> {
        match self {
            ClientTransport::Tcp(t) => t.read_message().await,
            ClientTransport::Memory(t) => t.read_message().await,
        }
    }

    async fn write_message(&self, msg: &LiveMessage) -> ClientResult<()> {
        match self {
            ClientTransport::Tcp(t) => t.write_message(msg).await,
            ClientTransport::Memory(t) => t.write_message(msg).await,
        }
    }

    async fn close(&self) -> ClientResult<()> {
        match self {
            ClientTransport::Tcp(t) => t.close().await,
            ClientTransport::Memory(t) => t.close().await,
        }
    }
}

impl LiveClient {
    fn new(transport: ClientTransport, initial: ConnectionState) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        let pending_requests: Arc<Mutex<HashMap<Uuid, oneshot::Sender<LiveMessage>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let state = Arc::new(Mutex::new(initial));

        let client = Self {
            transport: transport.clone(),
            event_tx: event_tx.clone(),
            pending_requests: pending_requests.clone(),
            state: state.clone(),
        };

        // Spawn background task to dispatch messages
        let pending_requests_clone = pending_requests.clone();
        tokio::spawn(async move {
            loop {
                match transport.read_message().await {
                    Ok(msg) => {
                        // 1. Check if it's a reply (has correlation_id)
                        if let Some(correlation_id) = msg.correlation_id {
                            let mut pending = pending_requests_clone.lock().unwrap();
                            if let Some(tx) = pending.remove(&correlation_id) {
                                let _ = tx.send(msg.clone());
                                // Still broadcast, others might be interested
                            }
                        }

                        // 2. Forward to the process-local event bus
                        if let Err(e) = event_tx.send(msg) {
                            tracing::debug!("No subscribers for event: {}", e);
                        }
                    }
                    Err(e) => {
                        // 已知的瞬态抖动降级为 debug，避免刷屏
                        let text = e.to_string();
                        if text.contains(TRANSIENT_ERROR_MARKER) {
                            tracing::debug!("Transient channel error: {}", text);
                        } else {
                            tracing::error!("Transport read error: {}", text);
                        }
                        *state.lock().unwrap() = ConnectionState::Disconnected;
                        // 连接断开，调用方需重新 connect
                        break;
                    }
                }
            }
        });

        client
    }

    /// Connect via TCP and perform the protocol handshake
    ///
    /// The client stays in `Connecting` until the gateway acks the
    /// handshake; a rejection (version mismatch) surfaces as an error.
    pub async fn connect(addr: &str, client_name: &str) -> ClientResult<Self> {
        let transport = TcpTransport::connect(addr).await?;
        let client = Self::new(ClientTransport::Tcp(transport), ConnectionState::Connecting);

        let payload = HandshakePayload::current(client_name);
        let ack = client.request(&LiveMessage::handshake(&payload)).await?;
        if ack.event_type == LiveEventType::Error {
            let reason = ack
                .parse_payload::<ErrorPayload>()
                .map(|p| p.message)
                .unwrap_or_else(|_| "Handshake rejected".to_string());
            client.close().await.ok();
            return Err(ClientError::Connection(reason));
        }

        *client.state.lock().unwrap() = ConnectionState::Connected;
        Ok(client)
    }

    /// Create an in-process client wired to a server in the same process
    ///
    /// `session_rx` is the session's dedicated channel handed out by the
    /// server's bus; `client_tx` is the server's upstream channel.
    pub fn memory(
        session_id: &str,
        session_rx: &broadcast::Sender<LiveMessage>,
        client_tx: &broadcast::Sender<LiveMessage>,
    ) -> Self {
        let transport = MemoryTransport::new(session_id, session_rx, client_tx);
        // 进程内连接没有握手，直接视为已连接
        Self::new(ClientTransport::Memory(transport), ConnectionState::Connected)
    }

    /// Current connection state (informational)
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    /// Whether the client believes it is connected
    ///
    /// 只作提示用途；发送永远照常尝试，断线由传输层报错。
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to server events
    pub fn subscribe(&self) -> broadcast::Receiver<LiveMessage> {
        self.event_tx.subscribe()
    }

    /// Receive a single event (subscribe-and-wait convenience)
    pub async fn recv(&self) -> ClientResult<LiveMessage> {
        let mut rx = self.event_tx.subscribe();
        rx.recv()
            .await
            .map_err(|e| ClientError::Connection(format!("Event bus error: {}", e)))
    }

    /// Send a message (fire and forget)
    pub async fn send(&self, msg: &LiveMessage) -> ClientResult<()> {
        self.transport.write_message(msg).await
    }

    /// Send a message and await the server's acknowledgment.
    ///
    /// The server replies with a message whose `correlation_id` matches
    /// this request's `request_id`.
    pub async fn request(&self, msg: &LiveMessage) -> ClientResult<LiveMessage> {
        let request_id = msg.request_id;
        let (tx, rx) = oneshot::channel();

        // Register pending request
        {
            let mut pending = self.pending_requests.lock().unwrap();
            pending.insert(request_id, tx);
        }

        // Send request
        if let Err(e) = self.send(msg).await {
            // Cleanup on send failure
            let mut pending = self.pending_requests.lock().unwrap();
            pending.remove(&request_id);
            return Err(e);
        }

        // Wait for response with timeout
        match tokio::time::timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS), rx).await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ClientError::Connection(
                "Response channel closed".to_string(),
            )),
            Err(_) => {
                // Timeout cleanup
                let mut pending = self.pending_requests.lock().unwrap();
                pending.remove(&request_id);
                Err(ClientError::Timeout("Request timed out".to_string()))
            }
        }
    }

    /// Close the client connection
    pub async fn close(&self) -> ClientResult<()> {
        *self.state.lock().unwrap() = ConnectionState::Disconnected;
        self.transport.close().await
    }
}
