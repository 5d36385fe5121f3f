//! TCP 服务器实现
//!
//! 负责处理 TCP 客户端连接，包括：
//! - 监听连接
//! - 协议握手验证
//! - 房间过滤的消息转发

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use shared::live::{AckPayload, HandshakePayload, LiveEventType, LiveMessage, PROTOCOL_VERSION};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::bus::RoomBus;
use super::transport::{TcpTransport, Transport};
use crate::utils::AppError;

impl RoomBus {
    /// Start TCP server (for network clients)
    ///
    /// This is a TCP server that:
    /// 1. Accepts connections
    /// 2. Reads messages from sessions and publishes to client_tx (server receives)
    /// 3. Forwards room-stamped server broadcasts to member sessions
    /// 4. Gracefully shuts down on cancellation signal
    pub async fn start_tcp_server(&self) -> Result<(), AppError> {
        let listener = TcpListener::bind(&self.config.tcp_listen_addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind: {}", e)))?;

        tracing::info!(
            "Live channel TCP server listening on {}",
            self.config.tcp_listen_addr
        );

        self.accept_loop(listener).await
    }

    /// Main accept loop
    async fn accept_loop(&self, listener: TcpListener) -> Result<(), AppError> {
        loop {
            tokio::select! {
                _ = self.shutdown_token().cancelled() => {
                    tracing::info!("Live channel TCP server shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::debug!("Session connected: {}", addr);
                            self.spawn_session_handler(stream, addr);
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Spawn a new task to handle a session connection
    fn spawn_session_handler(&self, stream: TcpStream, addr: SocketAddr) {
        let server_tx = self.sender().clone();
        let client_tx = self.sender_to_server().clone();
        let shutdown_token = self.shutdown_token().clone();
        let clients = self.clients.clone();
        let rooms = self.rooms.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_session_connection(
                stream,
                addr,
                server_tx,
                client_tx,
                shutdown_token,
                clients,
                rooms,
            )
            .await
            {
                tracing::debug!("Session {} handler finished: {}", addr, e);
            }
        });
    }
}

/// Handle a single session connection
async fn handle_session_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: broadcast::Sender<LiveMessage>,
    client_tx: broadcast::Sender<LiveMessage>,
    shutdown_token: CancellationToken,
    clients: Arc<DashMap<String, Arc<dyn Transport>>>,
    rooms: Arc<DashMap<String, HashSet<String>>>,
) -> Result<(), AppError> {
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::from_stream(stream));

    // Protocol handshake
    let session_id = perform_handshake(&transport, addr).await?;

    // Register session
    clients.insert(session_id.clone(), transport.clone());
    tracing::debug!("Session registered: {}", session_id);

    // 创建共享的断开检测 token
    let disconnect_token = CancellationToken::new();
    let disconnect_token_clone = disconnect_token.clone();

    // Start message forwarding (当会话断开时，forwarder 也要停止)
    let forward_handle = spawn_server_to_session_forwarder(
        transport.clone(),
        server_tx.subscribe(),
        shutdown_token.clone(),
        session_id.clone(),
        rooms.clone(),
        disconnect_token_clone,
    );

    // Read messages from the session - 当检测到断开时，取消 disconnect_token
    read_session_messages(
        &transport,
        &client_tx,
        &shutdown_token,
        &session_id,
        addr,
        disconnect_token,
    )
    .await;

    // Cleanup
    drop(forward_handle);
    let _ = transport.close().await;
    clients.remove(&session_id);
    // 断开的会话退出全部房间
    let mut empty = Vec::new();
    for mut entry in rooms.iter_mut() {
        entry.value_mut().remove(&session_id);
        if entry.value().is_empty() {
            empty.push(entry.key().clone());
        }
    }
    for room in empty {
        rooms.remove(&room);
    }
    tracing::debug!(session_id = %session_id, "Session removed from registry");

    Ok(())
}

/// Perform protocol handshake with a session
async fn perform_handshake(
    transport: &Arc<dyn Transport>,
    addr: SocketAddr,
) -> Result<String, AppError> {
    tracing::debug!("Waiting for handshake from {}", addr);

    let msg = transport.read_message().await.map_err(|e| {
        tracing::warn!("Session {} handshake error: {}", addr, e);
        e
    })?;

    if msg.event_type != LiveEventType::Handshake {
        tracing::warn!(
            "Session {} failed to handshake: expected handshake, got {}",
            addr,
            msg.event_type
        );
        return Err(AppError::invalid("Expected handshake message"));
    }

    let payload: HandshakePayload = msg.parse_payload().map_err(|e| {
        tracing::warn!("Session {} sent invalid handshake payload: {}", addr, e);
        AppError::invalid(format!("Invalid handshake payload: {}", e))
    })?;

    // Version check
    if payload.version != PROTOCOL_VERSION {
        tracing::warn!(
            "Session {} protocol version mismatch: expected {}, got {}",
            addr,
            PROTOCOL_VERSION,
            payload.version
        );

        send_handshake_error(
            transport,
            &msg,
            &format!(
                "Protocol version mismatch: server={}, client={}. Please update your client.",
                PROTOCOL_VERSION, payload.version
            ),
        )
        .await;

        return Err(AppError::invalid("Protocol version mismatch"));
    }

    let session_id = Uuid::new_v4().to_string();

    tracing::debug!(
        "Session {} handshake success (v{}, client: {:?}, id: {})",
        addr,
        payload.version,
        payload.client_name,
        session_id
    );

    // 发送握手确认 (用 correlation_id 关联客户端的 request_id)
    let ack = AckPayload::ok_with_message(format!("Connected as session: {}", session_id));
    let response = LiveMessage::new(
        LiveEventType::Handshake,
        serde_json::to_vec(&ack).unwrap_or_default(),
    )
    .with_correlation_id(msg.request_id);
    if let Err(e) = transport.write_message(&response).await {
        tracing::warn!("Failed to send handshake response: {}", e);
    }

    Ok(session_id)
}

/// Delay before closing connection after sending error (allows client to receive the message)
const HANDSHAKE_ERROR_DELAY_MS: u64 = 100;

/// Send handshake error to a session
async fn send_handshake_error(transport: &Arc<dyn Transport>, msg: &LiveMessage, message: &str) {
    let response = LiveMessage::error(message).with_correlation_id(msg.request_id);

    if let Err(e) = transport.write_message(&response).await {
        tracing::error!("Failed to send handshake error: {}", e);
    }

    // Give the client some time to receive the message before closing
    tokio::time::sleep(tokio::time::Duration::from_millis(HANDSHAKE_ERROR_DELAY_MS)).await;
}

/// Spawn task to forward server broadcasts to one session
///
/// Room-stamped messages are delivered only when the session is a member
/// of that room at delivery time.
fn spawn_server_to_session_forwarder(
    transport: Arc<dyn Transport>,
    mut rx: broadcast::Receiver<LiveMessage>,
    shutdown_token: CancellationToken,
    session_id: String,
    rooms: Arc<DashMap<String, HashSet<String>>>,
    disconnect_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    tracing::debug!("Session {} forwarder shutting down", session_id);
                    break;
                }
                _ = disconnect_token.cancelled() => {
                    tracing::debug!(session_id = %session_id, "Session disconnected, forwarder stopping");
                    break;
                }
                msg_result = rx.recv() => {
                    match msg_result {
                        Ok(msg) => {
                            // Room filtering: deliver only to current members
                            if let Some(room) = &msg.room
                                && !rooms.get(room).is_some_and(|m| m.contains(&session_id))
                            {
                                continue;
                            }

                            if let Err(e) = transport.write_message(&msg).await {
                                tracing::debug!(session_id = %session_id, "Session write failed: {}", e);
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            // Slow consumer fell behind; later events still flow
                            tracing::warn!(
                                session_id = %session_id,
                                dropped_messages = n,
                                "Session lagged behind broadcast channel"
                            );
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!(session_id = %session_id, "Broadcast channel closed");
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!(session_id = %session_id, "Session forwarder stopped");
    })
}

/// Read messages from a session and forward to the server
async fn read_session_messages(
    transport: &Arc<dyn Transport>,
    client_tx: &broadcast::Sender<LiveMessage>,
    shutdown_token: &CancellationToken,
    session_id: &str,
    addr: SocketAddr,
    disconnect_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                break;
            }

            read_result = transport.read_message() => {
                match read_result {
                    Ok(mut msg) => {
                        // Inject session ID (source tracking)
                        msg.source = Some(session_id.to_string());

                        // Block server-only events from clients
                        if msg.event_type.is_server_event() {
                            tracing::warn!(
                                target: "security",
                                session_addr = %addr,
                                event_type = %msg.event_type,
                                "Session attempted to send a server event. Dropping message."
                            );
                            continue;
                        }

                        // Publish to client_tx so the handler receives it
                        if let Err(e) = client_tx.send(msg) {
                            tracing::warn!("Failed to publish session message: {}", e);
                        }
                    }
                    Err(e) => {
                        if matches!(e, AppError::ClientDisconnected) {
                            tracing::debug!(session_id = %session_id, "Session {} disconnected", addr);
                        } else {
                            tracing::debug!(session_id = %session_id, "Session {} read error: {}", addr, e);
                        }
                        // 通知 forwarder 会话已断开
                        disconnect_token.cancel();
                        break;
                    }
                }
            }
        }
    }
}
