//! Transport abstraction for the live channel (session side)

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use shared::live::{LiveEventType, LiveMessage};

/// Transport abstraction for live channel communication
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn read_message(&self) -> ClientResult<LiveMessage>;
    async fn write_message(&self, msg: &LiveMessage) -> ClientResult<()>;
    async fn close(&self) -> ClientResult<()>;
}

/// TCP Transport Implementation
#[derive(Debug, Clone)]
pub struct TcpTransport {
    reader: Arc<Mutex<OwnedReadHalf>>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl TcpTransport {
    pub async fn connect(addr: &str) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read_message(&self) -> ClientResult<LiveMessage> {
        let mut reader = self.reader.lock().await;

        // Read event type (1 byte)
        let mut type_buf = [0u8; 1];
        reader.read_exact(&mut type_buf).await?;

        let event_type = LiveEventType::try_from(type_buf[0])
            .map_err(|_| ClientError::Invalid("Invalid event type".into()))?;

        // Read Request ID (16 bytes)
        let mut uuid_buf = [0u8; 16];
        reader.read_exact(&mut uuid_buf).await?;
        let request_id = Uuid::from_bytes(uuid_buf);

        // Read Correlation ID (16 bytes)
        let mut correlation_buf = [0u8; 16];
        reader.read_exact(&mut correlation_buf).await?;
        let correlation_id_raw = Uuid::from_bytes(correlation_buf);
        let correlation_id = if correlation_id_raw.is_nil() {
            None
        } else {
            Some(correlation_id_raw)
        };

        // Read payload length (4 bytes)
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;

        let len = u32::from_le_bytes(len_buf) as usize;

        // Read payload
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await?;

        Ok(LiveMessage {
            request_id,
            event_type,
            room: None,
            source: None,
            correlation_id,
            payload,
        })
    }

    async fn write_message(&self, msg: &LiveMessage) -> ClientResult<()> {
        let mut writer = self.writer.lock().await;
        let mut data = Vec::new();
        data.push(msg.event_type as u8);
        data.extend_from_slice(msg.request_id.as_bytes());

        // Write correlation_id (16 bytes)
        let correlation_bytes = msg.correlation_id.unwrap_or(Uuid::nil()).into_bytes();
        data.extend_from_slice(&correlation_bytes);

        data.extend_from_slice(&(msg.payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&msg.payload);

        writer.write_all(&data).await?;
        Ok(())
    }

    async fn close(&self) -> ClientResult<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

/// In-process memory transport
///
/// Wired to a server running in the same process: reads the session's
/// dedicated channel, writes to the server's client channel with the
/// session id stamped as source.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    session_id: String,
    rx: Arc<Mutex<broadcast::Receiver<LiveMessage>>>,
    tx: broadcast::Sender<LiveMessage>,
}

impl MemoryTransport {
    pub fn new(
        session_id: impl Into<String>,
        session_rx: &broadcast::Sender<LiveMessage>,
        client_tx: &broadcast::Sender<LiveMessage>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            rx: Arc::new(Mutex::new(session_rx.subscribe())),
            tx: client_tx.clone(),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_message(&self) -> ClientResult<LiveMessage> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))
    }

    async fn write_message(&self, msg: &LiveMessage) -> ClientResult<()> {
        let mut msg = msg.clone();
        // 同进程模式没有 TCP 层注入 source，这里补上
        msg.source = Some(self.session_id.clone());
        self.tx
            .send(msg)
            .map(|_| ())
            .map_err(|e| ClientError::Connection(e.to_string()))
    }

    async fn close(&self) -> ClientResult<()> {
        Ok(())
    }
}
