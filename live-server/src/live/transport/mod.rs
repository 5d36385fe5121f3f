//! Transport 传输层抽象
//!
//! 提供可插拔的传输层架构：
//! ```text
//!         ┌────────────────────┐
//!         │   Transport Trait  │  ◄── 可插拔接口
//!         └────────┬───────────┘
//!                  │
//!          ┌───────┴────────┐
//!          ▼                ▼
//!    TcpTransport     MemoryTransport
//!    (TCP 协议)       (同进程通信)
//! ```

mod memory;
mod tcp;

pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use shared::live::{LiveEventType, LiveMessage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::utils::AppError;

/// Transport 传输层特征
///
/// 所有传输实现必须实现此特征，支持消息的读写和连接管理。
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// 从传输层读取一条消息
    async fn read_message(&self) -> Result<LiveMessage, AppError>;

    /// 向传输层写入一条消息
    async fn write_message(&self, msg: &LiveMessage) -> Result<(), AppError>;

    /// 关闭传输连接
    async fn close(&self) -> Result<(), AppError>;

    /// 获取对端地址
    fn peer_addr(&self) -> Option<String> {
        None
    }
}

// ========== 辅助函数 ==========

/// 从异步流中读取 LiveMessage
///
/// 帧格式: 1 字节事件类型 + 16 字节 request id + 16 字节 correlation id
/// (nil = None) + 4 字节小端载荷长度 + JSON 载荷。
pub(crate) async fn read_from_stream<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<LiveMessage, AppError> {
    // 读取事件类型 (1 字节)
    let mut type_buf = [0u8; 1];
    match reader.read_exact(&mut type_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(AppError::ClientDisconnected);
        }
        Err(e) => {
            return Err(AppError::internal(format!("Read type failed: {}", e)));
        }
    }

    let event_type = LiveEventType::try_from(type_buf[0])
        .map_err(|_| AppError::invalid("Invalid event type"))?;

    // 读取 Request ID (16 字节)
    let mut uuid_buf = [0u8; 16];
    reader
        .read_exact(&mut uuid_buf)
        .await
        .map_err(|e| AppError::internal(format!("Read UUID failed: {}", e)))?;
    let request_id = Uuid::from_bytes(uuid_buf);

    // 读取 Correlation ID (16 字节)
    let mut correlation_buf = [0u8; 16];
    reader
        .read_exact(&mut correlation_buf)
        .await
        .map_err(|e| AppError::internal(format!("Read Correlation UUID failed: {}", e)))?;
    let correlation_id_raw = Uuid::from_bytes(correlation_buf);
    let correlation_id = if correlation_id_raw.is_nil() {
        None
    } else {
        Some(correlation_id_raw)
    };

    // 读取载荷长度 (4 字节)
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| AppError::internal(format!("Read len failed: {}", e)))?;

    let len = u32::from_le_bytes(len_buf) as usize;

    // 读取载荷内容
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| AppError::internal(format!("Read payload failed: {}", e)))?;

    Ok(LiveMessage {
        request_id,
        event_type,
        room: None,
        source: None,
        correlation_id,
        payload,
    })
}

/// 向异步流写入 LiveMessage
pub(crate) async fn write_to_stream<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg: &LiveMessage,
) -> Result<(), AppError> {
    let mut data = Vec::new();
    data.push(msg.event_type as u8);
    data.extend_from_slice(msg.request_id.as_bytes());

    // Write correlation_id (16 bytes) - using nil UUID if None
    let correlation_bytes = msg.correlation_id.unwrap_or(Uuid::nil()).into_bytes();
    data.extend_from_slice(&correlation_bytes);

    data.extend_from_slice(&(msg.payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&msg.payload);

    writer
        .write_all(&data)
        .await
        .map_err(|e| AppError::internal(format!("Write failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::live::AckPayload;

    #[tokio::test]
    async fn test_stream_roundtrip() {
        let msg = LiveMessage::new(
            LiveEventType::OrderUpdateSuccess,
            serde_json::to_vec(&AckPayload::ok()).unwrap(),
        )
        .with_correlation_id(Uuid::new_v4());

        let mut buf = Vec::new();
        write_to_stream(&mut buf, &msg).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let back = read_from_stream(&mut cursor).await.unwrap();
        assert_eq!(back.event_type, msg.event_type);
        assert_eq!(back.request_id, msg.request_id);
        assert_eq!(back.correlation_id, msg.correlation_id);
        assert_eq!(back.payload, msg.payload);
    }

    #[tokio::test]
    async fn test_nil_correlation_reads_as_none() {
        let msg = LiveMessage::new(LiveEventType::Handshake, vec![]);
        let mut buf = Vec::new();
        write_to_stream(&mut buf, &msg).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let back = read_from_stream(&mut cursor).await.unwrap();
        assert_eq!(back.correlation_id, None);
    }

    #[tokio::test]
    async fn test_eof_maps_to_disconnect() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let err = read_from_stream(&mut cursor).await.unwrap_err();
        assert!(matches!(err, AppError::ClientDisconnected));
    }
}
