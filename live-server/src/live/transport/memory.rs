//! Memory 传输层实现 (同进程通信)

use async_trait::async_trait;
use shared::live::LiveMessage;
use tokio::sync::broadcast;

use super::Transport;
use crate::utils::AppError;

/// In-process memory transport for same-process sessions
///
/// The server's unicast handle for an embedded session: writes go to the
/// session's dedicated channel. Inbound traffic arrives over the bus's
/// upstream channel instead, so this side never reads.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    tx: broadcast::Sender<LiveMessage>,
}

impl MemoryTransport {
    /// Write-only handle; holding no receiver so the channel can close
    /// when the real consumer goes away.
    pub fn writer(write_to: &broadcast::Sender<LiveMessage>) -> Self {
        Self {
            tx: write_to.clone(),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_message(&self) -> Result<LiveMessage, AppError> {
        Err(AppError::internal("Write-only memory transport"))
    }

    async fn write_message(&self, msg: &LiveMessage) -> Result<(), AppError> {
        self.tx
            .send(msg.clone())
            .map(|_| ())
            .map_err(|e| AppError::internal(e.to_string()))
    }

    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}
