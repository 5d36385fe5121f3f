//! 实时房间通道
//!
//! # 模块结构
//!
//! - [`bus`] - 房间总线 (消息路由 + 房间成员表)
//! - [`handler`] - 服务端事件处理
//! - [`tcp_server`] - TCP 监听和会话生命周期
//! - [`transport`] - 可插拔传输层 (TCP/Memory)

pub mod bus;
pub mod handler;
pub mod tcp_server;
pub mod transport;

pub use bus::{RoomBus, TransportConfig};
pub use handler::LiveHandler;
pub use transport::{MemoryTransport, TcpTransport, Transport};

/// 已连接会话的快照 (用于状态接口)
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectedSession {
    pub id: String,
    pub addr: Option<String>,
}

impl RoomBus {
    /// 获取已连接会话列表
    pub fn connected_sessions(&self) -> Vec<ConnectedSession> {
        self.clients
            .iter()
            .map(|entry| ConnectedSession {
                id: entry.key().clone(),
                addr: entry.value().peer_addr(),
            })
            .collect()
    }
}
