//! 房间总线核心实现
//!
//! # 架构
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      RoomBus                             │
//! │  ┌───────────────────────────────────────────────────┐  │
//! │  │  broadcast::Sender<LiveMessage>  (server_tx)      │  │
//! │  │  rooms: DashMap<room, HashSet<session>>           │  │
//! │  └───────────────────────────────────────────────────┘  │
//! └────────────────────────┬────────────────────────────────┘
//!                         │
//!              ┌──────────┴──────────┐
//!              │    Transport Trait  │  ◄── 可插拔实现
//!              └──────────┬──────────┘
//!                         │
//!          ┌──────────────┴──────────────┐
//!          ▼                             ▼
//!     TcpTransport                 MemoryTransport
//!     (TCP 明文)                   (同进程通信)
//! ```
//!
//! # 消息流
//!
//! ```text
//! Session ──▶ send_to_server() ──▶ client_tx ──▶ LiveHandler
//!                                            │
//! Server ──▶ publish_to_room() ─▶ server_tx ──┤
//!                                            ▼
//!                                 Room members (forwarder filters)
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use shared::live::{LiveMessage, RoomScope};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::transport::{MemoryTransport, Transport};
use crate::utils::AppError;

/// Configuration for transport layer
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tcp_listen_addr: String,
    /// Capacity of the broadcast channel (default: 1024)
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tcp_listen_addr: "0.0.0.0:5001".to_string(),
            channel_capacity: 1024,
        }
    }
}

/// 房间总线 - 负责消息路由和房间成员管理
///
/// # 职责
///
/// - 消息路由 (send_to_server, publish, publish_to_room, send_to_client)
/// - 房间管理 (join, leave, members)
/// - 会话管理 (connect, disconnect, session_count)
/// - 传输层抽象 (TCP/Memory)
#[derive(Debug, Clone)]
pub struct RoomBus {
    /// 客户端到服务器的消息通道
    client_tx: broadcast::Sender<LiveMessage>,
    /// 服务器到客户端的广播通道
    server_tx: broadcast::Sender<LiveMessage>,
    /// 传输层配置
    pub(crate) config: TransportConfig,
    /// 关闭信号令牌
    shutdown_token: CancellationToken,
    /// 已连接的会话 (Session ID -> Transport)
    pub(crate) clients: Arc<DashMap<String, Arc<dyn Transport>>>,
    /// 房间成员 (room name -> session ids)
    pub(crate) rooms: Arc<DashMap<String, HashSet<String>>>,
}

impl RoomBus {
    /// 创建默认配置的房间总线
    pub fn new() -> Self {
        Self::from_config(TransportConfig::default())
    }

    /// 从配置创建房间总线
    pub fn from_config(config: TransportConfig) -> Self {
        let capacity = config.channel_capacity;
        let (client_tx, _) = broadcast::channel(capacity);
        let (server_tx, _) = broadcast::channel(capacity);
        Self {
            client_tx,
            server_tx,
            config,
            shutdown_token: CancellationToken::new(),
            clients: Arc::new(DashMap::new()),
            rooms: Arc::new(DashMap::new()),
        }
    }

    /// 创建指定容量的房间总线
    pub fn with_capacity(capacity: usize) -> Self {
        let config = TransportConfig {
            channel_capacity: capacity,
            ..Default::default()
        };
        Self::from_config(config)
    }

    // ========== 房间管理 ==========

    /// 将会话加入房间
    pub fn join(&self, session_id: &str, scope: &RoomScope) {
        let room = scope.to_string();
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(session_id.to_string());
        tracing::debug!(session_id = %session_id, room = %room, "Session joined room");
    }

    /// 将会话移出房间
    ///
    /// 房间空了就删掉，避免成员表无限增长。
    pub fn leave(&self, session_id: &str, scope: &RoomScope) {
        let room = scope.to_string();
        let mut remove_room = false;
        if let Some(mut members) = self.rooms.get_mut(&room) {
            members.remove(session_id);
            remove_room = members.is_empty();
        }
        if remove_room {
            self.rooms.remove(&room);
        }
        tracing::debug!(session_id = %session_id, room = %room, "Session left room");
    }

    /// 将会话移出所有房间 (断开连接时调用)
    pub fn leave_all(&self, session_id: &str) {
        let mut empty = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            entry.value_mut().remove(session_id);
            if entry.value().is_empty() {
                empty.push(entry.key().clone());
            }
        }
        for room in empty {
            self.rooms.remove(&room);
        }
    }

    /// 查询房间成员
    pub fn members(&self, scope: &RoomScope) -> Vec<String> {
        self.rooms
            .get(&scope.to_string())
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 会话是否在指定房间内
    pub fn is_member(&self, session_id: &str, room: &str) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|m| m.contains(session_id))
    }

    /// 会话当前所在的房间名列表
    pub fn rooms_of(&self, session_id: &str) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|e| e.value().contains(session_id))
            .map(|e| e.key().clone())
            .collect()
    }

    /// 当前存在的房间名列表
    pub fn room_names(&self) -> Vec<String> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }

    /// 当前房间数
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// 当前连接的会话数
    pub fn session_count(&self) -> usize {
        self.clients.len()
    }

    // ========== 消息路由 ==========

    /// 发布消息到指定房间 (服务器 -> 房间成员)
    ///
    /// 给消息盖上房间标记后广播；每个会话的 forwarder 按成员表过滤投递。
    pub fn publish_to_room(&self, scope: &RoomScope, msg: LiveMessage) -> Result<(), AppError> {
        self.server_tx
            .send(msg.with_room(scope))
            .map_err(|e| AppError::internal(e.to_string()))?;
        Ok(())
    }

    /// 发布消息 (服务器 -> 所有连接的会话)
    pub fn publish(&self, msg: LiveMessage) -> Result<(), AppError> {
        self.server_tx
            .send(msg)
            .map_err(|e| AppError::internal(e.to_string()))?;
        Ok(())
    }

    /// 发送消息到服务器 (客户端 -> 服务器)
    ///
    /// 消息通过 broadcast 通道发送到 LiveHandler 处理
    pub fn send_to_server(&self, msg: LiveMessage) -> Result<(), AppError> {
        self.client_tx
            .send(msg)
            .map_err(|e| AppError::internal(e.to_string()))?;
        Ok(())
    }

    /// 发送消息到指定会话 (单播)
    ///
    /// # 错误
    ///
    /// 会话未连接返回 404
    pub async fn send_to_client(&self, session_id: &str, msg: LiveMessage) -> Result<(), AppError> {
        if let Some(transport) = self.clients.get(session_id) {
            transport.write_message(&msg).await.map_err(|e| {
                AppError::internal(format!("Failed to send to session {}: {}", session_id, e))
            })?;
            Ok(())
        } else {
            Err(AppError::not_found(format!(
                "Session {} not connected",
                session_id
            )))
        }
    }

    /// 订阅客户端消息 (服务器专用)
    ///
    /// LiveHandler 使用此方法接收来自客户端的请求
    pub fn subscribe_to_clients(&self) -> broadcast::Receiver<LiveMessage> {
        self.client_tx.subscribe()
    }

    /// 订阅服务器广播 (客户端专用)
    pub fn subscribe(&self) -> broadcast::Receiver<LiveMessage> {
        self.server_tx.subscribe()
    }

    /// 注册一个同进程会话 (内存传输)
    ///
    /// 为会话建立专属通道并启动房间过滤的 forwarder；返回
    /// (会话接收端发送者, 客户端发送通道)，嵌入式客户端用它们
    /// 订阅服务器事件和上行消息。会话通道没有接收者时自动注销。
    pub fn connect_memory(
        &self,
        session_id: &str,
    ) -> (
        broadcast::Sender<LiveMessage>,
        broadcast::Sender<LiveMessage>,
    ) {
        let (session_tx, _) = broadcast::channel(self.config.channel_capacity);

        // 服务器侧句柄，单播走会话专属通道
        let handle = MemoryTransport::writer(&session_tx);
        self.clients
            .insert(session_id.to_string(), Arc::new(handle));

        // 房间过滤 forwarder (与 TCP 会话相同的投递规则)
        let mut rx = self.server_tx.subscribe();
        let rooms = self.rooms.clone();
        let clients = self.clients.clone();
        let shutdown_token = self.shutdown_token.clone();
        let forward_tx = session_tx.clone();
        let id = session_id.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_token.cancelled() => break,
                    msg_result = rx.recv() => {
                        match msg_result {
                            Ok(msg) => {
                                if let Some(room) = &msg.room
                                    && !rooms.get(room).is_some_and(|m| m.contains(&id))
                                {
                                    continue;
                                }
                                // 对端全部掉线即视为断开
                                if forward_tx.send(msg).is_err() {
                                    break;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!(session_id = %id, dropped_messages = n, "Memory session lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
            clients.remove(&id);
            let mut empty = Vec::new();
            for mut entry in rooms.iter_mut() {
                entry.value_mut().remove(&id);
                if entry.value().is_empty() {
                    empty.push(entry.key().clone());
                }
            }
            for room in empty {
                rooms.remove(&room);
            }
            tracing::debug!(session_id = %id, "Memory session removed from registry");
        });

        (session_tx, self.client_tx.clone())
    }

    /// 获取客户端发送端 (client→server 通道)
    pub fn sender_to_server(&self) -> &broadcast::Sender<LiveMessage> {
        &self.client_tx
    }

    /// 获取广播发送端 (高级用法)
    pub fn sender(&self) -> &broadcast::Sender<LiveMessage> {
        &self.server_tx
    }

    /// 获取关闭令牌 (用于监控关闭信号)
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// 优雅关闭房间总线
    ///
    /// 取消所有运行中的任务，包括 TCP 服务器
    pub fn shutdown(&self) {
        tracing::info!("Shutting down room bus");
        self.shutdown_token.cancel();
    }
}

impl Default for RoomBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::live::LiveEventType;

    #[test]
    fn test_join_leave_membership() {
        let bus = RoomBus::with_capacity(16);
        let scope = RoomScope::Restaurant("r1".to_string());

        bus.join("s1", &scope);
        bus.join("s2", &scope);
        assert!(bus.is_member("s1", "restaurant:r1"));
        assert_eq!(bus.members(&scope).len(), 2);

        bus.leave("s1", &scope);
        assert!(!bus.is_member("s1", "restaurant:r1"));

        bus.leave("s2", &scope);
        // 空房间被回收
        assert_eq!(bus.room_count(), 0);
    }

    #[test]
    fn test_rooms_of_tracks_per_session_membership() {
        let bus = RoomBus::with_capacity(16);
        bus.join("s1", &RoomScope::Restaurant("r1".to_string()));
        bus.join("s1", &RoomScope::Admin("a1".to_string()));
        bus.join("s2", &RoomScope::Restaurant("r1".to_string()));

        let mut rooms = bus.rooms_of("s1");
        rooms.sort();
        assert_eq!(rooms, vec!["admin:a1".to_string(), "restaurant:r1".to_string()]);
        assert_eq!(bus.rooms_of("s2"), vec!["restaurant:r1".to_string()]);
        assert!(bus.rooms_of("ghost").is_empty());
    }

    #[test]
    fn test_leave_all_clears_every_room() {
        let bus = RoomBus::with_capacity(16);
        bus.join("s1", &RoomScope::Restaurant("r1".to_string()));
        bus.join("s1", &RoomScope::Table("qr-1".to_string()));
        bus.join("s2", &RoomScope::Restaurant("r1".to_string()));

        bus.leave_all("s1");
        assert!(!bus.is_member("s1", "restaurant:r1"));
        assert!(!bus.is_member("s1", "table:qr-1"));
        assert!(bus.is_member("s2", "restaurant:r1"));
        assert_eq!(bus.room_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_room_reaches_every_session() {
        let bus = RoomBus::with_capacity(16);
        // 没有加入任何房间的会话也能收到
        let (session_tx, _) = bus.connect_memory("s1");
        let mut session_rx = session_tx.subscribe();

        bus.publish(LiveMessage::error("maintenance")).unwrap();

        let msg = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            session_rx.recv(),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(msg.room, None);
        assert_eq!(msg.event_type, LiveEventType::Error);
    }

    #[tokio::test]
    async fn test_publish_to_room_stamps_room() {
        let bus = RoomBus::with_capacity(16);
        let mut rx = bus.subscribe();
        let scope = RoomScope::Table("qr-9".to_string());

        bus.publish_to_room(&scope, LiveMessage::error("boom"))
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.room.as_deref(), Some("table:qr-9"));
    }
}
